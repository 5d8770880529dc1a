//! Concurrent ADS client.
//!
//! This is the "just works" layer. Connect to a PLC through its AMS router,
//! read its state, and read or write variables by name from any number of
//! tasks at once over a single connection.
//!
//! - [`registry`] correlates responses to requests by invoke id
//! - [`connection`] owns the socket: one send path, one dispatch task
//! - [`client`] is the typed façade most callers want

pub mod client;
pub mod config;
pub mod connection;
pub mod device_error;
pub mod error;
pub mod registry;
pub mod simulator;
pub mod state;
pub mod value;

pub use client::Client;
pub use config::{ClientConfig, Endpoint};
pub use connection::Connection;
pub use device_error::DeviceError;
pub use error::{ClientError, Result};
pub use registry::{InvokeRegistry, Resolution, Waiter};
pub use simulator::{Simulator, SimulatorHandle, SymbolTable};
pub use state::{AdsState, ConnectionState, DeviceStatus};
pub use value::{PlcValue, ValueKind};
