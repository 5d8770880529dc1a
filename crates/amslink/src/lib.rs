//! Talk to Beckhoff-style PLCs over ADS/AMS.
//!
//! A controller is addressed by a six-octet AMS net id and a service port,
//! reached through a TCP router. amslink reads its operating state and reads
//! or writes variables by symbolic name, with any number of concurrent
//! callers sharing one connection.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP connection to the AMS router
//! - [`frame`]: AMS header, frame codec and ADS request/response payloads
//! - [`client`]: invoke-id correlation, connection lifecycle, typed values
//!
//! The most common types are re-exported at the top level.

/// Re-export transport types.
pub mod transport {
    pub use amslink_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use amslink_frame::*;
}

/// Re-export client types.
pub mod client {
    pub use amslink_client::*;
}

pub use amslink_client::{
    AdsState, Client, ClientConfig, ClientError, ConnectionState, DeviceError, DeviceStatus,
    Endpoint, PlcValue, Simulator, ValueKind,
};
pub use amslink_frame::{AmsAddress, AmsNetId};
