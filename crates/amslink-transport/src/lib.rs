//! TCP transport for AMS router connections.
//!
//! A PLC is addressed logically by its AMS net id, but the bytes travel over a
//! plain TCP connection to a router (usually port 48898) that forwards them.
//! This crate only knows about the physical side: open a stream, split it into
//! halves, accept streams when acting as a device.
//!
//! Everything else builds on top of the [`AmsStream`] type provided here.

pub mod error;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use stream::AmsStream;
pub use tcp::{TcpListener, TcpTransport, DEFAULT_ROUTER_PORT};
