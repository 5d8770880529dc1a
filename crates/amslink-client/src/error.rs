use std::time::Duration;

use amslink_frame::{AddressError, FrameError};
use amslink_transport::TransportError;

use crate::device_error::DeviceError;

/// Errors returned by client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Malformed net id or AMS address.
    #[error("address error: {0}")]
    Address(#[from] AddressError),

    /// Local frame encode/decode failure.
    #[error("frame error: {0}")]
    Frame(FrameError),

    /// The device rejected the request.
    #[error("device error: {0}")]
    Device(DeviceError),

    /// Operation attempted while not connected.
    #[error("not connected")]
    NotConnected,

    /// No response before the request deadline. The connection stays usable.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The transport failed while the request was outstanding.
    #[error("connection lost: {0}")]
    ConnectionLost(String),

    /// The router could not be reached.
    #[error("connect to {target} failed: {source}")]
    ConnectFailed {
        target: String,
        source: TransportError,
    },

    /// Symbol name exceeds the maximum addressable length.
    #[error("symbol name too long ({len} bytes, max {max})")]
    NameTooLong { len: usize, max: usize },

    /// A value could not be serialized for writing.
    #[error("cannot encode value: {0}")]
    Encoding(String),

    /// Read bytes could not be interpreted as the requested type.
    #[error("cannot decode value: {0}")]
    Decoding(String),

    /// Invalid client configuration.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ClientError {
    /// The raw device code, for errors that came from the device.
    pub fn device_code(&self) -> Option<u32> {
        match self {
            Self::Device(err) => Some(err.code()),
            _ => None,
        }
    }
}

impl From<FrameError> for ClientError {
    fn from(err: FrameError) -> Self {
        match err {
            FrameError::Device { code } => Self::Device(DeviceError::from_code(code)),
            FrameError::NameTooLong { len, max } => Self::NameTooLong { len, max },
            other => Self::Frame(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
