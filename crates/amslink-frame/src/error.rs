use crate::command::CommandId;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// Fewer bytes than a complete header or payload section.
    #[error("short buffer ({actual} bytes, need {needed})")]
    ShortBuffer { needed: usize, actual: usize },

    /// The header's length field disagrees with the bytes that follow it.
    #[error("inconsistent length field (header says {declared} bytes, found {actual})")]
    LengthMismatch { declared: usize, actual: usize },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Symbol name exceeds the maximum addressable length.
    #[error("symbol name too long ({len} bytes, max {max})")]
    NameTooLong { len: usize, max: usize },

    /// Symbol name is empty or contains a NUL byte.
    #[error("invalid symbol name: {0}")]
    InvalidName(String),

    /// A symbolic request that does not target the by-name index group.
    #[error("unexpected index group {0:#x}")]
    UnexpectedIndexGroup(u32),

    /// The command is recognized but not implemented by this codec.
    #[error("unsupported command {0}")]
    UnsupportedCommand(CommandId),

    /// The response carries a different command than the request.
    #[error("unexpected command in response (expected {expected}, got {actual})")]
    UnexpectedCommand {
        expected: CommandId,
        actual: CommandId,
    },

    /// The device answered with a non-zero error code.
    #[error("device returned error code {code:#x}")]
    Device { code: u32 },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

pub type Result<T> = std::result::Result<T, FrameError>;
