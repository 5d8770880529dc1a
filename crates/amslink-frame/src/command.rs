//! Command ids and state flags.

use std::fmt;

use crate::error::{FrameError, Result};

/// ADS command id carried in every header.
///
/// The numeric tags are fixed by the wire protocol. Only [`Read`](Self::Read),
/// [`Write`](Self::Write) and [`ReadState`](Self::ReadState) are implemented;
/// the rest are still recognized so unsolicited frames decode cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandId {
    Read,
    Write,
    ReadState,
    WriteControl,
    AddNotification,
    DeleteNotification,
    Notification,
    ReadWrite,
    /// A tag outside the known set.
    Unknown(u16),
}

impl CommandId {
    pub const fn from_u16(value: u16) -> Self {
        match value {
            2 => Self::Read,
            3 => Self::Write,
            4 => Self::ReadState,
            5 => Self::WriteControl,
            6 => Self::AddNotification,
            7 => Self::DeleteNotification,
            8 => Self::Notification,
            9 => Self::ReadWrite,
            other => Self::Unknown(other),
        }
    }

    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Read => 2,
            Self::Write => 3,
            Self::ReadState => 4,
            Self::WriteControl => 5,
            Self::AddNotification => 6,
            Self::DeleteNotification => 7,
            Self::Notification => 8,
            Self::ReadWrite => 9,
            Self::Unknown(other) => other,
        }
    }

    /// Whether this codec can build and interpret payloads for the command.
    pub const fn is_supported(self) -> bool {
        matches!(self, Self::Read | Self::Write | Self::ReadState)
    }

    /// Fail with [`FrameError::UnsupportedCommand`] for anything but Read/Write/ReadState.
    pub fn ensure_supported(self) -> Result<()> {
        if self.is_supported() {
            Ok(())
        } else {
            Err(FrameError::UnsupportedCommand(self))
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Read => "Read",
            Self::Write => "Write",
            Self::ReadState => "ReadState",
            Self::WriteControl => "WriteControl",
            Self::AddNotification => "AddNotification",
            Self::DeleteNotification => "DeleteNotification",
            Self::Notification => "Notification",
            Self::ReadWrite => "ReadWrite",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl From<u16> for CommandId {
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.as_u16())
    }
}

/// Header state flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StateFlags(u16);

impl StateFlags {
    /// Bit 0: set on responses.
    pub const RESPONSE: u16 = 0x0001;
    /// Bit 2: marks an ADS command (always set by this client).
    pub const ADS_COMMAND: u16 = 0x0004;

    pub const fn request() -> Self {
        Self(Self::ADS_COMMAND)
    }

    pub const fn response() -> Self {
        Self(Self::ADS_COMMAND | Self::RESPONSE)
    }

    pub const fn from_bits(bits: u16) -> Self {
        Self(bits)
    }

    pub const fn bits(self) -> u16 {
        self.0
    }

    pub const fn is_response(self) -> bool {
        self.0 & Self::RESPONSE != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_wire_protocol() {
        let expected = [
            (CommandId::Read, 2),
            (CommandId::Write, 3),
            (CommandId::ReadState, 4),
            (CommandId::WriteControl, 5),
            (CommandId::AddNotification, 6),
            (CommandId::DeleteNotification, 7),
            (CommandId::Notification, 8),
            (CommandId::ReadWrite, 9),
        ];
        for (command, tag) in expected {
            assert_eq!(command.as_u16(), tag);
            assert_eq!(CommandId::from_u16(tag), command);
        }
    }

    #[test]
    fn unknown_tags_are_preserved() {
        assert_eq!(CommandId::from_u16(0x42), CommandId::Unknown(0x42));
        assert_eq!(CommandId::Unknown(0x42).as_u16(), 0x42);
    }

    #[test]
    fn only_read_write_state_supported() {
        assert!(CommandId::Read.ensure_supported().is_ok());
        assert!(CommandId::Write.ensure_supported().is_ok());
        assert!(CommandId::ReadState.ensure_supported().is_ok());
        for command in [
            CommandId::WriteControl,
            CommandId::AddNotification,
            CommandId::DeleteNotification,
            CommandId::Notification,
            CommandId::ReadWrite,
            CommandId::Unknown(77),
        ] {
            assert!(matches!(
                command.ensure_supported(),
                Err(FrameError::UnsupportedCommand(c)) if c == command
            ));
        }
    }

    #[test]
    fn state_flags() {
        assert!(!StateFlags::request().is_response());
        assert!(StateFlags::response().is_response());
        assert_eq!(StateFlags::request().bits(), 0x0004);
        assert_eq!(StateFlags::response().bits(), 0x0005);
        assert!(StateFlags::from_bits(0x0001).is_response());
    }

    #[test]
    fn display_includes_tag() {
        assert_eq!(CommandId::ReadState.to_string(), "ReadState(4)");
        assert_eq!(CommandId::Unknown(99).to_string(), "Unknown(99)");
    }
}
