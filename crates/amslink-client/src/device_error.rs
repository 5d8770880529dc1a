//! Device error codes.
//!
//! The device reports failures as a 32-bit code, either in the response header
//! or in the first four payload bytes. Known router and device codes map to
//! named variants; anything else is kept verbatim as [`DeviceError::Unknown`].

use std::fmt;

macro_rules! device_errors {
    ($($variant:ident = $code:literal => $label:literal,)+) => {
        /// Closed taxonomy of device error codes.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum DeviceError {
            $($variant,)+
            /// A code outside the known set.
            Unknown(u32),
        }

        impl DeviceError {
            pub const fn from_code(code: u32) -> Self {
                match code {
                    $($code => Self::$variant,)+
                    other => Self::Unknown(other),
                }
            }

            /// The code exactly as the device sent it.
            pub const fn code(self) -> u32 {
                match self {
                    $(Self::$variant => $code,)+
                    Self::Unknown(code) => code,
                }
            }

            pub const fn label(self) -> &'static str {
                match self {
                    $(Self::$variant => $label,)+
                    Self::Unknown(_) => "unknown device error",
                }
            }
        }
    };
}

device_errors! {
    TargetPortNotFound = 0x0006 => "target port not found",
    TargetMachineNotFound = 0x0007 => "target machine not found",
    General = 0x0700 => "general device error",
    ServiceNotSupported = 0x0701 => "service not supported",
    InvalidIndexGroup = 0x0702 => "invalid index group",
    InvalidIndexOffset = 0x0703 => "invalid index offset",
    AccessDenied = 0x0704 => "reading or writing not permitted",
    InvalidSize = 0x0705 => "parameter size not correct",
    InvalidData = 0x0706 => "invalid data values",
    NotReady = 0x0707 => "device not ready to operate",
    Busy = 0x0708 => "device busy",
    InvalidContext = 0x0709 => "invalid operating system context",
    OutOfMemory = 0x070A => "insufficient memory",
    InvalidParameter = 0x070B => "invalid parameter values",
    NotFound = 0x070C => "not found",
    SyntaxError = 0x070D => "syntax error in command or file",
    Incompatible = 0x070E => "objects do not match",
    AlreadyExists = 0x070F => "object already exists",
    SymbolNotFound = 0x0710 => "symbol not found",
    SymbolVersionInvalid = 0x0711 => "symbol version invalid",
    InvalidState = 0x0712 => "device in invalid state",
    TransModeNotSupported = 0x0713 => "transmission mode not supported",
    InvalidNotificationHandle = 0x0714 => "notification handle is invalid",
    ClientUnknown = 0x0715 => "notification client not registered",
    NoMoreHandles = 0x0716 => "no further notification handles available",
    InvalidWatchSize = 0x0717 => "notification size too large",
    NotInitialized = 0x0718 => "device not initialized",
    DeviceTimeout = 0x0719 => "device has a timeout",
    NoInterface = 0x071A => "interface query failed",
    InvalidInterface = 0x071B => "wrong interface requested",
    InvalidClassId = 0x071C => "class id is invalid",
    InvalidObjectId = 0x071D => "object id is invalid",
}

impl DeviceError {
    pub fn is_known(self) -> bool {
        !matches!(self, Self::Unknown(_))
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = self.code();
        write!(f, "{} (code {code}, {code:#06x})", self.label())
    }
}

impl std::error::Error for DeviceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symbol_not_found_is_1808() {
        let err = DeviceError::from_code(1808);
        assert_eq!(err, DeviceError::SymbolNotFound);
        assert_eq!(err.code(), 1808);
        assert_eq!(err.label(), "symbol not found");
    }

    #[test]
    fn every_known_code_roundtrips() {
        for code in (0x0700..=0x071D).chain([0x0006, 0x0007]) {
            let err = DeviceError::from_code(code);
            assert!(err.is_known(), "{code:#x}");
            assert_eq!(err.code(), code);
        }
    }

    #[test]
    fn unknown_codes_are_preserved() {
        let err = DeviceError::from_code(0xDEAD);
        assert_eq!(err, DeviceError::Unknown(0xDEAD));
        assert_eq!(err.code(), 0xDEAD);
        assert!(!err.is_known());
        assert_eq!(err.label(), "unknown device error");
    }

    #[test]
    fn display_format() {
        assert_eq!(
            DeviceError::ServiceNotSupported.to_string(),
            "service not supported (code 1793, 0x0701)"
        );
    }
}
