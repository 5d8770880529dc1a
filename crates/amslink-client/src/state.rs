use std::fmt;

/// Lifecycle of a [`Connection`](crate::Connection).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Disconnected,
    /// TCP handshake outstanding.
    Connecting,
    Connected,
    /// Tear-down in progress.
    Closing,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Operating mode reported by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AdsState {
    Invalid,
    Idle,
    Reset,
    Init,
    Start,
    Run,
    Stop,
    SaveConfig,
    LoadConfig,
    PowerFailure,
    PowerGood,
    Error,
    Shutdown,
    Suspend,
    Resume,
    Config,
    Reconfig,
    Unknown(u16),
}

impl AdsState {
    pub const fn from_u16(value: u16) -> Self {
        match value {
            0 => Self::Invalid,
            1 => Self::Idle,
            2 => Self::Reset,
            3 => Self::Init,
            4 => Self::Start,
            5 => Self::Run,
            6 => Self::Stop,
            7 => Self::SaveConfig,
            8 => Self::LoadConfig,
            9 => Self::PowerFailure,
            10 => Self::PowerGood,
            11 => Self::Error,
            12 => Self::Shutdown,
            13 => Self::Suspend,
            14 => Self::Resume,
            15 => Self::Config,
            16 => Self::Reconfig,
            other => Self::Unknown(other),
        }
    }

    pub const fn as_u16(self) -> u16 {
        match self {
            Self::Invalid => 0,
            Self::Idle => 1,
            Self::Reset => 2,
            Self::Init => 3,
            Self::Start => 4,
            Self::Run => 5,
            Self::Stop => 6,
            Self::SaveConfig => 7,
            Self::LoadConfig => 8,
            Self::PowerFailure => 9,
            Self::PowerGood => 10,
            Self::Error => 11,
            Self::Shutdown => 12,
            Self::Suspend => 13,
            Self::Resume => 14,
            Self::Config => 15,
            Self::Reconfig => 16,
            Self::Unknown(other) => other,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Invalid => "Invalid",
            Self::Idle => "Idle",
            Self::Reset => "Reset",
            Self::Init => "Init",
            Self::Start => "Start",
            Self::Run => "Run",
            Self::Stop => "Stop",
            Self::SaveConfig => "SaveCfg",
            Self::LoadConfig => "LoadCfg",
            Self::PowerFailure => "PowerFailure",
            Self::PowerGood => "PowerGood",
            Self::Error => "Error",
            Self::Shutdown => "Shutdown",
            Self::Suspend => "Suspend",
            Self::Resume => "Resume",
            Self::Config => "Config",
            Self::Reconfig => "Reconfig",
            Self::Unknown(_) => "Unknown",
        }
    }
}

impl fmt::Display for AdsState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Result of a ReadState request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceStatus {
    pub ads_state: AdsState,
    /// Vendor-specific device state word.
    pub device_state: u16,
}

impl From<amslink_frame::ReadStateResponse> for DeviceStatus {
    fn from(raw: amslink_frame::ReadStateResponse) -> Self {
        Self {
            ads_state: AdsState::from_u16(raw.ads_state),
            device_state: raw.device_state,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ads_state_roundtrip_and_labels() {
        for value in 0..=16u16 {
            let state = AdsState::from_u16(value);
            assert_ne!(state, AdsState::Unknown(value));
            assert_eq!(state.as_u16(), value);
        }
        assert_eq!(AdsState::from_u16(5).label(), "Run");
        assert_eq!(AdsState::from_u16(11), AdsState::Error);
        assert_eq!(AdsState::from_u16(99), AdsState::Unknown(99));
        assert_eq!(AdsState::Unknown(99).to_string(), "Unknown");
    }

    #[test]
    fn device_status_from_wire() {
        let status = DeviceStatus::from(amslink_frame::ReadStateResponse {
            ads_state: 6,
            device_state: 3,
        });
        assert_eq!(status.ads_state, AdsState::Stop);
        assert_eq!(status.device_state, 3);
    }
}
