use std::path::Path;
use std::time::Duration;

use amslink_frame::{AmsAddress, AmsNetId, DEFAULT_MAX_PAYLOAD, HEADER_SIZE};
use amslink_transport::DEFAULT_ROUTER_PORT;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Default AMS port of the first PLC runtime.
pub const DEFAULT_PLC_PORT: u16 = 851;

/// Default AMS port this client identifies itself with.
pub const DEFAULT_SOURCE_PORT: u16 = 32905;

/// Upper bound for every configured timeout and interval.
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Logical device address plus the physical socket target.
///
/// The two differ because frames are routed: the socket goes to an AMS
/// router at `host:port`, which forwards by net id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: AmsAddress,
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: AmsAddress, host: impl Into<String>, port: u16) -> Self {
        Self {
            address,
            host: host.into(),
            port,
        }
    }

    /// `host:port` of the router socket.
    pub fn socket_target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            address: AmsAddress::new(
                AmsNetId::new([192, 168, 1, 100, 1, 1]),
                DEFAULT_PLC_PORT,
            ),
            host: "192.168.1.100".to_string(),
            port: DEFAULT_ROUTER_PORT,
        }
    }
}

/// Client configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Device to talk to.
    pub endpoint: Endpoint,
    /// Our own logical identity, written into every request header.
    pub source: AmsAddress,
    /// Per-request deadline.
    #[serde(with = "millis")]
    pub request_timeout: Duration,
    /// Bound on the TCP handshake.
    #[serde(with = "millis")]
    pub connect_timeout: Duration,
    /// How often overdue requests are swept.
    #[serde(with = "millis")]
    pub sweep_interval: Duration,
    /// Largest inbound payload accepted before the frame is treated as corrupt.
    pub max_payload_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: Endpoint::default(),
            source: AmsAddress::new(AmsNetId::new([127, 0, 0, 1, 1, 1]), DEFAULT_SOURCE_PORT),
            request_timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(5),
            sweep_interval: Duration::from_millis(100),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl ClientConfig {
    pub fn new(endpoint: Endpoint, source: AmsAddress) -> Self {
        Self {
            endpoint,
            source,
            ..Self::default()
        }
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    /// Load from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|err| ClientError::Config(format!("reading {}: {err}", path.display())))?;
        Self::from_json_str(&text)
            .map_err(|err| ClientError::Config(format!("{}: {err}", path.display())))
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|err| ClientError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that would hang, never time out, or overflow a
    /// deadline.
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.host.trim().is_empty() {
            return Err(ClientError::Config("endpoint host is empty".to_string()));
        }
        if self.endpoint.port == 0 {
            return Err(ClientError::Config("endpoint port is 0".to_string()));
        }
        for (name, value) in [
            ("request_timeout", self.request_timeout),
            ("connect_timeout", self.connect_timeout),
            ("sweep_interval", self.sweep_interval),
        ] {
            if value.is_zero() {
                return Err(ClientError::Config(format!("{name} must be greater than zero")));
            }
            if value > MAX_TIMEOUT {
                return Err(ClientError::Config(format!(
                    "{name} must be at most {}s",
                    MAX_TIMEOUT.as_secs()
                )));
            }
        }
        if self.max_payload_size < HEADER_SIZE {
            return Err(ClientError::Config(format!(
                "max_payload_size must be at least {HEADER_SIZE}"
            )));
        }
        Ok(())
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
