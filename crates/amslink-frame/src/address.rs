//! AMS network identities.
//!
//! An [`AmsNetId`] is six octets written in dotted form (`192.168.1.100.1.1`).
//! Paired with a service port it forms an [`AmsAddress`], written
//! `192.168.1.100.1.1:851`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors produced while parsing addresses. Always raised before any I/O.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    /// Wrong number of dot-separated segments.
    #[error("malformed AMS net id '{input}': expected 6 octets, found {segments}")]
    MalformedAddress { input: String, segments: usize },

    /// A segment is not a decimal number.
    #[error("malformed AMS net id '{input}': '{segment}' is not a number")]
    InvalidOctet { input: String, segment: String },

    /// A segment does not fit in one octet.
    #[error("octet {value} out of range (0-255) in AMS net id '{input}'")]
    OctetOutOfRange { input: String, value: u64 },

    /// An AMS address without the `:port` suffix.
    #[error("AMS address '{0}' is missing ':port'")]
    MissingPort(String),

    /// The `:port` suffix is not a valid u16.
    #[error("invalid AMS port '{port}' in '{input}'")]
    InvalidPort { input: String, port: String },
}

/// Six-octet logical node identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct AmsNetId([u8; 6]);

impl AmsNetId {
    /// Wire length of a net id.
    pub const LEN: usize = 6;

    pub const fn new(octets: [u8; 6]) -> Self {
        Self(octets)
    }

    /// Wire representation.
    pub const fn to_bytes(self) -> [u8; 6] {
        self.0
    }

    pub const fn from_bytes(bytes: [u8; 6]) -> Self {
        Self(bytes)
    }

    /// Net id of a local router by convention: the host IPv4 address plus `.1.1`.
    pub const fn from_ipv4(ip: [u8; 4]) -> Self {
        Self([ip[0], ip[1], ip[2], ip[3], 1, 1])
    }
}

impl FromStr for AmsNetId {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = input.trim().split('.').collect();
        if segments.len() != Self::LEN {
            return Err(AddressError::MalformedAddress {
                input: input.to_string(),
                segments: segments.len(),
            });
        }

        let mut octets = [0u8; 6];
        for (slot, segment) in octets.iter_mut().zip(segments) {
            if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
                return Err(AddressError::InvalidOctet {
                    input: input.to_string(),
                    segment: segment.to_string(),
                });
            }
            // Digits only, so the only parse failure left is overflow.
            let value = segment.parse::<u64>().unwrap_or(u64::MAX);
            *slot = u8::try_from(value).map_err(|_| AddressError::OctetOutOfRange {
                input: input.to_string(),
                value,
            })?;
        }
        Ok(Self(octets))
    }
}

impl fmt::Display for AmsNetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a}.{b}.{c}.{d}.{e}.{g}")
    }
}

impl Serialize for AmsNetId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for AmsNetId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

/// Net id plus service port: the full logical address of a device service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct AmsAddress {
    pub net_id: AmsNetId,
    pub port: u16,
}

impl AmsAddress {
    /// Wire length: 6-byte net id plus 2-byte port.
    pub const LEN: usize = 8;

    pub const fn new(net_id: AmsNetId, port: u16) -> Self {
        Self { net_id, port }
    }
}

impl FromStr for AmsAddress {
    type Err = AddressError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let (net_id, port) = input
            .trim()
            .rsplit_once(':')
            .ok_or_else(|| AddressError::MissingPort(input.to_string()))?;
        let port = port.parse::<u16>().map_err(|_| AddressError::InvalidPort {
            input: input.to_string(),
            port: port.to_string(),
        })?;
        Ok(Self {
            net_id: net_id.parse()?,
            port,
        })
    }
}

impl fmt::Display for AmsAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.net_id, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dotted_net_id() {
        let id: AmsNetId = "192.168.1.100.1.1".parse().unwrap();
        assert_eq!(id.to_bytes(), [192, 168, 1, 100, 1, 1]);
        assert_eq!(id.to_string(), "192.168.1.100.1.1");
    }

    #[test]
    fn wire_bytes_roundtrip() {
        let id = AmsNetId::from_bytes([5, 6, 7, 8, 1, 1]);
        assert_eq!(AmsNetId::from_bytes(id.to_bytes()), id);
    }

    #[test]
    fn wrong_segment_count_is_malformed() {
        let err = "10.0.0.1.1".parse::<AmsNetId>().unwrap_err();
        assert!(matches!(err, AddressError::MalformedAddress { segments: 5, .. }));

        let err = "10.0.0.1.1.1.1".parse::<AmsNetId>().unwrap_err();
        assert!(matches!(err, AddressError::MalformedAddress { segments: 7, .. }));
    }

    #[test]
    fn octet_above_255_is_out_of_range() {
        let err = "10.0.0.256.1.1".parse::<AmsNetId>().unwrap_err();
        assert!(matches!(err, AddressError::OctetOutOfRange { value: 256, .. }));
    }

    #[test]
    fn huge_octet_is_out_of_range_not_a_panic() {
        let err = "10.0.0.99999999999999999999999.1.1"
            .parse::<AmsNetId>()
            .unwrap_err();
        assert!(matches!(err, AddressError::OctetOutOfRange { .. }));
    }

    #[test]
    fn non_numeric_segment_is_rejected() {
        for input in ["10.0.x.1.1.1", "10..0.1.1.1", "10.0.-1.1.1.1"] {
            let err = input.parse::<AmsNetId>().unwrap_err();
            assert!(matches!(err, AddressError::InvalidOctet { .. }), "{input}");
        }
    }

    #[test]
    fn from_ipv4_appends_router_suffix() {
        assert_eq!(
            AmsNetId::from_ipv4([172, 16, 0, 5]).to_string(),
            "172.16.0.5.1.1"
        );
    }

    #[test]
    fn parse_full_address() {
        let addr: AmsAddress = "5.6.7.8.1.1:851".parse().unwrap();
        assert_eq!(addr.net_id.to_bytes(), [5, 6, 7, 8, 1, 1]);
        assert_eq!(addr.port, 851);
        assert_eq!(addr.to_string(), "5.6.7.8.1.1:851");
    }

    #[test]
    fn address_requires_port() {
        assert!(matches!(
            "5.6.7.8.1.1".parse::<AmsAddress>(),
            Err(AddressError::MissingPort(_))
        ));
        assert!(matches!(
            "5.6.7.8.1.1:70000".parse::<AmsAddress>(),
            Err(AddressError::InvalidPort { .. })
        ));
    }

    #[test]
    fn serde_uses_dotted_form() {
        let addr = AmsAddress::new("1.2.3.4.1.1".parse().unwrap(), 851);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, r#"{"net_id":"1.2.3.4.1.1","port":851}"#);
        let back: AmsAddress = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);

        let bad = serde_json::from_str::<AmsAddress>(r#"{"net_id":"1.2.3","port":1}"#);
        assert!(bad.is_err());
    }
}
