//! Typed interpretation of raw variable bytes.
//!
//! The wire codec never guesses types: a read returns bytes. These types turn
//! those bytes into values (and back) once the caller says what the variable
//! is. All numbers are little-endian, as the controller stores them.

use std::fmt;
use std::str::FromStr;

use amslink_frame::MAX_SYMBOL_NAME_LEN;
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, Result};

/// Declared type of a PLC variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Bool,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Real32,
    Real64,
    /// NUL-terminated string, at most 255 bytes.
    Text,
    /// Uninterpreted bytes.
    Raw,
}

impl ValueKind {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Int16 => "int16",
            Self::UInt16 => "uint16",
            Self::Int32 => "int32",
            Self::UInt32 => "uint32",
            Self::Real32 => "real32",
            Self::Real64 => "real64",
            Self::Text => "text",
            Self::Raw => "raw",
        }
    }

    /// Encoded width for fixed-size kinds.
    pub const fn width(self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::Int16 | Self::UInt16 => Some(2),
            Self::Int32 | Self::UInt32 | Self::Real32 => Some(4),
            Self::Real64 => Some(8),
            Self::Text | Self::Raw => None,
        }
    }

    /// Interpret bytes returned by a read.
    ///
    /// Fixed-size kinds need at least their width and use the leading bytes;
    /// a device answering the fixed 255-byte symbolic read pads the rest.
    pub fn decode(self, bytes: &[u8]) -> Result<PlcValue> {
        if let Some(width) = self.width() {
            if bytes.len() < width {
                return Err(ClientError::Decoding(format!(
                    "{} needs {width} bytes, got {}",
                    self.name(),
                    bytes.len()
                )));
            }
        }

        let value = match self {
            Self::Bool => PlcValue::Bool(bytes[0] != 0),
            Self::Int16 => PlcValue::Int16(i16::from_le_bytes([bytes[0], bytes[1]])),
            Self::UInt16 => PlcValue::UInt16(u16::from_le_bytes([bytes[0], bytes[1]])),
            Self::Int32 => PlcValue::Int32(i32::from_le_bytes(array4(bytes))),
            Self::UInt32 => PlcValue::UInt32(u32::from_le_bytes(array4(bytes))),
            Self::Real32 => PlcValue::Real32(f32::from_le_bytes(array4(bytes))),
            Self::Real64 => {
                let mut raw = [0u8; 8];
                raw.copy_from_slice(&bytes[..8]);
                PlcValue::Real64(f64::from_le_bytes(raw))
            }
            Self::Text => {
                let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
                PlcValue::Text(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            Self::Raw => PlcValue::Raw(bytes.to_vec()),
        };
        Ok(value)
    }

    /// Build a value from command-line text.
    ///
    /// Raw values are hex, optionally `0x`-prefixed, whitespace ignored.
    pub fn parse(self, text: &str) -> Result<PlcValue> {
        let bad = |detail: &dyn fmt::Display| {
            ClientError::Encoding(format!("invalid {} value '{text}': {detail}", self.name()))
        };
        let trimmed = text.trim();
        let value = match self {
            Self::Bool => match trimmed.to_ascii_lowercase().as_str() {
                "true" | "1" | "on" => PlcValue::Bool(true),
                "false" | "0" | "off" => PlcValue::Bool(false),
                _ => return Err(bad(&"expected true/false")),
            },
            Self::Int16 => PlcValue::Int16(trimmed.parse().map_err(|e| bad(&e))?),
            Self::UInt16 => PlcValue::UInt16(trimmed.parse().map_err(|e| bad(&e))?),
            Self::Int32 => PlcValue::Int32(trimmed.parse().map_err(|e| bad(&e))?),
            Self::UInt32 => PlcValue::UInt32(trimmed.parse().map_err(|e| bad(&e))?),
            Self::Real32 => PlcValue::Real32(trimmed.parse().map_err(|e| bad(&e))?),
            Self::Real64 => PlcValue::Real64(trimmed.parse().map_err(|e| bad(&e))?),
            Self::Text => PlcValue::Text(text.to_string()),
            Self::Raw => PlcValue::Raw(parse_hex(trimmed).map_err(|e| bad(&e))?),
        };
        Ok(value)
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ValueKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let kind = match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "bit" => Self::Bool,
            "int16" | "int" | "i16" => Self::Int16,
            "uint16" | "uint" | "word" | "u16" => Self::UInt16,
            "int32" | "dint" | "i32" => Self::Int32,
            "uint32" | "udint" | "dword" | "u32" => Self::UInt32,
            "real32" | "real" | "f32" => Self::Real32,
            "real64" | "lreal" | "f64" => Self::Real64,
            "text" | "string" | "str" => Self::Text,
            "raw" | "bytes" | "hex" => Self::Raw,
            other => {
                return Err(ClientError::Encoding(format!("unknown value kind '{other}'")));
            }
        };
        Ok(kind)
    }
}

/// A typed PLC variable value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PlcValue {
    Bool(bool),
    Int16(i16),
    UInt16(u16),
    Int32(i32),
    UInt32(u32),
    Real32(f32),
    Real64(f64),
    Text(String),
    Raw(Vec<u8>),
}

impl PlcValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            Self::Bool(_) => ValueKind::Bool,
            Self::Int16(_) => ValueKind::Int16,
            Self::UInt16(_) => ValueKind::UInt16,
            Self::Int32(_) => ValueKind::Int32,
            Self::UInt32(_) => ValueKind::UInt32,
            Self::Real32(_) => ValueKind::Real32,
            Self::Real64(_) => ValueKind::Real64,
            Self::Text(_) => ValueKind::Text,
            Self::Raw(_) => ValueKind::Raw,
        }
    }

    /// Little-endian bytes to write. Text gets a trailing NUL.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            Self::Bool(v) => vec![u8::from(*v)],
            Self::Int16(v) => v.to_le_bytes().to_vec(),
            Self::UInt16(v) => v.to_le_bytes().to_vec(),
            Self::Int32(v) => v.to_le_bytes().to_vec(),
            Self::UInt32(v) => v.to_le_bytes().to_vec(),
            Self::Real32(v) => v.to_le_bytes().to_vec(),
            Self::Real64(v) => v.to_le_bytes().to_vec(),
            Self::Text(text) => {
                if text.as_bytes().contains(&0) {
                    return Err(ClientError::Encoding(
                        "text value contains a NUL byte".to_string(),
                    ));
                }
                if text.len() > MAX_SYMBOL_NAME_LEN {
                    return Err(ClientError::Encoding(format!(
                        "text value is {} bytes, max {MAX_SYMBOL_NAME_LEN}",
                        text.len()
                    )));
                }
                let mut bytes = Vec::with_capacity(text.len() + 1);
                bytes.extend_from_slice(text.as_bytes());
                bytes.push(0);
                bytes
            }
            Self::Raw(bytes) => bytes.clone(),
        };
        Ok(bytes)
    }
}

impl fmt::Display for PlcValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int16(v) => write!(f, "{v}"),
            Self::UInt16(v) => write!(f, "{v}"),
            Self::Int32(v) => write!(f, "{v}"),
            Self::UInt32(v) => write!(f, "{v}"),
            Self::Real32(v) => write!(f, "{v}"),
            Self::Real64(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
            Self::Raw(bytes) => {
                for byte in bytes {
                    write!(f, "{byte:02x}")?;
                }
                Ok(())
            }
        }
    }
}

impl From<bool> for PlcValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i16> for PlcValue {
    fn from(value: i16) -> Self {
        Self::Int16(value)
    }
}

impl From<u16> for PlcValue {
    fn from(value: u16) -> Self {
        Self::UInt16(value)
    }
}

impl From<i32> for PlcValue {
    fn from(value: i32) -> Self {
        Self::Int32(value)
    }
}

impl From<u32> for PlcValue {
    fn from(value: u32) -> Self {
        Self::UInt32(value)
    }
}

impl From<f32> for PlcValue {
    fn from(value: f32) -> Self {
        Self::Real32(value)
    }
}

impl From<f64> for PlcValue {
    fn from(value: f64) -> Self {
        Self::Real64(value)
    }
}

impl From<&str> for PlcValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for PlcValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<Vec<u8>> for PlcValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Raw(value)
    }
}

fn array4(bytes: &[u8]) -> [u8; 4] {
    [bytes[0], bytes[1], bytes[2], bytes[3]]
}

fn parse_hex(text: &str) -> std::result::Result<Vec<u8>, String> {
    let digits: String = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text)
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();
    if !digits.is_ascii() {
        return Err("non-hex characters".to_string());
    }
    if digits.len() % 2 != 0 {
        return Err("odd number of hex digits".to_string());
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| format!("invalid hex byte '{}'", &digits[i..i + 2]))
        })
        .collect()
}
