//! Command payloads.
//!
//! Requests use the symbolic (by-name) addressing mode only: the variable name
//! travels in the payload and the device resolves it. Responses start with a
//! 4-byte device result code; a non-zero code ends decoding right there.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::{wire_length, Frame};
use crate::command::CommandId;
use crate::error::{FrameError, Result};
use crate::header::{le_u16, le_u32};

/// Index group for "read/write symbol by name".
pub const SYMBOL_BY_NAME_GROUP: u32 = 0xF003;

/// Maximum value length requested by a symbolic read.
pub const SYMBOLIC_READ_LENGTH: u32 = 255;

/// Maximum symbol name length in bytes, excluding the NUL terminator.
pub const MAX_SYMBOL_NAME_LEN: usize = 255;

const READ_REQUEST_SIZE: usize = 12;
const WRITE_PREFIX_SIZE: usize = 8;
const RESULT_SIZE: usize = 4;

/// A validated PLC variable name such as `MAIN.Status`.
///
/// Non-empty, NUL-free and at most [`MAX_SYMBOL_NAME_LEN`] bytes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolName(String);

impl SymbolName {
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(FrameError::InvalidName("name is empty".to_string()));
        }
        if name.contains('\0') {
            return Err(FrameError::InvalidName(format!(
                "name {name:?} contains a NUL byte"
            )));
        }
        if name.len() > MAX_SYMBOL_NAME_LEN {
            return Err(FrameError::NameTooLong {
                len: name.len(),
                max: MAX_SYMBOL_NAME_LEN,
            });
        }
        Ok(Self(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name bytes followed by the NUL terminator.
    fn put_terminated(&self, dst: &mut BytesMut) {
        dst.put_slice(self.0.as_bytes());
        dst.put_u8(0);
    }

    fn wire_len(&self) -> usize {
        self.0.len() + 1
    }
}

impl FromStr for SymbolName {
    type Err = FrameError;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<&str> for SymbolName {
    type Error = FrameError;

    fn try_from(value: &str) -> Result<Self> {
        Self::new(value)
    }
}

impl AsRef<str> for SymbolName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SymbolName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Plain read request: index group, index offset, read length.
pub fn encode_read_request(index_group: u32, index_offset: u32, read_length: u32) -> Bytes {
    let mut buf = BytesMut::with_capacity(READ_REQUEST_SIZE);
    buf.put_u32_le(index_group);
    buf.put_u32_le(index_offset);
    buf.put_u32_le(read_length);
    buf.freeze()
}

/// Read-by-name request: 12-byte read prefix followed by the NUL-terminated name.
pub fn encode_symbolic_read_request(name: &SymbolName) -> Bytes {
    let mut buf = BytesMut::with_capacity(READ_REQUEST_SIZE + name.wire_len());
    buf.put_u32_le(SYMBOL_BY_NAME_GROUP);
    buf.put_u32_le(0);
    buf.put_u32_le(SYMBOLIC_READ_LENGTH);
    name.put_terminated(&mut buf);
    buf.freeze()
}

/// Inverse of [`encode_symbolic_read_request`].
pub fn decode_symbolic_read_request(payload: &[u8]) -> Result<SymbolName> {
    let rest = strip_symbolic_prefix(payload, READ_REQUEST_SIZE)?;
    let (name, _) = split_terminated_name(rest)?;
    Ok(name)
}

/// Write-by-name request: index group, offset, NUL-terminated name, raw value.
///
/// There is no value length prefix; the value runs to the end of the payload.
pub fn encode_symbolic_write_request(name: &SymbolName, value: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(WRITE_PREFIX_SIZE + name.wire_len() + value.len());
    buf.put_u32_le(SYMBOL_BY_NAME_GROUP);
    buf.put_u32_le(0);
    name.put_terminated(&mut buf);
    buf.put_slice(value);
    buf.freeze()
}

/// A decoded write-by-name request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolicWrite {
    pub name: SymbolName,
    pub value: Bytes,
}

/// Inverse of [`encode_symbolic_write_request`].
pub fn decode_symbolic_write_request(payload: &[u8]) -> Result<SymbolicWrite> {
    let rest = strip_symbolic_prefix(payload, WRITE_PREFIX_SIZE)?;
    let (name, value) = split_terminated_name(rest)?;
    Ok(SymbolicWrite {
        name,
        value: Bytes::copy_from_slice(value),
    })
}

/// ReadState carries no request payload.
pub fn encode_read_state_request() -> Bytes {
    Bytes::new()
}

/// Device state reported by a ReadState response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReadStateResponse {
    pub ads_state: u16,
    pub device_state: u16,
}

/// ReadState response payload: result, ADS state, device state (8 bytes).
pub fn encode_read_state_response(result: u32, state: ReadStateResponse) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_u32_le(result);
    buf.put_u16_le(state.ads_state);
    buf.put_u16_le(state.device_state);
    buf.freeze()
}

pub fn decode_read_state_response(frame: &Frame) -> Result<ReadStateResponse> {
    let body = check_response(frame, CommandId::ReadState)?;
    if body.len() != 4 {
        return Err(FrameError::LengthMismatch {
            declared: 4,
            actual: body.len(),
        });
    }
    Ok(ReadStateResponse {
        ads_state: le_u16(&body[0..2]),
        device_state: le_u16(&body[2..4]),
    })
}

/// Read response payload: result, data length, data.
///
/// Fails with `PayloadTooLarge` if `data` does not fit the `u32` length field.
pub fn encode_read_response(result: u32, data: &[u8]) -> Result<Bytes> {
    let length = wire_length(data.len())?;
    let mut buf = BytesMut::with_capacity(RESULT_SIZE + 4 + data.len());
    buf.put_u32_le(result);
    buf.put_u32_le(length);
    buf.put_slice(data);
    Ok(buf.freeze())
}

/// Raw value bytes of a Read response. Interpretation is left to the caller.
pub fn decode_read_response(frame: &Frame) -> Result<Bytes> {
    let body = check_response(frame, CommandId::Read)?;
    if body.len() < 4 {
        return Err(FrameError::ShortBuffer {
            needed: RESULT_SIZE + 4,
            actual: RESULT_SIZE + body.len(),
        });
    }
    let declared = le_u32(&body[0..4]) as usize;
    let data = &body[4..];
    if declared != data.len() {
        return Err(FrameError::LengthMismatch {
            declared,
            actual: data.len(),
        });
    }
    Ok(frame.payload.slice(RESULT_SIZE + 4..))
}

/// Write response payload: result only.
pub fn encode_write_response(result: u32) -> Bytes {
    Bytes::copy_from_slice(&result.to_le_bytes())
}

pub fn decode_write_response(frame: &Frame) -> Result<()> {
    check_response(frame, CommandId::Write).map(|_| ())
}

/// Shared response prologue: header error code, command match, result code.
///
/// Returns the payload after the result code.
fn check_response(frame: &Frame, expected: CommandId) -> Result<&[u8]> {
    if frame.header.error_code != 0 {
        return Err(FrameError::Device {
            code: frame.header.error_code,
        });
    }
    if frame.header.command != expected {
        return Err(FrameError::UnexpectedCommand {
            expected,
            actual: frame.header.command,
        });
    }
    if frame.payload.len() < RESULT_SIZE {
        return Err(FrameError::ShortBuffer {
            needed: RESULT_SIZE,
            actual: frame.payload.len(),
        });
    }
    let result = le_u32(&frame.payload[0..4]);
    if result != 0 {
        return Err(FrameError::Device { code: result });
    }
    Ok(&frame.payload[RESULT_SIZE..])
}

fn strip_symbolic_prefix(payload: &[u8], prefix: usize) -> Result<&[u8]> {
    if payload.len() < prefix {
        return Err(FrameError::ShortBuffer {
            needed: prefix,
            actual: payload.len(),
        });
    }
    let group = le_u32(&payload[0..4]);
    if group != SYMBOL_BY_NAME_GROUP {
        return Err(FrameError::UnexpectedIndexGroup(group));
    }
    Ok(&payload[prefix..])
}

fn split_terminated_name(src: &[u8]) -> Result<(SymbolName, &[u8])> {
    let nul = src
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| FrameError::InvalidName("missing NUL terminator".to_string()))?;
    let name = std::str::from_utf8(&src[..nul])
        .map_err(|_| FrameError::InvalidName("name is not valid UTF-8".to_string()))?;
    Ok((SymbolName::new(name)?, &src[nul + 1..]))
}
