use bytes::{BufMut, BytesMut};

use crate::address::{AmsAddress, AmsNetId};
use crate::command::{CommandId, StateFlags};
use crate::error::{FrameError, Result};

/// AMS header size in bytes.
pub const HEADER_SIZE: usize = 32;

/// The fixed 32-byte header in front of every payload.
///
/// Wire format (little-endian):
/// ```text
/// ┌────────────────┬────────────────┬─────────┬───────┬────────┬───────┬──────────┐
/// │ Target (6+2B)  │ Source (6+2B)  │ Cmd 2B  │ Flags │ Len 4B │ Err 4B│ Invoke 4B│
/// │ net id, port   │ net id, port   │         │ 2B    │        │       │          │
/// └────────────────┴────────────────┴─────────┴───────┴────────┴───────┴──────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AmsHeader {
    pub target: AmsAddress,
    pub source: AmsAddress,
    pub command: CommandId,
    pub state_flags: StateFlags,
    /// Number of payload bytes following the header.
    pub length: u32,
    /// Zero on requests; non-zero on failed responses.
    pub error_code: u32,
    pub invoke_id: u32,
}

impl AmsHeader {
    /// A request header. Length is filled in by [`encode_frame`](crate::encode_frame).
    pub fn request(
        target: AmsAddress,
        source: AmsAddress,
        command: CommandId,
        invoke_id: u32,
    ) -> Self {
        Self {
            target,
            source,
            command,
            state_flags: StateFlags::request(),
            length: 0,
            error_code: 0,
            invoke_id,
        }
    }

    /// The response header a device sends back for this request: addresses
    /// swapped, response flag set.
    pub fn response_to(&self, error_code: u32) -> Self {
        Self {
            target: self.source,
            source: self.target,
            command: self.command,
            state_flags: StateFlags::response(),
            length: 0,
            error_code,
            invoke_id: self.invoke_id,
        }
    }

    pub fn is_response(&self) -> bool {
        self.state_flags.is_response()
    }
}

/// Append the 32-byte header to `dst`.
pub fn encode_header(header: &AmsHeader, dst: &mut BytesMut) {
    dst.reserve(HEADER_SIZE);
    put_address(dst, &header.target);
    put_address(dst, &header.source);
    dst.put_u16_le(header.command.as_u16());
    dst.put_u16_le(header.state_flags.bits());
    dst.put_u32_le(header.length);
    dst.put_u32_le(header.error_code);
    dst.put_u32_le(header.invoke_id);
}

/// Decode a header from the first 32 bytes of `src`.
///
/// Extra bytes after the header are ignored; the caller is responsible for
/// reading exactly `length` more bytes before decoding the payload.
pub fn decode_header(src: &[u8]) -> Result<AmsHeader> {
    if src.len() < HEADER_SIZE {
        return Err(FrameError::ShortBuffer {
            needed: HEADER_SIZE,
            actual: src.len(),
        });
    }

    Ok(AmsHeader {
        target: get_address(&src[0..8]),
        source: get_address(&src[8..16]),
        command: CommandId::from_u16(le_u16(&src[16..18])),
        state_flags: StateFlags::from_bits(le_u16(&src[18..20])),
        length: le_u32(&src[20..24]),
        error_code: le_u32(&src[24..28]),
        invoke_id: le_u32(&src[28..32]),
    })
}

fn put_address(dst: &mut BytesMut, addr: &AmsAddress) {
    dst.put_slice(&addr.net_id.to_bytes());
    dst.put_u16_le(addr.port);
}

fn get_address(src: &[u8]) -> AmsAddress {
    let mut net_id = [0u8; 6];
    net_id.copy_from_slice(&src[0..6]);
    AmsAddress::new(AmsNetId::from_bytes(net_id), le_u16(&src[6..8]))
}

pub(crate) fn le_u16(src: &[u8]) -> u16 {
    u16::from_le_bytes([src[0], src[1]])
}

pub(crate) fn le_u32(src: &[u8]) -> u32 {
    u32::from_le_bytes([src[0], src[1], src[2], src[3]])
}
