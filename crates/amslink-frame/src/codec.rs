use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};
use tracing::trace;

use crate::error::{FrameError, Result};
use crate::header::{decode_header, encode_header, AmsHeader, HEADER_SIZE};

/// Default maximum payload size: 1 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 1024 * 1024;

/// One complete header + payload unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: AmsHeader,
    pub payload: Bytes,
}

impl Frame {
    /// Create a frame; the header length is set from the payload.
    pub fn new(mut header: AmsHeader, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        header.length = payload.len() as u32;
        Self { header, payload }
    }

    /// The total wire size of this frame (header + payload).
    pub fn wire_size(&self) -> usize {
        HEADER_SIZE + self.payload.len()
    }
}

/// A byte count as carried in a `u32` length field.
pub(crate) fn wire_length(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| FrameError::PayloadTooLarge {
        size: len,
        max: u32::MAX as usize,
    })
}

/// Encode header + payload into `dst`.
///
/// The header's length field is overwritten with the real payload size so
/// the two can never disagree on the wire.
pub fn encode_frame(header: &AmsHeader, payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    let length = wire_length(payload.len())?;
    let header = AmsHeader { length, ..*header };
    dst.reserve(HEADER_SIZE + payload.len());
    encode_header(&header, dst);
    dst.extend_from_slice(payload);
    Ok(())
}

/// Decode one frame from a buffer that holds exactly one frame.
///
/// Fails with [`FrameError::LengthMismatch`] if the bytes after the header do
/// not match the header's length field in either direction.
pub fn decode_frame(src: &[u8]) -> Result<Frame> {
    let header = decode_header(src)?;
    let declared = header.length as usize;
    let actual = src.len() - HEADER_SIZE;
    if declared != actual {
        return Err(FrameError::LengthMismatch { declared, actual });
    }
    Ok(Frame {
        header,
        payload: Bytes::copy_from_slice(&src[HEADER_SIZE..]),
    })
}

/// Decode a frame from a stream buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the frame's bytes from the buffer.
pub fn decode_frame_stream(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    if src.len() < HEADER_SIZE {
        return Ok(None); // Need more data
    }

    let header = decode_header(src)?;
    let payload_len = header.length as usize;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = HEADER_SIZE + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None); // Need more data
    }

    src.advance(HEADER_SIZE);
    let payload = src.split_to(payload_len).freeze();
    Ok(Some(Frame { header, payload }))
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 1 MiB.
    pub max_payload_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// `tokio_util` codec over [`decode_frame_stream`] / [`encode_frame`].
#[derive(Debug, Clone, Default)]
pub struct AmsCodec {
    config: FrameConfig,
}

impl AmsCodec {
    pub fn new(config: FrameConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl Decoder for AmsCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        let frame = decode_frame_stream(src, self.config.max_payload_size)?;
        if let Some(frame) = &frame {
            trace!(
                command = %frame.header.command,
                invoke_id = frame.header.invoke_id,
                length = frame.header.length,
                "decoded frame"
            );
        }
        Ok(frame)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Frame>> {
        match self.decode(src)? {
            Some(frame) => Ok(Some(frame)),
            None if src.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed),
        }
    }
}

impl Encoder<Frame> for AmsCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<()> {
        if frame.payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: frame.payload.len(),
                max: self.config.max_payload_size,
            });
        }
        encode_frame(&frame.header, &frame.payload, dst)
    }
}
