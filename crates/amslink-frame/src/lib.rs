//! AMS addressing and frame codec for the ADS automation protocol.
//!
//! Every frame is a fixed 32-byte little-endian header followed by a
//! command-specific payload:
//! - target and source AMS addresses (6-byte net id + 2-byte port each)
//! - command id, state flags, payload length, error code, invoke id
//!
//! The codec is pure: it maps typed requests and responses to bytes and back
//! without touching a socket. [`AmsCodec`] adapts it to `tokio_util::codec`
//! for stream transports that deliver partial or coalesced reads.

pub mod address;
pub mod codec;
pub mod command;
pub mod error;
pub mod header;
pub mod payload;

pub use address::{AddressError, AmsAddress, AmsNetId};
pub use codec::{
    decode_frame, decode_frame_stream, encode_frame, AmsCodec, Frame, FrameConfig,
    DEFAULT_MAX_PAYLOAD,
};
pub use command::{CommandId, StateFlags};
pub use error::{FrameError, Result};
pub use header::{decode_header, encode_header, AmsHeader, HEADER_SIZE};
pub use payload::{
    decode_read_response, decode_read_state_response, decode_symbolic_read_request,
    decode_symbolic_write_request, decode_write_response, encode_read_request,
    encode_read_response, encode_read_state_request, encode_read_state_response,
    encode_symbolic_read_request, encode_symbolic_write_request, encode_write_response,
    ReadStateResponse, SymbolName, SymbolicWrite, MAX_SYMBOL_NAME_LEN, SYMBOLIC_READ_LENGTH,
    SYMBOL_BY_NAME_GROUP,
};
