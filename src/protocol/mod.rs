//! Protocol module - wire format, framing, and payload shapes.
//!
//! This module implements the binary protocol spoken on the gateway socket:
//! - 7-byte header encoding/decoding and validation
//! - Frame reading (header then payload) and response encoding
//! - JSON payload types: [`Request`], [`Response`], [`AsyncEnvelope`]

mod frame;
mod message;
mod wire_format;

pub use frame::{build_frame, encode_response, read_frame, read_header, read_payload, Frame};
pub use message::{AsyncEnvelope, Request, Response};
pub use wire_format::{
    decode_header, payload_length, validate_header, FrameType, Header, HEADER_SIZE,
    MAX_PAYLOAD_SIZE, MIN_PROTOCOL_VERSION, PROTOCOL_VERSION,
};
