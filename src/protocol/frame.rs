//! Frame struct, frame encoding, and stream reading.
//!
//! Represents a complete protocol frame with header and payload.
//! Uses `bytes::Bytes` for zero-copy payload sharing.
//!
//! Reading follows the two-step cycle of the connection engine: exactly
//! [`HEADER_SIZE`] bytes for the header, then exactly `length` payload bytes.
//!
//! # Example
//!
//! ```
//! use hammer_gateway::protocol::{encode_response, Header, FrameType, HEADER_SIZE};
//!
//! let bytes = encode_response(0x0101, br#"{"status":200}"#).unwrap();
//! let header = Header::decode(&bytes[..HEADER_SIZE]).unwrap();
//!
//! assert_eq!(header.frame_type, FrameType::Response);
//! assert_eq!(header.length as usize, bytes.len() - HEADER_SIZE);
//! ```

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::wire_format::{payload_length, FrameType, Header, HEADER_SIZE};
use crate::error::{ProtocolError, Result};

/// A complete protocol frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Decoded header.
    pub header: Header,
    /// Payload bytes (zero-copy via `bytes::Bytes`).
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame from header and payload.
    pub fn new(header: Header, payload: Bytes) -> Self {
        Self { header, payload }
    }

    /// Get a reference to the payload bytes.
    #[inline]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Get the frame type.
    #[inline]
    pub fn frame_type(&self) -> FrameType {
        self.header.frame_type
    }

    /// Get the protocol version.
    #[inline]
    pub fn version(&self) -> u16 {
        self.header.version
    }

    /// Check if this is a response.
    #[inline]
    pub fn is_response(&self) -> bool {
        self.header.frame_type == FrameType::Response
    }
}

/// Build a complete frame as a single byte vector.
///
/// The header's length field is taken from `payload`, which must not exceed
/// [`MAX_PAYLOAD_SIZE`](super::MAX_PAYLOAD_SIZE).
pub fn build_frame(
    version: u16,
    frame_type: FrameType,
    payload: &[u8],
) -> std::result::Result<Vec<u8>, ProtocolError> {
    let header = Header::new(version, frame_type, payload_length(payload.len())?);
    let mut buf = Vec::with_capacity(HEADER_SIZE + payload.len());
    buf.extend_from_slice(&header.encode());
    buf.extend_from_slice(payload);
    Ok(buf)
}

/// Encode a response frame: a 7-byte header with type=Response followed by `payload`.
#[inline]
pub fn encode_response(version: u16, payload: &[u8]) -> std::result::Result<Vec<u8>, ProtocolError> {
    build_frame(version, FrameType::Response, payload)
}

/// Read exactly one header from `reader`.
///
/// Returns `Ok(None)` on a clean end-of-stream before the first header byte.
/// A stream that ends part-way through the header is a `MalformedHeader`.
pub async fn read_header<R>(reader: &mut R) -> Result<Option<Header>>
where
    R: AsyncRead + Unpin,
{
    let mut buf = [0u8; HEADER_SIZE];
    let mut filled = 0;

    while filled < HEADER_SIZE {
        let n = reader.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled == 0 {
                return Ok(None);
            }
            return Err(ProtocolError::MalformedHeader { received: filled }.into());
        }
        filled += n;
    }

    Ok(Some(Header::decode(&buf)?))
}

/// Read exactly `header.length` payload bytes.
pub async fn read_payload<R>(reader: &mut R, header: &Header) -> Result<Bytes>
where
    R: AsyncRead + Unpin,
{
    let mut payload = vec![0u8; header.length as usize];
    reader.read_exact(&mut payload).await?;
    Ok(Bytes::from(payload))
}

/// Read, validate, and return the next frame.
///
/// Returns `Ok(None)` on a clean end-of-stream at a frame boundary.
pub async fn read_frame<R>(reader: &mut R) -> Result<Option<Frame>>
where
    R: AsyncRead + Unpin,
{
    let header = match read_header(reader).await? {
        Some(h) => h,
        None => return Ok(None),
    };
    header.validate()?;
    let payload = read_payload(reader, &header).await?;
    Ok(Some(Frame::new(header, payload)))
}
