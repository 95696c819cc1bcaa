//! Wire format encoding and decoding.
//!
//! Implements the 7-byte header format:
//! ```text
//! ┌──────────┬───────┬──────────┐
//! │ Version  │ Type  │ Length   │
//! │ 2 bytes  │ 1 byte│ 4 bytes  │
//! │ uint16 BE│       │ uint32 BE│
//! └──────────┴───────┴──────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. The payload that follows is UTF-8 JSON.

use crate::error::ProtocolError;

/// Header size in bytes (fixed, exactly 7).
pub const HEADER_SIZE: usize = 7;

/// Maximum payload size (4 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 4 * 1024 * 1024;

/// Lowest protocol version the gateway accepts (v1.1).
pub const MIN_PROTOCOL_VERSION: u16 = 0x0101;

/// Version written by [`GatewayClient`](crate::GatewayClient).
pub const PROTOCOL_VERSION: u16 = 0x0101;

/// Frame type carried in byte 2 of the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Request answered inline on the same connection.
    SyncRequest = 0x01,
    /// Request registered with the correlator and answered later.
    AsyncRequest = 0x04,
    /// Response to either kind of request.
    Response = 0x05,
}

impl FrameType {
    /// Raw wire value.
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for FrameType {
    type Error = ProtocolError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::SyncRequest),
            0x04 => Ok(Self::AsyncRequest),
            0x05 => Ok(Self::Response),
            other => Err(ProtocolError::UnknownFrameType(other)),
        }
    }
}

/// Decoded header from wire format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Protocol version (echoed back on responses).
    pub version: u16,
    /// Frame type.
    pub frame_type: FrameType,
    /// Payload length in bytes.
    pub length: u32,
}

impl Header {
    /// Create a new header.
    pub fn new(version: u16, frame_type: FrameType, length: u32) -> Self {
        Self {
            version,
            frame_type,
            length,
        }
    }

    /// Header for a response frame.
    pub fn response(version: u16, length: u32) -> Self {
        Self::new(version, FrameType::Response, length)
    }

    /// Encode header to bytes (Big Endian).
    ///
    /// # Example
    ///
    /// ```
    /// use hammer_gateway::protocol::{FrameType, Header};
    ///
    /// let header = Header::new(0x0101, FrameType::Response, 100);
    /// let bytes = header.encode();
    /// assert_eq!(bytes, [0x01, 0x01, 0x05, 0, 0, 0, 100]);
    /// ```
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        self.encode_into(&mut buf);
        buf
    }

    /// Encode header into an existing buffer.
    ///
    /// # Panics
    ///
    /// Panics if buffer is smaller than `HEADER_SIZE` (7 bytes).
    pub fn encode_into(&self, buf: &mut [u8]) {
        debug_assert!(buf.len() >= HEADER_SIZE);
        buf[0..2].copy_from_slice(&self.version.to_be_bytes());
        buf[2] = self.frame_type.as_u8();
        buf[3..7].copy_from_slice(&self.length.to_be_bytes());
    }

    /// Decode header from bytes (Big Endian).
    ///
    /// Fails with `MalformedHeader` if fewer than 7 bytes are given and with
    /// `UnknownFrameType` if byte 2 is not a known type.
    pub fn decode(buf: &[u8]) -> Result<Self, ProtocolError> {
        if buf.len() < HEADER_SIZE {
            return Err(ProtocolError::MalformedHeader {
                received: buf.len(),
            });
        }
        Ok(Self {
            version: u16::from_be_bytes([buf[0], buf[1]]),
            frame_type: FrameType::try_from(buf[2])?,
            length: u32::from_be_bytes([buf[3], buf[4], buf[5], buf[6]]),
        })
    }

    /// Validate the header for protocol compliance.
    ///
    /// Checks:
    /// - Version is at least [`MIN_PROTOCOL_VERSION`]
    /// - Payload length doesn't exceed [`MAX_PAYLOAD_SIZE`]
    pub fn validate(&self) -> Result<(), ProtocolError> {
        if self.version < MIN_PROTOCOL_VERSION {
            return Err(ProtocolError::UnsupportedVersion {
                version: self.version,
                minimum: MIN_PROTOCOL_VERSION,
            });
        }

        if self.length > MAX_PAYLOAD_SIZE {
            return Err(ProtocolError::PayloadTooLarge {
                length: self.length,
                max: MAX_PAYLOAD_SIZE,
            });
        }

        Ok(())
    }
}

/// Length field for a payload of `len` bytes.
///
/// Outbound frames go through this so the gateway never writes a frame its
/// own reader would reject.
pub fn payload_length(len: usize) -> Result<u32, ProtocolError> {
    match u32::try_from(len) {
        Ok(length) if length <= MAX_PAYLOAD_SIZE => Ok(length),
        _ => Err(ProtocolError::PayloadTooLarge {
            length: u32::try_from(len).unwrap_or(u32::MAX),
            max: MAX_PAYLOAD_SIZE,
        }),
    }
}

/// Decode a header from bytes (standalone function).
#[inline]
pub fn decode_header(buf: &[u8]) -> Result<Header, ProtocolError> {
    Header::decode(buf)
}

/// Validate a header for protocol compliance (standalone function).
#[inline]
pub fn validate_header(header: &Header) -> Result<(), ProtocolError> {
    header.validate()
}
