//! Error types for hammer-gateway.

use std::path::PathBuf;

use thiserror::Error;

/// Framing violations. Always fatal to the connection that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Fewer than 7 header bytes before the stream ended.
    #[error("Malformed header: expected 7 bytes, got {received}")]
    MalformedHeader { received: usize },

    /// Type byte is not one of the known frame types.
    #[error("Unknown frame type 0x{0:02x}")]
    UnknownFrameType(u8),

    /// Version below the minimum supported value.
    #[error("Unsupported protocol version 0x{version:04x} (minimum 0x{minimum:04x})")]
    UnsupportedVersion { version: u16, minimum: u16 },

    /// Declared payload length above the protocol limit.
    #[error("Payload size {length} exceeds maximum {max}")]
    PayloadTooLarge { length: u32, max: u32 },
}

/// Failures reported by the transactional store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `begin_transaction` while another transaction is open.
    #[error("Transaction already in progress")]
    AlreadyInProgress,

    /// `commit` with no open transaction.
    #[error("No active transaction")]
    NoActiveTransaction,

    /// Snapshot file could not be read or written.
    #[error("Snapshot I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Snapshot file contents are not a valid key/value map.
    #[error("Snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),
}

/// Failures reported by the async correlator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AsyncError {
    /// An entry with this id is still pending.
    #[error("Async request {0} is already pending")]
    AlreadyPending(String),
}

/// Main error type for all gateway operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Payload is not valid JSON for the expected shape.
    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// Framing violation.
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Store failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Correlator failure.
    #[error("Async error: {0}")]
    Async(#[from] AsyncError),

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Backpressure timeout - write buffer full.
    #[error("Backpressure timeout")]
    BackpressureTimeout,
}

/// Result type alias using GatewayError.
pub type Result<T> = std::result::Result<T, GatewayError>;
