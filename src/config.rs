//! Gateway configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::correlator::DEFAULT_ASYNC_TIMEOUT;
use crate::writer::WriterConfig;

/// Default socket path.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/hammer-gateway.sock";

/// Default snapshot path.
pub const DEFAULT_SNAPSHOT_PATH: &str = "data/memdb.json";

/// Configuration for a [`Gateway`](crate::Gateway).
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Unix socket the gateway listens on.
    pub socket_path: PathBuf,
    /// Store snapshot file.
    pub snapshot_path: PathBuf,
    /// How long an async request may stay pending.
    pub async_timeout: Duration,
    /// Persist the snapshot after every `record_request`.
    pub persist_on_record: bool,
    /// Per-connection writer settings.
    pub writer: WriterConfig,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            socket_path: PathBuf::from(DEFAULT_SOCKET_PATH),
            snapshot_path: PathBuf::from(DEFAULT_SNAPSHOT_PATH),
            async_timeout: DEFAULT_ASYNC_TIMEOUT,
            persist_on_record: false,
            writer: WriterConfig::default(),
        }
    }
}
