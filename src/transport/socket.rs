//! Unix domain socket listener that owns its socket file.
//!
//! # Example
//!
//! ```ignore
//! use hammer_gateway::transport::SocketListener;
//!
//! let listener = SocketListener::bind("/tmp/hammer-gateway.sock").await?;
//! let stream = listener.accept().await?;
//! ```

use std::path::{Path, PathBuf};

use tokio::net::{UnixListener, UnixStream};
use tracing::debug;

use crate::error::Result;

/// Listening socket. The socket file is removed when the listener is dropped.
#[derive(Debug)]
pub struct SocketListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SocketListener {
    /// Bind to a Unix socket path.
    ///
    /// Removes any stale socket file at the path before binding.
    pub async fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.exists() {
            debug!("Removing stale socket {}", path.display());
            std::fs::remove_file(path)?;
        }

        let listener = UnixListener::bind(path)?;
        Ok(Self {
            listener,
            path: path.to_path_buf(),
        })
    }

    /// Accept a single connection.
    pub async fn accept(&self) -> Result<UnixStream> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(stream)
    }

    /// Get the socket path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for SocketListener {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_bind_replaces_stale_file_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gw.sock");
        std::fs::write(&path, b"stale").unwrap();

        let listener = SocketListener::bind(&path).await.unwrap();
        assert_eq!(listener.path(), path.as_path());

        let connect = UnixStream::connect(&path);
        let (accepted, connected) = tokio::join!(listener.accept(), connect);
        accepted.unwrap();
        connected.unwrap();

        drop(listener);
        assert!(!path.exists());
    }
}
