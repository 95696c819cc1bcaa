//! Control plane module - readiness announcement over stdout.
//!
//! A supervisor that starts the gateway reads one JSON line from stdout to
//! learn that the socket is bound and where it lives. Everything else the
//! process prints goes to stderr.
//!
//! # Workflow
//!
//! 1. Gateway binds its socket
//! 2. Gateway writes the ready line to stdout
//! 3. Supervisor starts routing traffic to the socket

mod stdio;

use std::path::Path;

use serde::Serialize;

pub use stdio::{write_stdout_json, write_stdout_line};

/// Event name carried by the ready line.
pub const READY_EVENT: &str = "ready";

/// The ready line.
#[derive(Debug, Clone, Serialize)]
pub struct ReadyMessage<'a> {
    pub event: &'static str,
    pub socket: &'a str,
    pub pid: u32,
    pub version: &'static str,
}

impl<'a> ReadyMessage<'a> {
    pub fn new(socket: &'a str) -> Self {
        Self {
            event: READY_EVENT,
            socket,
            pid: std::process::id(),
            version: env!("CARGO_PKG_VERSION"),
        }
    }
}

/// Announce on stdout that the gateway is listening on `socket_path`.
pub fn announce_ready(socket_path: &Path) -> crate::error::Result<()> {
    let socket = socket_path.to_string_lossy();
    write_stdout_json(&ReadyMessage::new(&socket))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    #[test]
    fn test_ready_message_shape() {
        let json = serde_json::to_string(&ReadyMessage::new("/tmp/gw.sock")).unwrap();
        let value: Value = serde_json::from_str(&json).unwrap();

        assert_eq!(value["event"], "ready");
        assert_eq!(value["socket"], "/tmp/gw.sock");
        assert_eq!(value["pid"], std::process::id());
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_announce_ready() {
        assert!(announce_ready(Path::new("/tmp/gw.sock")).is_ok());
    }
}
