//! Caller side of the framed protocol.
//!
//! [`GatewayClient`] sends sync requests and async envelopes over one
//! connection. Async completions can arrive interleaved with sync replies;
//! the client tells them apart by the `id` field and keeps completions queued
//! until [`GatewayClient::next_completion`] is called.
//!
//! # Example
//!
//! ```no_run
//! use hammer_gateway::{GatewayClient, Request};
//! use serde_json::json;
//!
//! # async fn run() -> hammer_gateway::Result<()> {
//! let mut client = GatewayClient::connect("/tmp/hammer-gateway.sock").await?;
//!
//! let reply = client.call(&Request::new("echo", "ping").param("a", "1")).await?;
//! assert_eq!(reply.status, 200);
//!
//! let id = client.call_async("render", json!({"page": 1})).await?;
//! let completion = client.next_completion().await?;
//! assert_eq!(completion.id.as_deref(), Some(id.as_str()));
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::path::Path;

use serde_json::Value;
use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::net::UnixStream;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::codec::JsonCodec;
use crate::error::{GatewayError, Result};
use crate::protocol::{
    build_frame, read_frame, AsyncEnvelope, FrameType, Request, Response, PROTOCOL_VERSION,
};

/// One client connection to a gateway.
pub struct GatewayClient<S = UnixStream> {
    stream: S,
    version: u16,
    completions: VecDeque<Response>,
}

impl GatewayClient<UnixStream> {
    /// Connect to the gateway socket at `path`.
    pub async fn connect(path: impl AsRef<Path>) -> Result<Self> {
        let stream = UnixStream::connect(path.as_ref()).await?;
        Ok(Self::from_stream(stream))
    }
}

impl<S> GatewayClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap an already connected stream.
    pub fn from_stream(stream: S) -> Self {
        Self {
            stream,
            version: PROTOCOL_VERSION,
            completions: VecDeque::new(),
        }
    }

    /// Protocol version stamped on outgoing frames.
    pub fn with_version(mut self, version: u16) -> Self {
        self.version = version;
        self
    }

    /// Send a sync request and wait for its reply.
    ///
    /// Completions that arrive first are queued for `next_completion`.
    pub async fn call(&mut self, request: &Request) -> Result<Response> {
        let payload = JsonCodec::encode(request)?;
        self.send_frame(FrameType::SyncRequest, &payload).await?;

        loop {
            let response = self.read_response().await?;
            if response.id.is_some() {
                self.completions.push_back(response);
                continue;
            }
            return Ok(response);
        }
    }

    /// Send an async request under a fresh UUIDv4 id and return the id.
    pub async fn call_async(&mut self, method: &str, params: Value) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        self.call_async_with_id(&id, method, params).await?;
        Ok(id)
    }

    /// Send an async request under a caller-chosen id.
    ///
    /// The gateway silently drops the request if `id` is already pending.
    pub async fn call_async_with_id(&mut self, id: &str, method: &str, params: Value) -> Result<()> {
        let envelope = AsyncEnvelope {
            id: id.to_string(),
            method: method.to_string(),
            params,
        };
        let payload = JsonCodec::encode(&envelope)?;
        self.send_frame(FrameType::AsyncRequest, &payload).await?;
        debug!("Sent async request {}", id);
        Ok(())
    }

    /// Wait for the next async completion.
    ///
    /// The gateway sends nothing when an async request times out, so callers
    /// should wrap this in their own timeout.
    pub async fn next_completion(&mut self) -> Result<Response> {
        if let Some(response) = self.completions.pop_front() {
            return Ok(response);
        }
        loop {
            let response = self.read_response().await?;
            if response.id.is_some() {
                return Ok(response);
            }
            warn!("Discarding sync reply with no outstanding call");
        }
    }

    /// Completions received but not yet taken.
    pub fn queued_completions(&self) -> usize {
        self.completions.len()
    }

    /// Consume the client and return the underlying stream.
    pub fn into_inner(self) -> S {
        self.stream
    }

    async fn send_frame(&mut self, frame_type: FrameType, payload: &[u8]) -> Result<()> {
        let frame = build_frame(self.version, frame_type, payload)?;
        self.stream.write_all(&frame).await?;
        self.stream.flush().await?;
        Ok(())
    }

    async fn read_response(&mut self) -> Result<Response> {
        loop {
            let frame = read_frame(&mut self.stream)
                .await?
                .ok_or(GatewayError::ConnectionClosed)?;
            if frame.is_response() {
                return JsonCodec::decode(frame.payload());
            }
            warn!("Ignoring {:?} frame from gateway", frame.frame_type());
        }
    }
}
