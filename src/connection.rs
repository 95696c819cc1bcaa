//! Per-connection engine.
//!
//! Each accepted connection runs one read loop and one writer task:
//!
//! ```text
//! AwaitHeader ──► AwaitPayload ──► Dispatching ──► AwaitHeader ...
//!      │                                 │
//!      └── clean EOF ─► Closed           ├─ SyncRequest:  dispatch, write reply, wait for flush
//!                                        ├─ AsyncRequest: register with correlator, no reply
//!                                        └─ Response:     ignored
//! ```
//!
//! Any framing, decode or write failure ends the loop. On exit the
//! connection's pending async requests are discarded and the writer is
//! drained and shut down.

use bytes::Bytes;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::{debug, warn};

use crate::codec::JsonCodec;
use crate::correlator::ReplyTarget;
use crate::error::{AsyncError, Result};
use crate::gateway::Gateway;
use crate::protocol::{read_frame, AsyncEnvelope, Frame, FrameType, Request, Response};
use crate::writer::{spawn_writer_task, OutboundFrame, WriterHandle};

/// Serve one connection until the peer closes it or a fatal error occurs.
///
/// Returns `Ok(())` on a clean close at a frame boundary.
pub async fn serve_connection<R, W>(
    connection_id: u64,
    mut reader: R,
    writer: W,
    gateway: Gateway,
) -> Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (handle, writer_task) = spawn_writer_task(writer, &gateway.config().writer);

    let result = read_loop(connection_id, &mut reader, &handle, &gateway).await;

    let abandoned = gateway.correlator().abandon_connection(connection_id);
    if abandoned > 0 {
        debug!(
            "Connection {} closed with {} pending async requests",
            connection_id, abandoned
        );
    }

    drop(handle);
    match writer_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Writer for connection {} ended with: {}", connection_id, e),
        Err(e) => warn!("Writer task for connection {} failed: {}", connection_id, e),
    }

    result
}

async fn read_loop<R>(
    connection_id: u64,
    reader: &mut R,
    writer: &WriterHandle,
    gateway: &Gateway,
) -> Result<()>
where
    R: AsyncRead + Unpin,
{
    loop {
        let frame = match read_frame(reader).await? {
            Some(frame) => frame,
            None => {
                debug!("Connection {} closed by peer", connection_id);
                return Ok(());
            }
        };

        match frame.frame_type() {
            FrameType::SyncRequest => handle_sync(&frame, writer, gateway).await?,
            FrameType::AsyncRequest => handle_async(connection_id, &frame, writer, gateway)?,
            FrameType::Response => {
                warn!(
                    "Connection {} sent an unexpected response frame ({} bytes)",
                    connection_id,
                    frame.payload().len()
                );
            }
        }
    }
}

async fn handle_sync(frame: &Frame, writer: &WriterHandle, gateway: &Gateway) -> Result<()> {
    let request: Request = JsonCodec::decode(frame.payload())?;
    let label = format!("{}.{}", request.service, request.method);

    let response = gateway.dispatch_blocking(request).await;
    if response.is_success() {
        debug!("Sync request {} -> {}", label, response.status);
    } else {
        debug!("Sync request {} failed: {} {}", label, response.status, response.message);
    }
    let reply = encode_reply(frame.version(), &response)?;

    // Reply is on the wire before the next header is read.
    writer.send_flushed(reply).await
}

/// Frame `response`, swapping in a `500` if it does not fit in one frame.
fn encode_reply(version: u16, response: &Response) -> Result<OutboundFrame> {
    let payload = Bytes::from(JsonCodec::encode(response)?);
    match OutboundFrame::response(version, payload) {
        Ok(reply) => Ok(reply),
        Err(e) => {
            warn!("Dropping {} reply: {}", response.status, e);
            let payload = JsonCodec::encode(&Response::error(500, "Response too large"))?;
            Ok(OutboundFrame::response(version, Bytes::from(payload))?)
        }
    }
}

fn handle_async(
    connection_id: u64,
    frame: &Frame,
    writer: &WriterHandle,
    gateway: &Gateway,
) -> Result<()> {
    let envelope: AsyncEnvelope = JsonCodec::decode(frame.payload())?;

    let correlator = gateway.correlator();
    let target = ReplyTarget {
        connection_id,
        version: frame.version(),
        writer: writer.clone(),
    };

    match correlator.register(envelope.id.clone(), correlator.deadline_from_now(), target) {
        Ok(slot) => {
            debug!("Async request {} ({}) pending", envelope.id, envelope.method);
            gateway.notify_async(envelope, slot);
        }
        Err(AsyncError::AlreadyPending(id)) => {
            warn!("Dropping async request {}: id already pending", id);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{GatewayError, ProtocolError};
    use crate::protocol::{build_frame, MAX_PAYLOAD_SIZE, PROTOCOL_VERSION};
    use serde_json::json;
    use tokio::io::{duplex, AsyncWriteExt};

    fn gateway() -> Gateway {
        Gateway::builder()
            .snapshot_path("missing/memdb.json")
            .build()
            .unwrap()
    }

    fn sync_frame(request: &Request) -> Vec<u8> {
        let payload = serde_json::to_vec(request).unwrap();
        build_frame(PROTOCOL_VERSION, FrameType::SyncRequest, &payload).unwrap()
    }

    #[tokio::test]
    async fn test_sync_echo_then_clean_close() {
        let (mut client, server) = duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(server);
        let task = tokio::spawn(serve_connection(1, read_half, write_half, gateway()));

        client
            .write_all(&sync_frame(&Request::new("echo", "ping").param("a", "1")))
            .await
            .unwrap();

        let frame = read_frame(&mut client).await.unwrap().unwrap();
        assert_eq!(frame.frame_type(), FrameType::Response);
        let response: Response = JsonCodec::decode(frame.payload()).unwrap();
        assert_eq!(response.status, 200);
        assert_eq!(response.message, "Echo successful");
        assert_eq!(response.data, json!({"a": "1"}));

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_sync_replies_in_order() {
        let (mut client, server) = duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(server);
        let task = tokio::spawn(serve_connection(1, read_half, write_half, gateway()));

        let mut batch = Vec::new();
        for i in 0..5 {
            batch.extend(sync_frame(
                &Request::new("echo", "").param("n", i.to_string()),
            ));
        }
        client.write_all(&batch).await.unwrap();

        for i in 0..5 {
            let frame = read_frame(&mut client).await.unwrap().unwrap();
            let response: Response = JsonCodec::decode(frame.payload()).unwrap();
            assert_eq!(response.data, json!({"n": i.to_string()}));
        }

        drop(client);
        task.await.unwrap().unwrap();
    }

    /// A request right at the frame limit whose echo would not fit in one frame.
    fn max_size_echo() -> Vec<u8> {
        let base = serde_json::to_vec(&Request::new("echo", "").param("a", ""))
            .unwrap()
            .len();
        let fill = "x".repeat(MAX_PAYLOAD_SIZE as usize - base);
        let payload = serde_json::to_vec(&Request::new("echo", "").param("a", fill)).unwrap();
        assert_eq!(payload.len(), MAX_PAYLOAD_SIZE as usize);
        build_frame(PROTOCOL_VERSION, FrameType::SyncRequest, &payload).unwrap()
    }

    #[tokio::test]
    async fn test_oversized_reply_replaced_with_error() {
        let (mut client, server) = duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(server);
        let task = tokio::spawn(serve_connection(1, read_half, write_half, gateway()));

        // The whole request is consumed before the reply is written.
        client.write_all(&max_size_echo()).await.unwrap();

        // read_frame validates the header, so this fails if the reply is over the limit.
        let frame = read_frame(&mut client).await.unwrap().unwrap();
        assert!(frame.payload().len() < 1024);
        let response: Response = JsonCodec::decode(frame.payload()).unwrap();
        assert_eq!(response.status, 500);
        assert_eq!(response.message, "Response too large");

        // The connection survives and keeps answering.
        client
            .write_all(&sync_frame(&Request::new("echo", "").param("k", "v")))
            .await
            .unwrap();
        let frame = read_frame(&mut client).await.unwrap().unwrap();
        let response: Response = JsonCodec::decode(frame.payload()).unwrap();
        assert_eq!(response.data, json!({"k": "v"}));

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_invalid_json_closes_connection() {
        let (mut client, server) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(server);
        let task = tokio::spawn(serve_connection(1, read_half, write_half, gateway()));

        client
            .write_all(&build_frame(PROTOCOL_VERSION, FrameType::SyncRequest, b"{nope").unwrap())
            .await
            .unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(err, GatewayError::Decode(_)));
        assert!(read_frame(&mut client).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_old_version_closes_without_reply() {
        let (mut client, server) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(server);
        let task = tokio::spawn(serve_connection(1, read_half, write_half, gateway()));

        client
            .write_all(&build_frame(0x0100, FrameType::SyncRequest, b"{}").unwrap())
            .await
            .unwrap();

        let err = task.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            GatewayError::Protocol(ProtocolError::UnsupportedVersion { version: 0x0100, .. })
        ));
        assert!(read_frame(&mut client).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_async_registration_and_duplicate() {
        let gateway = gateway();
        let (mut client, server) = duplex(64 * 1024);
        let (read_half, write_half) = tokio::io::split(server);
        let task = tokio::spawn(serve_connection(9, read_half, write_half, gateway.clone()));

        let envelope = serde_json::to_vec(&json!({"id": "a-1", "method": "work"})).unwrap();
        let async_frame =
            build_frame(PROTOCOL_VERSION, FrameType::AsyncRequest, &envelope).unwrap();
        client.write_all(&async_frame).await.unwrap();
        client.write_all(&async_frame).await.unwrap();

        // A sync round trip proves both async frames were processed.
        client
            .write_all(&sync_frame(&Request::new("echo", "")))
            .await
            .unwrap();
        let frame = read_frame(&mut client).await.unwrap().unwrap();
        let response: Response = JsonCodec::decode(frame.payload()).unwrap();
        assert_eq!(response.message, "Echo successful");
        assert_eq!(gateway.correlator().pending_count(), 1);

        assert!(gateway
            .complete_async("a-1", Response::ok("done", json!(1)))
            .unwrap());
        let frame = read_frame(&mut client).await.unwrap().unwrap();
        let completion: Response = JsonCodec::decode(frame.payload()).unwrap();
        assert_eq!(completion.id.as_deref(), Some("a-1"));

        drop(client);
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_close_discards_pending_async() {
        let gateway = gateway();
        let (mut client, server) = duplex(4096);
        let (read_half, write_half) = tokio::io::split(server);
        let task = tokio::spawn(serve_connection(3, read_half, write_half, gateway.clone()));

        let envelope = serde_json::to_vec(&json!({"id": "orphan"})).unwrap();
        client
            .write_all(&build_frame(PROTOCOL_VERSION, FrameType::AsyncRequest, &envelope).unwrap())
            .await
            .unwrap();
        drop(client);

        task.await.unwrap().unwrap();
        assert_eq!(gateway.correlator().pending_count(), 0);
    }
}
