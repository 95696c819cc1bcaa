//! Accept loop.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, error, info};

use crate::connection::serve_connection;
use crate::error::Result;
use crate::gateway::Gateway;
use crate::transport::SocketListener;

/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Accept connections on `listener` until `shutdown` resolves.
///
/// Each connection runs on its own task. Shutdown stops accepting and drops
/// the listener (removing its socket file); connections already accepted run
/// until their peers disconnect.
pub async fn run<F>(listener: SocketListener, gateway: Gateway, shutdown: F) -> Result<()>
where
    F: Future<Output = ()>,
{
    info!("Listening on {}", listener.path().display());
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                info!("Shutdown requested, no longer accepting connections");
                break;
            }
            accepted = listener.accept() => {
                let stream = match accepted {
                    Ok(stream) => stream,
                    Err(e) => {
                        error!("Accept failed: {}", e);
                        tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
                        continue;
                    }
                };

                let connection_id = gateway.next_connection_id();
                let gateway = gateway.clone();
                debug!("Accepted connection {}", connection_id);

                tokio::spawn(async move {
                    let (reader, writer) = stream.into_split();
                    match serve_connection(connection_id, reader, writer, gateway).await {
                        Ok(()) => debug!("Connection {} finished", connection_id),
                        Err(e) => error!("Connection {} terminated: {}", connection_id, e),
                    }
                });
            }
        }
    }

    drop(listener);
    Ok(())
}
