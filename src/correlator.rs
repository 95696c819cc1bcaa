//! Async request correlation.
//!
//! Tracks in-flight `AsyncRequest` frames by their client-chosen id. Each
//! pending entry remembers the connection that registered it and races its
//! completion against a deadline in a background timer task.
//!
//! Whoever removes the entry from the table decides the outcome: `complete`
//! removes it and writes the reply, the timer removes it and discards. Both
//! paths take the same lock, so exactly one of them wins.
//!
//! ```text
//! register(id) ──► table[id] = PendingAsync ──► timer task (sleep until deadline)
//!                                 │                      │
//! complete(id, bytes) ── remove ──┘                      └── remove ─► discard
//!        │
//!        └─► Response frame on the registering connection
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::codec::JsonCodec;
use crate::error::{AsyncError, Result};
use crate::protocol::{payload_length, Header, Response};
use crate::writer::{OutboundFrame, WriterHandle};

/// Default time an async request may stay pending.
pub const DEFAULT_ASYNC_TIMEOUT: Duration = Duration::from_secs(30);

/// Where a completion is delivered.
#[derive(Debug, Clone)]
pub struct ReplyTarget {
    /// Connection that registered the request.
    pub connection_id: u64,
    /// Version echoed on the completion frame.
    pub version: u16,
    /// The connection's writer.
    pub writer: WriterHandle,
}

struct PendingAsync {
    token: u64,
    deadline: Instant,
    target: ReplyTarget,
    cancel: oneshot::Sender<()>,
}

struct CorrelatorInner {
    pending: Mutex<HashMap<String, PendingAsync>>,
    gauge: AtomicUsize,
    next_token: AtomicU64,
    timeout: Duration,
}

impl CorrelatorInner {
    fn table(&self) -> MutexGuard<'_, HashMap<String, PendingAsync>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Remove `id` only if it is still the entry identified by `token`.
    fn remove_if_current(&self, id: &str, token: u64) -> Option<PendingAsync> {
        let mut table = self.table();
        match table.get(id) {
            Some(entry) if entry.token == token => {
                let entry = table.remove(id);
                self.gauge.fetch_sub(1, Ordering::AcqRel);
                entry
            }
            _ => None,
        }
    }
}

/// Shared table of pending async requests.
///
/// Cheap to clone; all clones share one table and one gauge.
#[derive(Clone)]
pub struct AsyncCorrelator {
    inner: Arc<CorrelatorInner>,
}

impl AsyncCorrelator {
    /// Create a correlator whose entries expire after `timeout`.
    pub fn new(timeout: Duration) -> Self {
        Self {
            inner: Arc::new(CorrelatorInner {
                pending: Mutex::new(HashMap::new()),
                gauge: AtomicUsize::new(0),
                next_token: AtomicU64::new(1),
                timeout,
            }),
        }
    }

    /// Configured wait before an entry is abandoned.
    pub fn timeout(&self) -> Duration {
        self.inner.timeout
    }

    /// Deadline for an entry registered now.
    pub fn deadline_from_now(&self) -> Instant {
        Instant::now() + self.inner.timeout
    }

    /// Current number of pending entries.
    pub fn pending_count(&self) -> usize {
        self.inner.gauge.load(Ordering::Acquire)
    }

    /// True if an entry for `id` is pending.
    pub fn is_pending(&self, id: &str) -> bool {
        self.inner.table().contains_key(id)
    }

    /// Register a pending request under `id`.
    ///
    /// Fails with `AlreadyPending` without touching the existing entry if `id`
    /// is taken. On success a timer task is spawned that discards the entry at
    /// `deadline` unless it is completed first, so this must be called from
    /// within a Tokio runtime.
    pub fn register(
        &self,
        id: impl Into<String>,
        deadline: Instant,
        target: ReplyTarget,
    ) -> std::result::Result<CompletionSlot, AsyncError> {
        let id = id.into();
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        let (cancel_tx, cancel_rx) = oneshot::channel();

        {
            let mut table = self.inner.table();
            if table.contains_key(&id) {
                return Err(AsyncError::AlreadyPending(id));
            }
            table.insert(
                id.clone(),
                PendingAsync {
                    token,
                    deadline,
                    target,
                    cancel: cancel_tx,
                },
            );
            self.inner.gauge.fetch_add(1, Ordering::AcqRel);
        }

        tokio::spawn(expire(
            Arc::clone(&self.inner),
            id.clone(),
            token,
            deadline,
            cancel_rx,
        ));

        debug!("Registered async request {}", id);
        Ok(CompletionSlot {
            id,
            correlator: self.clone(),
        })
    }

    /// Deliver `payload` as a Response frame to the connection that registered `id`.
    ///
    /// Returns `Ok(false)` if nothing is pending under `id` (already timed out,
    /// or never registered). The entry is removed before the frame is queued,
    /// so the timer can no longer discard it.
    ///
    /// A payload over the frame limit fails with `PayloadTooLarge`. Nothing is
    /// queued and the entry stays pending.
    pub fn complete(&self, id: &str, payload: Bytes) -> Result<bool> {
        let length = payload_length(payload.len())?;

        let entry = {
            let mut table = self.inner.table();
            match table.remove(id) {
                Some(entry) => {
                    self.inner.gauge.fetch_sub(1, Ordering::AcqRel);
                    entry
                }
                None => {
                    debug!("No pending async request {}", id);
                    return Ok(false);
                }
            }
        };

        let _ = entry.cancel.send(());
        let target = entry.target;
        debug!(
            "Completing async request {} on connection {} ({:?} before deadline)",
            id,
            target.connection_id,
            entry.deadline.saturating_duration_since(Instant::now())
        );
        let header = Header::response(target.version, length);
        target.writer.try_send(OutboundFrame::new(&header, payload))?;
        Ok(true)
    }

    /// Deliver `response` tagged with `id`.
    pub fn complete_response(&self, id: &str, response: Response) -> Result<bool> {
        let response = response.with_id(id);
        let payload = JsonCodec::encode(&response)?;
        self.complete(id, Bytes::from(payload))
    }

    /// Drop every entry registered by `connection_id`.
    ///
    /// Returns the number of entries discarded.
    pub fn abandon_connection(&self, connection_id: u64) -> usize {
        let abandoned: Vec<(String, PendingAsync)> = {
            let mut table = self.inner.table();
            let ids: Vec<String> = table
                .iter()
                .filter(|(_, entry)| entry.target.connection_id == connection_id)
                .map(|(id, _)| id.clone())
                .collect();
            ids.into_iter()
                .filter_map(|id| table.remove(&id).map(|entry| (id, entry)))
                .collect()
        };

        let count = abandoned.len();
        if count > 0 {
            self.inner.gauge.fetch_sub(count, Ordering::AcqRel);
            for (id, entry) in abandoned {
                let _ = entry.cancel.send(());
                debug!("Abandoned async request {} (connection {} closed)", id, connection_id);
            }
        }
        count
    }
}

impl std::fmt::Debug for AsyncCorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncCorrelator")
            .field("pending", &self.pending_count())
            .field("timeout", &self.inner.timeout)
            .finish()
    }
}

async fn expire(
    inner: Arc<CorrelatorInner>,
    id: String,
    token: u64,
    deadline: Instant,
    cancel: oneshot::Receiver<()>,
) {
    tokio::select! {
        // Sender fired or dropped: the entry already left the table.
        _ = cancel => {}
        _ = tokio::time::sleep_until(deadline) => {
            if inner.remove_if_current(&id, token).is_some() {
                warn!("Async request {} timed out", id);
            }
        }
    }
}

/// Handle a producer uses to fulfill one pending request.
#[derive(Debug, Clone)]
pub struct CompletionSlot {
    id: String,
    correlator: AsyncCorrelator,
}

impl CompletionSlot {
    /// Id of the pending request.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Deliver raw response bytes. See [`AsyncCorrelator::complete`].
    pub fn fulfill(&self, payload: Bytes) -> Result<bool> {
        self.correlator.complete(&self.id, payload)
    }

    /// Deliver `response` tagged with this slot's id.
    pub fn respond(&self, response: Response) -> Result<bool> {
        self.correlator.complete_response(&self.id, response)
    }
}
