//! Handler module - service dispatch.
//!
//! Provides:
//! - [`ServiceHandler`] - one named service
//! - [`ServiceRegistry`] - maps service names to handlers
//! - [`AsyncHandler`] - optional hook that receives registered async requests

mod registry;

use crate::correlator::CompletionSlot;
use crate::protocol::AsyncEnvelope;

pub use registry::{ServiceHandler, ServiceRegistry};

/// Receives each async request once it is registered as pending.
///
/// The hook owns the `CompletionSlot` and may fulfill it later from any task.
/// Requests nobody fulfills expire on the correlator's timeout.
pub trait AsyncHandler: Send + Sync + 'static {
    /// Called on the connection task; must not block.
    fn on_request(&self, envelope: AsyncEnvelope, slot: CompletionSlot);
}

impl<F> AsyncHandler for F
where
    F: Fn(AsyncEnvelope, CompletionSlot) + Send + Sync + 'static,
{
    fn on_request(&self, envelope: AsyncEnvelope, slot: CompletionSlot) {
        self(envelope, slot)
    }
}
