//! Built-in services registered at startup.
//!
//! | Service | Purpose |
//! |---------|---------|
//! | `echo`  | Returns the request params |
//! | `input` | Reads one key from the store |
//! | `memdb` | Store operations and transaction control |
//! | `async` | Completes pending async requests, reports the pending gauge |

mod async_completion;
mod echo;
mod input;
mod memdb;

use std::sync::Arc;

use crate::correlator::AsyncCorrelator;
use crate::handler::ServiceRegistry;
use crate::protocol::{Request, Response};
use crate::store::TransactionalStore;

pub use async_completion::AsyncService;
pub use echo::EchoService;
pub use input::InputService;
pub use memdb::MemDbService;

/// Register every built-in service into `registry`.
pub fn register_builtin(
    registry: &mut ServiceRegistry,
    store: Arc<TransactionalStore>,
    correlator: AsyncCorrelator,
) {
    registry.register("echo", EchoService);
    registry.register("input", InputService::new(Arc::clone(&store)));
    registry.register("memdb", MemDbService::new(store));
    registry.register("async", AsyncService::new(correlator));
}

/// Fetch a required string parameter or build the 400 reply.
fn required_param<'a>(request: &'a Request, name: &str) -> Result<&'a str, Response> {
    request
        .get_param(name)
        .ok_or_else(|| Response::error(400, format!("Parameter '{}' is required", name)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correlator::DEFAULT_ASYNC_TIMEOUT;

    #[test]
    fn test_register_builtin() {
        let mut registry = ServiceRegistry::new();
        register_builtin(
            &mut registry,
            Arc::new(TransactionalStore::new("unused.json")),
            AsyncCorrelator::new(DEFAULT_ASYNC_TIMEOUT),
        );
        assert_eq!(registry.services(), vec!["async", "echo", "input", "memdb"]);
    }

    #[test]
    fn test_required_param_message() {
        let err = required_param(&Request::new("x", "y"), "key").unwrap_err();
        assert_eq!(err.status, 400);
        assert_eq!(err.message, "Parameter 'key' is required");
    }
}
