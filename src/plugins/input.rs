use std::sync::Arc;

use serde_json::Value;

use super::required_param;
use crate::handler::ServiceHandler;
use crate::protocol::{Request, Response};
use crate::store::TransactionalStore;

/// Read-only lookup of `params.key` in the store.
#[derive(Debug, Clone)]
pub struct InputService {
    store: Arc<TransactionalStore>,
}

impl InputService {
    pub fn new(store: Arc<TransactionalStore>) -> Self {
        Self { store }
    }
}

impl ServiceHandler for InputService {
    fn handle(&self, request: &Request) -> Response {
        let key = match required_param(request, "key") {
            Ok(key) => key,
            Err(reply) => return reply,
        };
        match self.store.get(key) {
            Some(value) => Response::ok("OK", Value::String(value)),
            None => Response::error(404, "Key not found in database"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn service() -> InputService {
        let store = Arc::new(TransactionalStore::new("unused.json"));
        store.put("user", "alice");
        InputService::new(store)
    }

    #[test]
    fn test_found() {
        let reply = service().handle(&Request::new("input", "").param("key", "user"));
        assert_eq!(reply.status, 200);
        assert_eq!(reply.data, json!("alice"));
    }

    #[test]
    fn test_missing_key_param() {
        let reply = service().handle(&Request::new("input", ""));
        assert_eq!(reply.status, 400);
        assert_eq!(reply.message, "Parameter 'key' is required");
    }

    #[test]
    fn test_unknown_key() {
        let reply = service().handle(&Request::new("input", "").param("key", "nobody"));
        assert_eq!(reply.status, 404);
        assert_eq!(reply.message, "Key not found in database");
    }
}
