use std::sync::Arc;

use serde_json::{json, Value};
use tracing::error;

use super::required_param;
use crate::error::StoreError;
use crate::handler::ServiceHandler;
use crate::protocol::{Request, Response};
use crate::store::TransactionalStore;

/// Store access and transaction control over the wire.
///
/// Methods: `get`, `put`, `delete`, `begin`, `commit`, `rollback`, `persist`,
/// `status`.
///
/// `persist` syncs the snapshot to disk before replying, so this service must
/// be dispatched from a blocking context.
#[derive(Debug, Clone)]
pub struct MemDbService {
    store: Arc<TransactionalStore>,
}

impl MemDbService {
    pub fn new(store: Arc<TransactionalStore>) -> Self {
        Self { store }
    }

    fn get(&self, request: &Request) -> Result<Response, Response> {
        let key = required_param(request, "key")?;
        self.store
            .get(key)
            .map(|value| Response::ok("OK", Value::String(value)))
            .ok_or_else(|| Response::error(404, "Key not found in database"))
    }

    fn put(&self, request: &Request) -> Result<Response, Response> {
        let key = required_param(request, "key")?;
        let value = required_param(request, "value")?;
        self.store.put(key, value);
        Ok(Response::ok("Stored", json!({ "key": key })))
    }

    fn delete(&self, request: &Request) -> Result<Response, Response> {
        let key = required_param(request, "key")?;
        self.store.delete(key);
        Ok(Response::ok("Deleted", json!({ "key": key })))
    }
}

fn store_failure(err: StoreError) -> Response {
    match err {
        StoreError::AlreadyInProgress | StoreError::NoActiveTransaction => {
            Response::error(409, err.to_string())
        }
        StoreError::Io { .. } | StoreError::Snapshot(_) => {
            error!("Store failure: {}", err);
            Response::error(500, err.to_string())
        }
    }
}

impl ServiceHandler for MemDbService {
    fn handle(&self, request: &Request) -> Response {
        let result = match request.method.as_str() {
            "get" => self.get(request),
            "put" => self.put(request),
            "delete" => self.delete(request),
            "begin" => self
                .store
                .begin_transaction()
                .map(|()| Response::new(200, "Transaction started"))
                .map_err(store_failure),
            "commit" => self
                .store
                .commit()
                .map(|()| Response::new(200, "Transaction committed"))
                .map_err(store_failure),
            "rollback" => {
                self.store.rollback();
                Ok(Response::new(200, "Transaction rolled back"))
            }
            "persist" => self
                .store
                .persist()
                .map(|()| Response::ok("Snapshot written", json!({ "keys": self.store.len() })))
                .map_err(store_failure),
            "status" => Ok(Response::ok(
                "OK",
                json!({
                    "keys": self.store.len(),
                    "in_transaction": self.store.in_transaction(),
                }),
            )),
            other => Err(Response::error(400, format!("Unknown method '{}'", other))),
        };
        result.unwrap_or_else(|reply| reply)
    }
}
