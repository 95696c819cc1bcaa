//! JSON payload shapes carried inside frames.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Payload of a `SyncRequest` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    /// Target service in the dispatch registry.
    pub service: String,
    /// Operation requested of the service.
    #[serde(default)]
    pub method: String,
    /// String parameters.
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl Request {
    /// Create a request with no parameters.
    pub fn new(service: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            method: method.into(),
            params: HashMap::new(),
        }
    }

    /// Add a parameter.
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Look up a parameter.
    pub fn get_param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

/// Payload of a `Response` frame, for both sync replies and async completions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// HTTP-style status code.
    pub status: u16,
    /// Human readable outcome.
    #[serde(default)]
    pub message: String,
    /// Arbitrary result data.
    #[serde(default)]
    pub data: Value,
    /// Echo of the async request id; absent on sync replies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Response {
    /// Create a response with no data.
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            data: Value::Null,
            id: None,
        }
    }

    /// `200` response carrying `data`.
    pub fn ok(message: impl Into<String>, data: Value) -> Self {
        Self::new(200, message).with_data(data)
    }

    /// Error response with no data.
    pub fn error(status: u16, message: impl Into<String>) -> Self {
        Self::new(status, message)
    }

    /// Reply for a service name missing from the registry.
    pub fn service_not_found() -> Self {
        Self::new(404, "Service not found")
    }

    /// Replace the data.
    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// Tag as the completion of async request `id`.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Status in the 2xx range.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Payload of an `AsyncRequest` frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AsyncEnvelope {
    /// Client-chosen id, unique while the request is pending.
    pub id: String,
    /// Target method.
    #[serde(default)]
    pub method: String,
    /// Arbitrary parameters.
    #[serde(default)]
    pub params: Value,
}
