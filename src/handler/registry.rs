//! Service registry for dispatching sync requests by service name.
//!
//! The registry is built once at startup and then shared read-only by every
//! connection, so dispatch takes no lock.
//!
//! # Example
//!
//! ```
//! use hammer_gateway::handler::ServiceRegistry;
//! use hammer_gateway::protocol::{Request, Response};
//! use serde_json::json;
//!
//! let mut registry = ServiceRegistry::new();
//! registry.register("ping", |_req: &Request| Response::ok("pong", json!(null)));
//!
//! let reply = registry.dispatch(&Request::new("ping", ""));
//! assert_eq!(reply.status, 200);
//!
//! let reply = registry.dispatch(&Request::new("missing", ""));
//! assert_eq!(reply.status, 404);
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::protocol::{Request, Response};

/// A named service that turns a request into a response.
///
/// Failures are expressed as non-2xx responses, never as errors, so a failing
/// service cannot take its connection down.
pub trait ServiceHandler: Send + Sync + 'static {
    /// Handle one request.
    fn handle(&self, request: &Request) -> Response;
}

impl<F> ServiceHandler for F
where
    F: Fn(&Request) -> Response + Send + Sync + 'static,
{
    fn handle(&self, request: &Request) -> Response {
        self(request)
    }
}

/// Registry mapping service names to handlers.
#[derive(Default)]
pub struct ServiceRegistry {
    services: HashMap<String, Box<dyn ServiceHandler>>,
}

impl ServiceRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` under `name`, replacing any previous handler.
    pub fn register<H: ServiceHandler>(&mut self, name: impl Into<String>, handler: H) {
        let name = name.into();
        if self.services.insert(name.clone(), Box::new(handler)).is_some() {
            debug!("Replaced handler for service {}", name);
        }
    }

    /// Move every handler from `other` into this registry, replacing same-named ones.
    pub fn merge(&mut self, other: ServiceRegistry) {
        self.services.extend(other.services);
    }

    /// True if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.services.contains_key(name)
    }

    /// Registered service names, sorted.
    pub fn services(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.services.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered services.
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// True if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Route `request` to its service.
    ///
    /// Unknown services get `404 "Service not found"`.
    pub fn dispatch(&self, request: &Request) -> Response {
        match self.services.get(&request.service) {
            Some(handler) => handler.handle(request),
            None => {
                debug!("Service not found: {}", request.service);
                Response::service_not_found()
            }
        }
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistry")
            .field("services", &self.services())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    impl ServiceHandler for Upper {
        fn handle(&self, request: &Request) -> Response {
            let value = request.get_param("text").unwrap_or_default().to_uppercase();
            Response::ok("ok", json!(value))
        }
    }

    #[test]
    fn test_dispatch_closure_handler() {
        let mut registry = ServiceRegistry::new();
        registry.register("echo", |req: &Request| Response::ok("Echo successful", json!(req.params)));

        let reply = registry.dispatch(&Request::new("echo", "any").param("a", "1"));
        assert_eq!(reply.status, 200);
        assert_eq!(reply.data, json!({"a": "1"}));
    }

    #[test]
    fn test_dispatch_struct_handler() {
        let mut registry = ServiceRegistry::new();
        registry.register("upper", Upper);

        let reply = registry.dispatch(&Request::new("upper", "").param("text", "hi"));
        assert_eq!(reply.data, json!("HI"));
    }

    #[test]
    fn test_unknown_service() {
        let registry = ServiceRegistry::new();
        let reply = registry.dispatch(&Request::new("nope", "x"));
        assert_eq!(reply.status, 404);
        assert_eq!(reply.message, "Service not found");
    }

    #[test]
    fn test_register_replaces() {
        let mut registry = ServiceRegistry::new();
        registry.register("svc", |_: &Request| Response::new(200, "first"));
        registry.register("svc", |_: &Request| Response::new(200, "second"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.dispatch(&Request::new("svc", "")).message, "second");
    }

    #[test]
    fn test_merge_overrides() {
        let mut base = ServiceRegistry::new();
        base.register("svc", |_: &Request| Response::new(200, "base"));
        base.register("kept", Upper);

        let mut extra = ServiceRegistry::new();
        extra.register("svc", |_: &Request| Response::new(200, "extra"));
        base.merge(extra);

        assert_eq!(base.len(), 2);
        assert_eq!(base.dispatch(&Request::new("svc", "")).message, "extra");
    }

    #[test]
    fn test_services_sorted() {
        let mut registry = ServiceRegistry::new();
        registry.register("b", Upper);
        registry.register("a", Upper);

        assert!(registry.contains("a"));
        assert_eq!(registry.services(), vec!["a", "b"]);
    }
}
