//! Inbound path routing.
//!
//! Maps an external request path (for example an HTTP route) onto a registered
//! service and method, so path-based callers reach the same dispatch registry
//! as socket clients.

use std::collections::HashMap;

/// Service and method a path resolves to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    pub service: String,
    pub method: String,
}

/// Exact-match path table.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: HashMap<String, RouteTarget>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `path` to `service`/`method`, replacing any previous mapping.
    pub fn insert(
        &mut self,
        path: impl Into<String>,
        service: impl Into<String>,
        method: impl Into<String>,
    ) {
        self.routes.insert(
            path.into(),
            RouteTarget {
                service: service.into(),
                method: method.into(),
            },
        );
    }

    pub fn resolve(&self, path: &str) -> Option<&RouteTarget> {
        self.routes.get(path)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_exact_path() {
        let mut routes = RouteTable::new();
        routes.insert("/echo", "echo", "ping");

        let target = routes.resolve("/echo").unwrap();
        assert_eq!(target.service, "echo");
        assert_eq!(target.method, "ping");
        assert!(routes.resolve("/echo/").is_none());
    }

    #[test]
    fn test_insert_replaces() {
        let mut routes = RouteTable::new();
        routes.insert("/a", "echo", "");
        routes.insert("/a", "input", "");
        assert_eq!(routes.len(), 1);
        assert_eq!(routes.resolve("/a").unwrap().service, "input");
    }
}
