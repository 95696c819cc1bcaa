use serde_json::json;

use crate::handler::ServiceHandler;
use crate::protocol::{Request, Response};

/// Replies with the request's params, whatever the method.
#[derive(Debug, Clone, Copy, Default)]
pub struct EchoService;

impl ServiceHandler for EchoService {
    fn handle(&self, request: &Request) -> Response {
        Response::ok("Echo successful", json!(request.params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo_returns_params() {
        let reply = EchoService.handle(&Request::new("echo", "ping").param("a", "1"));
        assert_eq!(reply.status, 200);
        assert_eq!(reply.message, "Echo successful");
        assert_eq!(reply.data, json!({"a": "1"}));
    }

    #[test]
    fn test_echo_empty_params() {
        let reply = EchoService.handle(&Request::new("echo", ""));
        assert_eq!(reply.data, json!({}));
    }
}
