use bytes::Bytes;
use serde_json::{json, Value};
use tracing::{error, warn};

use super::required_param;
use crate::correlator::AsyncCorrelator;
use crate::error::{GatewayError, ProtocolError};
use crate::handler::ServiceHandler;
use crate::protocol::{Request, Response};

/// Completion producer reachable over the wire.
///
/// `complete` delivers a Response to whichever connection registered `id`;
/// `pending` reports how many async requests are waiting.
#[derive(Debug, Clone)]
pub struct AsyncService {
    correlator: AsyncCorrelator,
}

impl AsyncService {
    pub fn new(correlator: AsyncCorrelator) -> Self {
        Self { correlator }
    }

    fn complete(&self, request: &Request) -> Result<Response, Response> {
        let id = required_param(request, "id")?;

        let status = match request.get_param("status") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| Response::error(400, "Parameter 'status' must be a number"))?,
            None => 200,
        };
        let data = match request.get_param("data") {
            Some(raw) => serde_json::from_str::<Value>(raw)
                .map_err(|_| Response::error(400, "Parameter 'data' must be valid JSON"))?,
            None => Value::Null,
        };
        let message = request.get_param("message").unwrap_or("Async request completed");

        let completion = Response::new(status, message).with_data(data).with_id(id);
        let payload = serde_json::to_vec(&completion)
            .map_err(|e| Response::error(500, e.to_string()))?;

        match self.correlator.complete(id, Bytes::from(payload)) {
            Ok(true) => Ok(Response::ok("Completion delivered", json!({ "id": id }))),
            Ok(false) => Err(Response::error(404, "No pending async request")),
            Err(GatewayError::Protocol(e @ ProtocolError::PayloadTooLarge { .. })) => {
                warn!("Completion {} rejected: {}", id, e);
                Err(Response::error(413, "Completion too large"))
            }
            Err(e) => {
                error!("Failed to deliver completion {}: {}", id, e);
                Err(Response::error(500, e.to_string()))
            }
        }
    }
}

impl ServiceHandler for AsyncService {
    fn handle(&self, request: &Request) -> Response {
        let result = match request.method.as_str() {
            "complete" => self.complete(request),
            "pending" => Ok(Response::ok(
                "OK",
                json!({ "pending": self.correlator.pending_count() }),
            )),
            other => Err(Response::error(400, format!("Unknown method '{}'", other))),
        };
        result.unwrap_or_else(|reply| reply)
    }
}
