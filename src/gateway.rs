//! Gateway facade and builder.
//!
//! A [`Gateway`] owns the long-lived shared objects (service registry, store,
//! async correlator, route table) and hands cheap clones to each connection.
//!
//! # Example
//!
//! ```no_run
//! use hammer_gateway::{Gateway, Request, Response};
//! use serde_json::json;
//!
//! # async fn run() -> hammer_gateway::Result<()> {
//! let gateway = Gateway::builder()
//!     .socket_path("/tmp/hammer-gateway.sock")
//!     .service("ping", |_req: &Request| Response::ok("pong", json!(null)))
//!     .route("/ping", "ping", "")
//!     .build()?;
//!
//! gateway.serve(async { let _ = tokio::signal::ctrl_c().await; }).await?;
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::codec::JsonCodec;
use crate::config::GatewayConfig;
use crate::correlator::{AsyncCorrelator, CompletionSlot};
use crate::error::Result;
use crate::handler::{AsyncHandler, ServiceHandler, ServiceRegistry};
use crate::plugins::register_builtin;
use crate::protocol::{AsyncEnvelope, Request, Response};
use crate::routes::RouteTable;
use crate::server;
use crate::store::TransactionalStore;
use crate::transport::SocketListener;
use crate::writer::WriterConfig;

/// Builder for configuring and creating a [`Gateway`].
pub struct GatewayBuilder {
    config: GatewayConfig,
    services: ServiceRegistry,
    routes: RouteTable,
    async_handler: Option<Box<dyn AsyncHandler>>,
}

impl GatewayBuilder {
    /// Create a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: GatewayConfig::default(),
            services: ServiceRegistry::new(),
            routes: RouteTable::new(),
            async_handler: None,
        }
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: GatewayConfig) -> Self {
        self.config = config;
        self
    }

    /// Socket to listen on.
    pub fn socket_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.socket_path = path.into();
        self
    }

    /// Store snapshot file.
    pub fn snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.snapshot_path = path.into();
        self
    }

    /// How long async requests stay pending.
    ///
    /// Default: 30 seconds
    pub fn async_timeout(mut self, timeout: Duration) -> Self {
        self.config.async_timeout = timeout;
        self
    }

    /// Persist the snapshot after every recorded request.
    pub fn persist_on_record(mut self, enabled: bool) -> Self {
        self.config.persist_on_record = enabled;
        self
    }

    /// Per-connection writer settings.
    pub fn writer_config(mut self, writer: WriterConfig) -> Self {
        self.config.writer = writer;
        self
    }

    /// Register an additional service. Overrides a built-in of the same name.
    pub fn service<H: ServiceHandler>(mut self, name: impl Into<String>, handler: H) -> Self {
        self.services.register(name, handler);
        self
    }

    /// Map an inbound path to a service and method.
    pub fn route(
        mut self,
        path: impl Into<String>,
        service: impl Into<String>,
        method: impl Into<String>,
    ) -> Self {
        self.routes.insert(path, service, method);
        self
    }

    /// Hook invoked for every async request that registers successfully.
    pub fn on_async<H: AsyncHandler>(mut self, handler: H) -> Self {
        self.async_handler = Some(Box::new(handler));
        self
    }

    /// Load the store snapshot and assemble the gateway.
    pub fn build(self) -> Result<Gateway> {
        let store = Arc::new(TransactionalStore::new(&self.config.snapshot_path));
        store.load()?;

        let correlator = AsyncCorrelator::new(self.config.async_timeout);

        let mut registry = ServiceRegistry::new();
        register_builtin(&mut registry, Arc::clone(&store), correlator.clone());
        registry.merge(self.services);
        debug!("Registered services: {:?}", registry.services());

        Ok(Gateway {
            inner: Arc::new(GatewayInner {
                config: self.config,
                registry,
                store,
                correlator,
                routes: self.routes,
                async_handler: self.async_handler,
                next_connection_id: AtomicU64::new(1),
            }),
        })
    }
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self::new()
    }
}

struct GatewayInner {
    config: GatewayConfig,
    registry: ServiceRegistry,
    store: Arc<TransactionalStore>,
    correlator: AsyncCorrelator,
    routes: RouteTable,
    async_handler: Option<Box<dyn AsyncHandler>>,
    next_connection_id: AtomicU64,
}

/// A configured gateway. Cheap to clone.
#[derive(Clone)]
pub struct Gateway {
    inner: Arc<GatewayInner>,
}

impl Gateway {
    /// Create a new gateway builder.
    pub fn builder() -> GatewayBuilder {
        GatewayBuilder::new()
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    pub fn store(&self) -> &Arc<TransactionalStore> {
        &self.inner.store
    }

    pub fn correlator(&self) -> &AsyncCorrelator {
        &self.inner.correlator
    }

    pub fn registry(&self) -> &ServiceRegistry {
        &self.inner.registry
    }

    /// Route a decoded request to its service.
    ///
    /// Services may block on disk I/O (`memdb persist`). Async callers should
    /// use [`Gateway::dispatch_blocking`].
    pub fn dispatch(&self, request: &Request) -> Response {
        self.inner.registry.dispatch(request)
    }

    /// Run [`Gateway::dispatch`] on Tokio's blocking pool.
    ///
    /// A service that panics yields a `500` response.
    pub async fn dispatch_blocking(&self, request: Request) -> Response {
        let gateway = self.clone();
        match tokio::task::spawn_blocking(move || gateway.dispatch(&request)).await {
            Ok(response) => response,
            Err(e) => {
                error!("Service task failed: {}", e);
                Response::error(500, "Internal error")
            }
        }
    }

    /// Id for the next accepted connection, unique across every listener
    /// this gateway serves.
    pub fn next_connection_id(&self) -> u64 {
        self.inner.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }

    /// JSON in, JSON out dispatch for callers that do not speak the framed protocol.
    ///
    /// A body that is not a valid request yields a `400` response. Blocks like
    /// [`Gateway::dispatch`].
    pub fn handle(&self, request_bytes: &[u8]) -> Result<Vec<u8>> {
        let response = match JsonCodec::decode::<Request>(request_bytes) {
            Ok(request) => self.dispatch(&request),
            Err(e) => Response::error(400, format!("Invalid request: {}", e)),
        };
        JsonCodec::encode(&response)
    }

    /// Dispatch by inbound path. Unknown paths yield `404 "Route not found"`.
    pub fn handle_route(&self, path: &str, params: HashMap<String, String>) -> Response {
        match self.inner.routes.resolve(path) {
            Some(target) => {
                let request = Request {
                    service: target.service.clone(),
                    method: target.method.clone(),
                    params,
                };
                self.dispatch(&request)
            }
            None => {
                debug!("Route not found: {}", path);
                Response::error(404, "Route not found")
            }
        }
    }

    /// Store the serialized state of an inbound request under `id`.
    ///
    /// With `persist_on_record` set this writes and syncs the snapshot before
    /// returning. Call it from a blocking context.
    pub fn record_request(&self, id: &str, request_json: impl Into<String>) -> Result<()> {
        self.inner.store.put(id, request_json);
        if self.inner.config.persist_on_record {
            self.inner.store.persist()?;
        }
        Ok(())
    }

    /// Deliver `response` to the connection waiting on async request `id`.
    ///
    /// Returns `false` if nothing is pending under `id`.
    pub fn complete_async(&self, id: &str, response: Response) -> Result<bool> {
        self.inner.correlator.complete_response(id, response)
    }

    pub(crate) fn notify_async(&self, envelope: AsyncEnvelope, slot: CompletionSlot) {
        if let Some(handler) = &self.inner.async_handler {
            handler.on_request(envelope, slot);
        }
    }

    /// Bind the configured socket.
    pub async fn bind(&self) -> Result<SocketListener> {
        SocketListener::bind(&self.inner.config.socket_path).await
    }

    /// Bind the configured socket and accept connections until `shutdown` resolves.
    pub async fn serve<F>(&self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let listener = self.bind().await?;
        self.serve_listener(listener, shutdown).await
    }

    /// Accept connections on an already bound listener until `shutdown` resolves.
    pub async fn serve_listener<F>(&self, listener: SocketListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        server::run(listener, self.clone(), shutdown).await?;

        let pending = self.inner.correlator.pending_count();
        if pending > 0 {
            warn!("Stopped with {} async requests still pending", pending);
        }
        info!("Gateway stopped");
        Ok(())
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("config", &self.inner.config)
            .field("registry", &self.inner.registry)
            .field("routes", &self.inner.routes.len())
            .finish()
    }
}
