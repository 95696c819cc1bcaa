//! # hammer-gateway
//!
//! Local inter-process gateway speaking a framed JSON protocol over Unix
//! domain sockets.
//!
//! Every frame is a 7-byte header (version, type, payload length) followed by
//! a JSON payload. Sync requests are dispatched to a named service and
//! answered in order on the same connection; async requests are registered
//! by id and completed later, out of band, on the connection that sent them.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): header codec, frame I/O, payload shapes
//! - **Dispatch** ([`handler`]): service name → handler registry
//! - **Correlator** ([`correlator`]): pending async requests with deadlines
//! - **Store** ([`store`]): transactional key/value store with snapshots
//! - **Engine** ([`connection`], [`server`]): per-connection read loop and accept loop
//!
//! ## Example
//!
//! ```no_run
//! use hammer_gateway::Gateway;
//!
//! #[tokio::main]
//! async fn main() -> hammer_gateway::Result<()> {
//!     let gateway = Gateway::builder()
//!         .socket_path("/tmp/hammer-gateway.sock")
//!         .snapshot_path("data/memdb.json")
//!         .build()?;
//!
//!     gateway
//!         .serve(async {
//!             let _ = tokio::signal::ctrl_c().await;
//!         })
//!         .await?;
//!     gateway.store().persist()?;
//!     Ok(())
//! }
//! ```

pub mod codec;
pub mod config;
pub mod connection;
pub mod control;
pub mod correlator;
pub mod error;
pub mod handler;
pub mod plugins;
pub mod protocol;
pub mod routes;
pub mod server;
pub mod store;
pub mod transport;
pub mod writer;

mod client;
mod gateway;

pub use client::GatewayClient;
pub use config::GatewayConfig;
pub use correlator::{AsyncCorrelator, CompletionSlot};
pub use error::{GatewayError, Result};
pub use gateway::{Gateway, GatewayBuilder};
pub use handler::{AsyncHandler, ServiceHandler, ServiceRegistry};
pub use protocol::{AsyncEnvelope, Request, Response};
pub use store::TransactionalStore;
