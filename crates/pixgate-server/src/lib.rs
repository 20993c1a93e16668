//! # pixgate-server - Signed-URL Image Relay
//!
//! Serves remote images only when the request path carries a valid signed
//! token naming the image URL. Everything the origin sends back goes through
//! a response mediator that enforces an image content-type allowlist and
//! stamps security headers on every response.
//!
//! ## Architecture
//!
//! - [`gateway`] - Per-request orchestration (`Gateway::serve_proxy`)
//! - [`mediator`] - Header staging, content policy and write-once commit
//! - [`policy`] - Media type parsing and the allowlist
//! - [`headers`] - Request/response header allowlists, security headers
//! - [`relay`] - `Relay` trait and the `reqwest`-backed `HttpRelay`
//! - [`sink`] - Response sinks (streaming to axum, or buffered)
//! - [`router`] - axum routes and canonical-path redirects
//! - [`server`] - Listener lifecycle with graceful shutdown
//! - [`config`] - `GatewayConfig`
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pixgate_server::{Gateway, GatewayConfig, HttpRelay, router, serve};
//! use pixgate_token::{Key, MemoryKeyStore, TokenCodec};
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let store = Arc::new(MemoryKeyStore::fixed("https://app.example.com", Key::hmac("secret")?));
//! let gateway = Gateway::new(
//!     TokenCodec::new(store),
//!     Arc::new(HttpRelay::new(&config)?),
//!     config.content_policy(),
//! );
//!
//! let listener = tokio::net::TcpListener::bind(config.listen).await?;
//! serve(listener, router(Arc::new(gateway)), CancellationToken::new(), config.shutdown_grace).await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod gateway;
pub mod headers;
pub mod mediator;
pub mod policy;
pub mod relay;
pub mod router;
pub mod server;
pub mod sink;

pub use config::GatewayConfig;
pub use context::RequestContext;
pub use error::{RelayError, RelayResult, SinkError};
pub use gateway::Gateway;
pub use mediator::{ResponseMediator, write_error};
pub use policy::{ContentPolicy, DEFAULT_CONTENT_TYPES, parse_media_type};
pub use relay::{HttpRelay, OriginRequest, OriginResponse, Relay};
pub use router::router;
pub use server::serve;
pub use sink::{ChannelSink, RecordedResponse, ResponseSink};
