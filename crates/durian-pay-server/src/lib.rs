//! DurianBank demo server.
//!
//! Serves the mock payment record, signs attestation requests with the
//! application key, and settles merchant payments on-chain followed by a
//! completion notice.
//!
//! # Modules
//!
//! - [`config`] - Environment configuration ([`ServerConfig`](config::ServerConfig))
//! - [`routes`] - HTTP handlers, mounted with [`routes::configure`]
//! - [`state`] - Shared signer and settler ([`AppState`](state::AppState))
//! - [`error`] - JSON error responses
//! - [`metrics`] - Prometheus counters for requests, signing and settlement

pub mod config;
pub mod cors;
pub mod error;
pub mod metrics;
pub mod routes;
pub mod state;

pub use config::{ConfigError, ServerConfig};
pub use error::ApiError;
pub use state::AppState;
