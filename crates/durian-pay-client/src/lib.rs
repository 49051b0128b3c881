//! DurianBank demo client.
//!
//! Drives the attestation-gated payment flow against the demo server and
//! models the dashboard as an explicit view-state machine.
//!
//! # Quick Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use durian_client::{ApiClient, Orchestrator, OrchestratorConfig, ReplaySdk};
//! use durian_pay::SettlementRequest;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let api = ApiClient::new("http://localhost:9000").unwrap();
//! let orchestrator = Orchestrator::new(
//!     Arc::new(ReplaySdk::new(None)),
//!     Arc::new(api),
//!     OrchestratorConfig::default(),
//! );
//!
//! match orchestrator.attempt_payment(&SettlementRequest::default()).await {
//!     Ok(receipt) => println!("paid: {} ({})", receipt.tx_hash, receipt.reference),
//!     Err(e) => eprintln!("payment failed: {e}"),
//! }
//! # }
//! ```

mod error;
mod http_client;
pub mod orchestrator;
mod platform;
pub mod render;
pub mod sdk;
pub mod views;

pub use error::ClientError;
pub use http_client::{ApiClient, PaymentBackend};
pub use orchestrator::{Orchestrator, OrchestratorConfig, PaymentFailure, PaymentResult};
pub use platform::Platform;
pub use sdk::{AttestationSdk, ReplaySdk};
