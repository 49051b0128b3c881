//! Core of the DurianBank payment demo.
//!
//! A payment is settled in two legs: an attestation of some external fact is
//! obtained from a zkTLS attestation provider, and once it verifies the server
//! pays the merchant in a stablecoin and notifies a remote completion API.
//!
//! # Roles
//!
//! - **Signing proxy** ([`attestation::LocalAppSigner`]): signs attestation
//!   requests with the application key, which never leaves the server
//! - **Settler** ([`settlement::Settler`]): ERC-20 transfer followed by the
//!   completion notice, surfacing partial failures with the transaction hash
//! - **Client** (`durian-pay-client`): builds requests, drives the
//!   attestation flow and triggers settlement
//!
//! # Quick example (settlement)
//!
//! ```no_run
//! use std::sync::Arc;
//! use alloy::signers::local::PrivateKeySigner;
//! use durian_pay::{ChainTransfer, HttpCompletionApi, SettlementRequest, Settler, DEFAULT_MERCHANT, DEFAULT_TOKEN, RPC_URL};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let signer: PrivateKeySigner = "0xYOUR_KEY".parse().unwrap();
//! let transfer = ChainTransfer::connect(signer, RPC_URL, DEFAULT_TOKEN).unwrap();
//! let completion = HttpCompletionApi::new("https://ledger.example.com/payment-complete", None);
//!
//! let settler = Settler::new(Arc::new(transfer), Arc::new(completion), DEFAULT_MERCHANT, alloy::primitives::U256::from(10_000u64));
//! let receipt = settler.settle(&SettlementRequest::default()).await.unwrap();
//! println!("paid: {}", receipt.tx_hash);
//! # }
//! ```

pub mod amount;
pub mod attestation;
pub mod completion;
pub mod constants;
pub mod erc20;
pub mod error;
pub mod payment;
pub mod reference;
pub mod settlement;

use alloy::sol;

// ERC-20 interface for the settlement token (USDC on the test network).
sol! {
    #[sol(rpc)]
    interface ERC20 {
        function transfer(address to, uint256 value) external returns (bool);
    }
}

// Re-exports
pub use amount::parse_amount;
pub use attestation::{AppSigner, AttMode, AttestationRequest, LocalAppSigner, SignedRequest};
pub use completion::{CompletionApi, CompletionNotice, CompletionResponse, HttpCompletionApi};
pub use constants::*;
pub use erc20::{ChainTransfer, TokenTransfer, WalletProvider};
pub use error::PayError;
pub use payment::*;
pub use reference::{generate_reference, is_generated_reference};
pub use settlement::{SettlementError, Settler};
