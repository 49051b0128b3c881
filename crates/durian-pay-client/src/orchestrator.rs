//! Attestation-gated payment flow.
//!
//! init SDK (once) -> build request -> server signs it -> SDK attestation ->
//! verify -> server settles. Settlement is only requested when verification
//! returns exactly `true`.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use durian_pay::{
    AttMode, SettlementReceipt, SettlementRequest, DEFAULT_APP_ID, DEFAULT_TEMPLATE_ID,
    DEFAULT_USER_ADDRESS, PROXY_TLS,
};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::OnceCell;

use crate::{AttestationSdk, ClientError, PaymentBackend, Platform};

/// Additional parameters attached to every attestation request.
pub const ADDITION_PARAMS: &str = r#"{"additionParamsKey1":"additionParamsVaule1"}"#;

const DEFAULT_ATTESTATION_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub app_id: Address,
    pub template_id: String,
    pub user_address: Address,
    pub platform: Platform,
    /// Upper bound on the SDK attestation step.
    pub attestation_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            app_id: DEFAULT_APP_ID,
            template_id: DEFAULT_TEMPLATE_ID.to_string(),
            user_address: DEFAULT_USER_ADDRESS,
            platform: Platform::Pc,
            attestation_timeout: DEFAULT_ATTESTATION_TIMEOUT,
        }
    }
}

/// Why a payment attempt did not settle.
#[derive(Debug, Error)]
pub enum PaymentFailure {
    #[error("attestation SDK init failed: {0}")]
    Init(String),

    #[error("signing failed: {0}")]
    Sign(#[source] ClientError),

    #[error("attestation failed: {0}")]
    Attestation(#[source] ClientError),

    #[error("attestation timed out after {0}s")]
    Timeout(u64),

    #[error("Attestation verification failed")]
    VerificationFailed,

    /// The settlement call failed. `message` is the server's error text.
    #[error("{message}")]
    Settlement { status: Option<u16>, message: String },
}

/// Wire form of a payment attempt: `{ok: true, data}` or `{ok: false, error}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaymentResult {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<SettlementReceipt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Result<SettlementReceipt, PaymentFailure>> for PaymentResult {
    fn from(result: &Result<SettlementReceipt, PaymentFailure>) -> Self {
        match result {
            Ok(receipt) => Self {
                ok: true,
                data: Some(receipt.clone()),
                error: None,
            },
            Err(failure) => Self {
                ok: false,
                data: None,
                error: Some(failure.to_string()),
            },
        }
    }
}

pub struct Orchestrator {
    sdk: Arc<dyn AttestationSdk>,
    backend: Arc<dyn PaymentBackend>,
    config: OrchestratorConfig,
    // Memoized init outcome, failures included.
    init: OnceCell<Result<Value, String>>,
}

impl Orchestrator {
    pub fn new(
        sdk: Arc<dyn AttestationSdk>,
        backend: Arc<dyn PaymentBackend>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            sdk,
            backend,
            config,
            init: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// Initialize the SDK on first use. Concurrent callers share one init.
    async fn ensure_init(&self) -> Result<(), PaymentFailure> {
        let sdk = &self.sdk;
        let config = &self.config;
        let outcome = self
            .init
            .get_or_init(|| async move {
                let result = sdk
                    .init(config.app_id, config.platform)
                    .await
                    .map_err(|e| e.to_string());
                match &result {
                    Ok(info) => tracing::info!(platform = %config.platform, init = %info, "attestation SDK initialized"),
                    Err(e) => tracing::error!(error = %e, "attestation SDK init failed"),
                }
                result
            })
            .await;
        outcome
            .as_ref()
            .map(|_| ())
            .map_err(|e| PaymentFailure::Init(e.clone()))
    }

    /// Run the full flow once. Dropping the future cancels it between steps.
    pub async fn attempt_payment(
        &self,
        options: &SettlementRequest,
    ) -> Result<SettlementReceipt, PaymentFailure> {
        self.ensure_init().await?;

        let mut request = self
            .sdk
            .generate_request(&self.config.template_id, self.config.user_address)
            .map_err(PaymentFailure::Attestation)?;
        request.set_addition_params(ADDITION_PARAMS);
        request.set_att_mode(AttMode {
            algorithm_type: PROXY_TLS.to_string(),
            ..AttMode::default()
        });
        let sign_params = request
            .to_json_string()
            .map_err(|e| PaymentFailure::Attestation(e.into()))?;

        let signed = self
            .backend
            .sign_request(&sign_params)
            .await
            .map_err(PaymentFailure::Sign)?;
        tracing::debug!(request_id = %request.request_id, "attestation request signed");

        let timeout = self.config.attestation_timeout;
        let attestation = tokio::time::timeout(timeout, self.sdk.start_attestation(&signed))
            .await
            .map_err(|_| PaymentFailure::Timeout(timeout.as_secs()))?
            .map_err(PaymentFailure::Attestation)?;

        let verdict = self.sdk.verify_attestation(&attestation).await;
        if verdict != Value::Bool(true) {
            tracing::warn!(verdict = %verdict, "attestation verification failed");
            return Err(PaymentFailure::VerificationFailed);
        }

        let receipt = self
            .backend
            .pay_merchant(options)
            .await
            .map_err(|e| match e {
                ClientError::Api { status, message } => PaymentFailure::Settlement {
                    status: Some(status),
                    message,
                },
                other => PaymentFailure::Settlement {
                    status: None,
                    message: other.to_string(),
                },
            })?;
        tracing::info!(tx = %receipt.tx_hash, reference = %receipt.reference, "payment settled");
        Ok(receipt)
    }
}
