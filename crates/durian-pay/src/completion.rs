//! HTTP client for the remote "payment complete" ledger API.
//!
//! Called by the settler once the transfer is confirmed on-chain.

use std::time::Duration;

use alloy::primitives::{Address, TxHash};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::PayError;

/// Notice sent to the completion API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionNotice {
    pub reference: String,
    pub tx_hash: TxHash,
    pub payer_wallet: Address,
}

/// Raw answer from the completion API. Non-2xx statuses are not errors at
/// this layer; the settler decides what they mean.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionResponse {
    pub status: u16,
    pub body: serde_json::Value,
}

impl CompletionResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait CompletionApi: Send + Sync {
    /// Deliver a completion notice. `Err` means no response was obtained.
    async fn notify(&self, notice: &CompletionNotice) -> Result<CompletionResponse, PayError>;
}

/// [`CompletionApi`] over HTTPS with optional bearer authorization.
pub struct HttpCompletionApi {
    client: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl std::fmt::Debug for HttpCompletionApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpCompletionApi")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpCompletionApi {
    pub fn new(url: &str, token: Option<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap_or_default();
        Self::with_http_client(client, url, token)
    }

    /// Create a completion client with a custom reqwest::Client.
    pub fn with_http_client(client: reqwest::Client, url: &str, token: Option<String>) -> Self {
        Self {
            client,
            url: url.to_string(),
            token,
        }
    }
}

#[async_trait]
impl CompletionApi for HttpCompletionApi {
    async fn notify(&self, notice: &CompletionNotice) -> Result<CompletionResponse, PayError> {
        let mut request = self
            .client
            .post(&self.url)
            .header("Content-Type", "application/json")
            .json(notice);

        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| PayError::HttpError(format!("completion request failed: {e}")))?;

        let status = resp.status().as_u16();
        let text = resp
            .text()
            .await
            .map_err(|e| PayError::HttpError(format!("completion response read failed: {e}")))?;

        // Keep non-JSON bodies for diagnosis instead of failing the settlement.
        let body = serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text));

        Ok(CompletionResponse { status, body })
    }
}
