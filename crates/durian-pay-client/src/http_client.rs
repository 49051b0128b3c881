use async_trait::async_trait;
use durian_pay::{PaymentRecord, SettlementReceipt, SettlementRequest};

use crate::ClientError;

/// Server calls the orchestrator depends on.
#[async_trait]
pub trait PaymentBackend: Send + Sync {
    /// Have the server sign a serialized attestation request.
    /// Returns the opaque `signResult` string.
    async fn sign_request(&self, sign_params: &str) -> Result<String, ClientError>;

    /// Trigger merchant settlement.
    async fn pay_merchant(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, ClientError>;
}

/// HTTP client for the DurianBank demo server.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ClientError::Http(format!("failed to build HTTP client: {e}")))?;
        Self::with_http_client(http, base_url)
    }

    /// Create a client with a custom reqwest::Client.
    pub fn with_http_client(http: reqwest::Client, base_url: &str) -> Result<Self, ClientError> {
        let parsed =
            url::Url::parse(base_url).map_err(|e| ClientError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "{base_url}: scheme must be http or https"
            )));
        }
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// `GET /api/payment`
    pub async fn fetch_payment(&self) -> Result<PaymentRecord, ClientError> {
        let resp = self
            .http
            .get(format!("{}/api/payment", self.base_url))
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("payment request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClientError::Api {
                status: status.as_u16(),
                message: format!("HTTP {}", status.as_u16()),
            });
        }

        resp.json()
            .await
            .map_err(|e| ClientError::InvalidResponse(format!("payment record: {e}")))
    }
}

#[async_trait]
impl PaymentBackend for ApiClient {
    async fn sign_request(&self, sign_params: &str) -> Result<String, ClientError> {
        let url = format!(
            "{}/primus/sign?signParams={}",
            self.base_url,
            urlencoding::encode(sign_params)
        );
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("sign request failed: {e}")))?;

        let body = read_json(resp).await?;
        body.get("signResult")
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| ClientError::InvalidResponse("missing signResult".to_string()))
    }

    async fn pay_merchant(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, ClientError> {
        let resp = self
            .http
            .post(format!("{}/pay-merchant", self.base_url))
            .json(request)
            .send()
            .await
            .map_err(|e| ClientError::Http(format!("pay-merchant request failed: {e}")))?;

        let body = read_json(resp).await?;
        serde_json::from_value(body)
            .map_err(|e| ClientError::InvalidResponse(format!("settlement receipt: {e}")))
    }
}

/// Read a JSON body, turning non-2xx statuses into [`ClientError::Api`].
async fn read_json(resp: reqwest::Response) -> Result<serde_json::Value, ClientError> {
    let status = resp.status();
    let text = resp
        .text()
        .await
        .map_err(|e| ClientError::Http(format!("response read failed: {e}")))?;
    let body: Option<serde_json::Value> = serde_json::from_str(&text).ok();

    if !status.is_success() {
        return Err(ClientError::Api {
            status: status.as_u16(),
            message: error_message(status, body.as_ref()),
        });
    }

    body.ok_or_else(|| ClientError::InvalidResponse(format!("expected JSON, got: {text}")))
}

/// The server's `error` field, falling back to the status text.
fn error_message(status: reqwest::StatusCode, body: Option<&serde_json::Value>) -> String {
    body.and_then(|b| b.get("error"))
        .and_then(|e| e.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .map(str::to_string)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
        })
}
