//! Attestation requests and their application signatures.
//!
//! A client builds an [`AttestationRequest`] bound to a template and a subject
//! address, the server signs it with the application key ([`AppSigner`]), and
//! the attestation provider only accepts requests carrying a valid signature
//! from the registered application id.

use alloy::primitives::{keccak256, Address, Signature};
use alloy::signers::local::PrivateKeySigner;
use alloy::signers::Signer;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{PayError, PROXY_TLS};

/// TLS transport mode for the attestation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttMode {
    pub algorithm_type: String,
    pub result_type: String,
}

impl Default for AttMode {
    fn default() -> Self {
        Self {
            algorithm_type: PROXY_TLS.to_string(),
            result_type: "plain".to_string(),
        }
    }
}

/// An attestation request as produced by the attestation SDK.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttestationRequest {
    pub app_id: Address,
    #[serde(rename = "attTemplateID")]
    pub att_template_id: String,
    pub user_address: Address,
    /// Creation time in unix milliseconds.
    pub timestamp: u64,
    #[serde(rename = "requestid")]
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub addition_params: Option<String>,
    #[serde(default)]
    pub att_mode: AttMode,
}

impl AttestationRequest {
    pub fn new(
        app_id: Address,
        template_id: &str,
        user_address: Address,
        timestamp_millis: u64,
    ) -> Self {
        Self {
            app_id,
            att_template_id: template_id.to_string(),
            user_address,
            timestamp: timestamp_millis,
            request_id: uuid::Uuid::new_v4().to_string(),
            addition_params: None,
            att_mode: AttMode::default(),
        }
    }

    /// Attach free-form additional parameters (a JSON string).
    pub fn set_addition_params(&mut self, params: &str) {
        self.addition_params = Some(params.to_string());
    }

    pub fn set_att_mode(&mut self, mode: AttMode) {
        self.att_mode = mode;
    }

    pub fn to_json_string(&self) -> Result<String, PayError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Signed request returned by the signing proxy (serialized as the `signResult` string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedRequest {
    pub att_request: AttestationRequest,
    pub app_signature: String,
}

impl SignedRequest {
    pub fn parse(sign_result: &str) -> Result<Self, PayError> {
        Ok(serde_json::from_str(sign_result)?)
    }

    /// Recover the address that produced `app_signature`.
    pub fn recover_signer(&self) -> Result<Address, PayError> {
        let bytes = alloy::hex::decode(&self.app_signature)
            .map_err(|e| PayError::SignatureError(format!("invalid signature hex: {e}")))?;
        let sig = Signature::from_raw(&bytes)
            .map_err(|e| PayError::SignatureError(format!("invalid signature: {e}")))?;
        let digest = request_digest(&self.att_request)?;
        sig.recover_address_from_msg(digest.as_slice())
            .map_err(|e| PayError::SignatureError(format!("recovery failed: {e}")))
    }
}

/// Keccak-256 over the canonical JSON form of a request.
fn request_digest(request: &AttestationRequest) -> Result<alloy::primitives::B256, PayError> {
    Ok(keccak256(serde_json::to_vec(request)?))
}

/// Server-side signer for attestation requests.
#[async_trait]
pub trait AppSigner: Send + Sync {
    /// The application id requests must be bound to.
    fn app_id(&self) -> Address;

    /// Sign a serialized [`AttestationRequest`], returning the signed blob.
    async fn sign(&self, sign_params: &str) -> Result<String, PayError>;
}

/// Signs requests with the application secret held by this process.
pub struct LocalAppSigner {
    app_id: Address,
    signer: PrivateKeySigner,
}

impl std::fmt::Debug for LocalAppSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalAppSigner")
            .field("app_id", &self.app_id)
            .field("signer", &"[REDACTED]")
            .finish()
    }
}

impl LocalAppSigner {
    /// The secret must be the private key of `app_id`.
    pub fn new(app_id: Address, app_secret: &str) -> Result<Self, PayError> {
        let signer: PrivateKeySigner = app_secret
            .parse()
            .map_err(|_| PayError::ConfigError("app secret is not a valid private key".into()))?;
        if signer.address() != app_id {
            return Err(PayError::ConfigError(format!(
                "app secret does not belong to app id {app_id}"
            )));
        }
        Ok(Self { app_id, signer })
    }
}

#[async_trait]
impl AppSigner for LocalAppSigner {
    fn app_id(&self) -> Address {
        self.app_id
    }

    async fn sign(&self, sign_params: &str) -> Result<String, PayError> {
        let request: AttestationRequest = serde_json::from_str(sign_params)
            .map_err(|e| PayError::InvalidRequest(format!("malformed attestation request: {e}")))?;

        if request.app_id != self.app_id {
            return Err(PayError::InvalidRequest(format!(
                "request is bound to app id {}, expected {}",
                request.app_id, self.app_id
            )));
        }

        let digest = request_digest(&request)?;
        let sig = self
            .signer
            .sign_message(digest.as_slice())
            .await
            .map_err(|e| PayError::SignatureError(format!("signing failed: {e}")))?;

        let signed = SignedRequest {
            att_request: request,
            app_signature: alloy::hex::encode_prefixed(sig.as_bytes()),
        };
        Ok(serde_json::to_string(&signed)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DEFAULT_TEMPLATE_ID, DEFAULT_USER_ADDRESS};

    fn signer_pair() -> (PrivateKeySigner, String) {
        let key = PrivateKeySigner::random();
        let secret = alloy::hex::encode_prefixed(key.to_bytes());
        (key, secret)
    }

    #[test]
    fn test_request_json_field_names() {
        let mut request =
            AttestationRequest::new(Address::ZERO, DEFAULT_TEMPLATE_ID, DEFAULT_USER_ADDRESS, 1);
        request.set_addition_params(r#"{"k":"v"}"#);
        let json: serde_json::Value =
            serde_json::from_str(&request.to_json_string().unwrap()).unwrap();
        assert_eq!(json["attTemplateID"], DEFAULT_TEMPLATE_ID);
        assert_eq!(json["attMode"]["algorithmType"], "proxytls");
        assert_eq!(json["additionParams"], r#"{"k":"v"}"#);
        assert!(json["requestid"].as_str().is_some());
        assert!(json.get("userAddress").is_some());
    }

    #[test]
    fn test_new_rejects_mismatched_secret() {
        let (_, secret) = signer_pair();
        let err = LocalAppSigner::new(Address::ZERO, &secret).unwrap_err();
        assert!(matches!(err, PayError::ConfigError(_)));
    }

    #[test]
    fn test_new_rejects_garbage_secret() {
        assert!(LocalAppSigner::new(Address::ZERO, "not-a-key").is_err());
    }

    #[tokio::test]
    async fn test_sign_and_recover() {
        let (key, secret) = signer_pair();
        let signer = LocalAppSigner::new(key.address(), &secret).unwrap();

        let request =
            AttestationRequest::new(key.address(), DEFAULT_TEMPLATE_ID, DEFAULT_USER_ADDRESS, 42);
        let sign_result = signer
            .sign(&request.to_json_string().unwrap())
            .await
            .unwrap();

        let signed = SignedRequest::parse(&sign_result).unwrap();
        assert_eq!(signed.att_request, request);
        assert_eq!(signed.recover_signer().unwrap(), key.address());
    }

    #[tokio::test]
    async fn test_sign_rejects_foreign_app_id() {
        let (key, secret) = signer_pair();
        let signer = LocalAppSigner::new(key.address(), &secret).unwrap();
        let request =
            AttestationRequest::new(Address::ZERO, DEFAULT_TEMPLATE_ID, DEFAULT_USER_ADDRESS, 42);
        let err = signer
            .sign(&request.to_json_string().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, PayError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_sign_rejects_non_json() {
        let (key, secret) = signer_pair();
        let signer = LocalAppSigner::new(key.address(), &secret).unwrap();
        let err = signer.sign("{not json").await.unwrap_err();
        assert!(matches!(err, PayError::InvalidRequest(_)));
    }
}
