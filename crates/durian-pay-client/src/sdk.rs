//! The zkTLS attestation SDK seam.
//!
//! Proof generation and verification live in the attestation provider's SDK.
//! [`AttestationSdk`] is the surface the orchestrator needs from it;
//! [`ReplaySdk`] is a local stand-in that replays a recorded attestation and
//! verifies the application signature on the signed request.

use std::path::PathBuf;
use std::sync::OnceLock;

use alloy::primitives::Address;
use async_trait::async_trait;
use durian_pay::{AttestationRequest, SignedRequest};
use serde_json::Value;

use crate::{ClientError, Platform};

#[async_trait]
pub trait AttestationSdk: Send + Sync {
    /// One-time initialization for an application id.
    async fn init(&self, app_id: Address, platform: Platform) -> Result<Value, ClientError>;

    /// Build a request for `template_id` about `user_address`.
    fn generate_request(
        &self,
        template_id: &str,
        user_address: Address,
    ) -> Result<AttestationRequest, ClientError>;

    /// Run the attestation flow for a signed request and return the attestation.
    async fn start_attestation(&self, signed_request: &str) -> Result<Value, ClientError>;

    /// Verify an attestation. Only `Value::Bool(true)` means verified.
    async fn verify_attestation(&self, attestation: &Value) -> Value;
}

/// Replays a recorded attestation instead of running a live zkTLS session.
///
/// `start_attestation` wraps the signed request together with the recorded
/// data; `verify_attestation` recovers the application signature and checks
/// it against the initialized app id.
#[derive(Debug, Default)]
pub struct ReplaySdk {
    recording: Option<PathBuf>,
    app_id: OnceLock<Address>,
}

impl ReplaySdk {
    /// `recording` is a JSON file whose contents become the attestation's
    /// `data` field. Without one, `data` is `null`.
    pub fn new(recording: Option<PathBuf>) -> Self {
        Self {
            recording,
            app_id: OnceLock::new(),
        }
    }

    fn initialized_app_id(&self) -> Result<Address, ClientError> {
        self.app_id
            .get()
            .copied()
            .ok_or_else(|| ClientError::Sdk("SDK not initialized".to_string()))
    }

    async fn load_recording(&self) -> Result<Value, ClientError> {
        let Some(path) = &self.recording else {
            return Ok(Value::Null);
        };
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClientError::Sdk(format!("read {}: {e}", path.display())))?;
        serde_json::from_str(&raw)
            .map_err(|e| ClientError::Sdk(format!("parse {}: {e}", path.display())))
    }
}

#[async_trait]
impl AttestationSdk for ReplaySdk {
    async fn init(&self, app_id: Address, platform: Platform) -> Result<Value, ClientError> {
        let stored = *self.app_id.get_or_init(|| app_id);
        if stored != app_id {
            return Err(ClientError::Sdk(format!(
                "already initialized for app id {stored}"
            )));
        }
        Ok(serde_json::json!({ "appId": app_id, "platform": platform }))
    }

    fn generate_request(
        &self,
        template_id: &str,
        user_address: Address,
    ) -> Result<AttestationRequest, ClientError> {
        let app_id = self.initialized_app_id()?;
        let now_millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
        Ok(AttestationRequest::new(
            app_id,
            template_id,
            user_address,
            now_millis,
        ))
    }

    async fn start_attestation(&self, signed_request: &str) -> Result<Value, ClientError> {
        let app_id = self.initialized_app_id()?;
        let signed = SignedRequest::parse(signed_request)
            .map_err(|e| ClientError::Sdk(format!("malformed signed request: {e}")))?;
        if signed.att_request.app_id != app_id {
            return Err(ClientError::Sdk(format!(
                "signed request is for app id {}, expected {app_id}",
                signed.att_request.app_id
            )));
        }
        let data = self.load_recording().await?;
        Ok(serde_json::json!({
            "recipient": signed.att_request.user_address,
            "request": signed.att_request,
            "appSignature": signed.app_signature,
            "data": data,
        }))
    }

    async fn verify_attestation(&self, attestation: &Value) -> Value {
        let Ok(app_id) = self.initialized_app_id() else {
            return Value::Bool(false);
        };
        let signed = match (attestation.get("request"), attestation.get("appSignature")) {
            (Some(request), Some(Value::String(signature))) => {
                match serde_json::from_value::<AttestationRequest>(request.clone()) {
                    Ok(att_request) => SignedRequest {
                        att_request,
                        app_signature: signature.clone(),
                    },
                    Err(_) => return Value::Bool(false),
                }
            }
            _ => return Value::Bool(false),
        };
        match signed.recover_signer() {
            Ok(signer) => Value::Bool(signer == app_id),
            Err(e) => {
                tracing::debug!(error = %e, "attestation signature did not recover");
                Value::Bool(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::signers::local::PrivateKeySigner;
    use durian_pay::{AppSigner, LocalAppSigner, DEFAULT_TEMPLATE_ID, DEFAULT_USER_ADDRESS};

    fn app_signer() -> LocalAppSigner {
        let key = PrivateKeySigner::random();
        let secret = alloy::hex::encode_prefixed(key.to_bytes());
        LocalAppSigner::new(key.address(), &secret).unwrap()
    }

    #[tokio::test]
    async fn test_generate_requires_init() {
        let sdk = ReplaySdk::default();
        assert!(sdk
            .generate_request(DEFAULT_TEMPLATE_ID, DEFAULT_USER_ADDRESS)
            .is_err());
    }

    #[tokio::test]
    async fn test_replay_verifies_app_signature() {
        let signer = app_signer();
        let sdk = ReplaySdk::default();
        sdk.init(signer.app_id(), Platform::Pc).await.unwrap();

        let request = sdk
            .generate_request(DEFAULT_TEMPLATE_ID, DEFAULT_USER_ADDRESS)
            .unwrap();
        assert_eq!(request.app_id, signer.app_id());
        let signed = signer.sign(&request.to_json_string().unwrap()).await.unwrap();

        let attestation = sdk.start_attestation(&signed).await.unwrap();
        assert_eq!(attestation["data"], Value::Null);
        assert_eq!(sdk.verify_attestation(&attestation).await, Value::Bool(true));
    }

    #[tokio::test]
    async fn test_tampered_attestation_fails_verification() {
        let signer = app_signer();
        let sdk = ReplaySdk::default();
        sdk.init(signer.app_id(), Platform::Pc).await.unwrap();

        let request = sdk
            .generate_request(DEFAULT_TEMPLATE_ID, DEFAULT_USER_ADDRESS)
            .unwrap();
        let signed = signer.sign(&request.to_json_string().unwrap()).await.unwrap();
        let mut attestation = sdk.start_attestation(&signed).await.unwrap();
        attestation["request"]["attTemplateID"] = Value::String("other-template".into());

        assert_eq!(sdk.verify_attestation(&attestation).await, Value::Bool(false));
        assert_eq!(sdk.verify_attestation(&Value::Null).await, Value::Bool(false));
    }

    #[tokio::test]
    async fn test_init_is_bound_to_one_app_id() {
        let sdk = ReplaySdk::default();
        sdk.init(Address::ZERO, Platform::Android).await.unwrap();
        assert!(sdk.init(Address::repeat_byte(1), Platform::Pc).await.is_err());
    }
}
