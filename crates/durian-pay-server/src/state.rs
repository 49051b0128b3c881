use std::sync::Arc;

use alloy::signers::local::PrivateKeySigner;
use durian_pay::{AppSigner, ChainTransfer, HttpCompletionApi, LocalAppSigner, Settler};

use crate::config::{ConfigError, ServerConfig};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Attestation request signer (None when PRIMUS_APP_SECRET is unset)
    pub signer: Option<Arc<dyn AppSigner>>,
    /// Settlement engine (None until wallet key and completion URL are set)
    pub settler: Option<Arc<Settler>>,
}

impl AppState {
    /// Build signer and settler from configuration. Credentials that are
    /// present but invalid fail startup; absent ones disable the feature.
    pub fn from_config(config: ServerConfig) -> Result<Self, ConfigError> {
        let signer: Option<Arc<dyn AppSigner>> = match config.app_secret.as_deref() {
            Some(secret) => {
                let signer = LocalAppSigner::new(config.app_id, secret)
                    .map_err(|e| ConfigError::InvalidAppSecret(e.to_string()))?;
                Some(Arc::new(signer))
            }
            None => None,
        };

        let settler = match (
            config.wallet_private_key.as_deref(),
            config.completion_url.as_deref(),
        ) {
            (Some(key), Some(completion_url)) => {
                let wallet: PrivateKeySigner =
                    key.parse().map_err(|_| ConfigError::InvalidWalletKey)?;
                let transfer = ChainTransfer::connect(wallet, &config.rpc_url, config.token)
                    .map_err(|e| ConfigError::Chain(e.to_string()))?;
                let completion =
                    HttpCompletionApi::new(completion_url, config.completion_token.clone());
                Some(Arc::new(Settler::new(
                    Arc::new(transfer),
                    Arc::new(completion),
                    config.merchant,
                    config.pay_amount_units,
                )))
            }
            _ => None,
        };

        Ok(Self {
            config: Arc::new(config),
            signer,
            settler,
        })
    }
}
