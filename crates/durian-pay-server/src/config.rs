use alloy::primitives::{Address, U256};
use durian_pay::{
    parse_amount, DEFAULT_APP_ID, DEFAULT_MERCHANT, DEFAULT_PAY_AMOUNT, DEFAULT_PORT,
    DEFAULT_TOKEN, RPC_URL, TOKEN_DECIMALS,
};
use url::Url;

const DEFAULT_RATE_LIMIT_RPM: u64 = 120;

#[derive(Clone)]
pub struct ServerConfig {
    /// Server port
    pub port: u16,
    /// Attestation application id (public)
    pub app_id: Address,
    /// Attestation application secret. Signing is disabled without it.
    pub app_secret: Option<String>,
    /// Payer wallet key. Settlement is disabled without it.
    pub wallet_private_key: Option<String>,
    /// RPC URL for chain access
    pub rpc_url: String,
    /// ERC-20 token transferred on settlement
    pub token: Address,
    pub token_decimals: u32,
    /// Settlement recipient
    pub merchant: Address,
    /// Human-readable amount per settlement (e.g. "0.01")
    pub pay_amount: String,
    /// `pay_amount` in token base units
    pub pay_amount_units: U256,
    /// Remote "payment complete" endpoint
    pub completion_url: Option<String>,
    /// Bearer token for the completion endpoint
    pub completion_token: Option<String>,
    /// CORS allowed origins (empty = any localhost port)
    pub allowed_origins: Vec<String>,
    /// Rate limit requests per minute per IP
    pub rate_limit_rpm: u64,
    /// Bearer token required for /metrics
    pub metrics_token: Option<String>,
    /// Serve /metrics without a token when none is configured
    pub public_metrics: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            app_id: DEFAULT_APP_ID,
            app_secret: None,
            wallet_private_key: None,
            rpc_url: RPC_URL.to_string(),
            token: DEFAULT_TOKEN,
            token_decimals: TOKEN_DECIMALS,
            merchant: DEFAULT_MERCHANT,
            pay_amount: DEFAULT_PAY_AMOUNT.to_string(),
            pay_amount_units: U256::from(10_000u64),
            completion_url: None,
            completion_token: None,
            allowed_origins: vec![],
            rate_limit_rpm: DEFAULT_RATE_LIMIT_RPM,
            metrics_token: None,
            public_metrics: false,
        }
    }
}

impl std::fmt::Debug for ServerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerConfig")
            .field("port", &self.port)
            .field("app_id", &self.app_id)
            .field("app_secret", &self.app_secret.as_ref().map(|_| "[REDACTED]"))
            .field(
                "wallet_private_key",
                &self.wallet_private_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field("rpc_url", &self.rpc_url)
            .field("token", &self.token)
            .field("token_decimals", &self.token_decimals)
            .field("merchant", &self.merchant)
            .field("pay_amount", &self.pay_amount)
            .field("pay_amount_units", &self.pay_amount_units)
            .field("completion_url", &self.completion_url)
            .field(
                "completion_token",
                &self.completion_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("allowed_origins", &self.allowed_origins)
            .field("rate_limit_rpm", &self.rate_limit_rpm)
            .field(
                "metrics_token",
                &self.metrics_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("public_metrics", &self.public_metrics)
            .finish()
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    /// Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let port = match var("PORT") {
            Some(p) => p.parse().map_err(|_| ConfigError::InvalidNumber("PORT", p))?,
            None => defaults.port,
        };

        let app_id = match var("PRIMUS_APP_ID") {
            Some(a) => a.parse().map_err(|_| ConfigError::InvalidAddress("PRIMUS_APP_ID", a))?,
            None => defaults.app_id,
        };

        let rpc_url = var("RPC_URL").unwrap_or(defaults.rpc_url);
        Url::parse(&rpc_url).map_err(|_| ConfigError::InvalidUrl("RPC_URL", rpc_url.clone()))?;

        let token = match var("TOKEN_ADDRESS") {
            Some(a) => a.parse().map_err(|_| ConfigError::InvalidAddress("TOKEN_ADDRESS", a))?,
            None => defaults.token,
        };

        let token_decimals = match var("TOKEN_DECIMALS") {
            Some(d) => d
                .parse()
                .map_err(|_| ConfigError::InvalidNumber("TOKEN_DECIMALS", d))?,
            None => defaults.token_decimals,
        };

        let merchant = match var("MERCHANT_ADDRESS") {
            Some(a) => a
                .parse()
                .map_err(|_| ConfigError::InvalidAddress("MERCHANT_ADDRESS", a))?,
            None => defaults.merchant,
        };

        let pay_amount = var("PAY_AMOUNT").unwrap_or(defaults.pay_amount);
        let pay_amount_units = parse_amount(&pay_amount, token_decimals)
            .map_err(|e| ConfigError::InvalidAmount(format!("{pay_amount}: {e}")))?;
        if pay_amount_units.is_zero() {
            return Err(ConfigError::InvalidAmount(format!(
                "{pay_amount}: amount must be positive"
            )));
        }

        let completion_url = var("PAYMENT_COMPLETE_URL");
        if let Some(ref u) = completion_url {
            Url::parse(u).map_err(|_| ConfigError::InvalidUrl("PAYMENT_COMPLETE_URL", u.clone()))?;
        }

        let allowed_origins: Vec<String> = var("ALLOWED_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let rate_limit_rpm = var("RATE_LIMIT_RPM")
            .and_then(|r| r.parse().ok())
            .filter(|r| *r > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_RPM);

        let public_metrics = var("DURIAN_PUBLIC_METRICS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(Self {
            port,
            app_id,
            app_secret: var("PRIMUS_APP_SECRET"),
            wallet_private_key: var("WALLET_PRIVATE_KEY"),
            rpc_url,
            token,
            token_decimals,
            merchant,
            pay_amount,
            pay_amount_units,
            completion_url,
            completion_token: var("PAYMENT_COMPLETE_TOKEN"),
            allowed_origins,
            rate_limit_rpm,
            metrics_token: var("METRICS_TOKEN"),
            public_metrics,
        })
    }

    /// The first missing variable that keeps settlement disabled, if any.
    pub fn settlement_gap(&self) -> Option<&'static str> {
        if self.wallet_private_key.is_none() {
            Some("WALLET_PRIVATE_KEY")
        } else if self.completion_url.is_none() {
            Some("PAYMENT_COMPLETE_URL")
        } else {
            None
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid address in {0}: {1}")]
    InvalidAddress(&'static str, String),

    #[error("invalid URL in {0}: {1}")]
    InvalidUrl(&'static str, String),

    #[error("invalid number in {0}: {1}")]
    InvalidNumber(&'static str, String),

    #[error("invalid PAY_AMOUNT: {0}")]
    InvalidAmount(String),

    #[error("invalid PRIMUS_APP_SECRET: {0}")]
    InvalidAppSecret(String),

    #[error("invalid WALLET_PRIVATE_KEY")]
    InvalidWalletKey,

    #[error("chain setup failed: {0}")]
    Chain(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from_map(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = from_map(&[]).unwrap();
        assert_eq!(config.port, 9000);
        assert_eq!(config.app_id, DEFAULT_APP_ID);
        assert_eq!(config.pay_amount_units, U256::from(10_000u64));
        assert_eq!(config.rate_limit_rpm, 120);
        assert!(config.allowed_origins.is_empty());
        assert_eq!(config.settlement_gap(), Some("WALLET_PRIVATE_KEY"));
    }

    #[test]
    fn test_pay_amount_uses_token_decimals() {
        let config = from_map(&[("PAY_AMOUNT", "1.5"), ("TOKEN_DECIMALS", "18")]).unwrap();
        assert_eq!(
            config.pay_amount_units,
            U256::from(1_500_000_000_000_000_000u128)
        );
    }

    #[test]
    fn test_rejects_zero_amount() {
        assert!(matches!(
            from_map(&[("PAY_AMOUNT", "0")]),
            Err(ConfigError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_rejects_bad_merchant() {
        assert!(matches!(
            from_map(&[("MERCHANT_ADDRESS", "0x123")]),
            Err(ConfigError::InvalidAddress("MERCHANT_ADDRESS", _))
        ));
    }

    #[test]
    fn test_empty_values_are_unset() {
        let config = from_map(&[("WALLET_PRIVATE_KEY", "  "), ("PORT", "")]).unwrap();
        assert!(config.wallet_private_key.is_none());
        assert_eq!(config.port, 9000);
    }

    #[test]
    fn test_settlement_gap_needs_completion_url() {
        let config = from_map(&[("WALLET_PRIVATE_KEY", "0xabc")]).unwrap();
        assert_eq!(config.settlement_gap(), Some("PAYMENT_COMPLETE_URL"));

        let config = from_map(&[
            ("WALLET_PRIVATE_KEY", "0xabc"),
            ("PAYMENT_COMPLETE_URL", "https://ledger.example/complete"),
        ])
        .unwrap();
        assert_eq!(config.settlement_gap(), None);
    }

    #[test]
    fn test_allowed_origins_split() {
        let config =
            from_map(&[("ALLOWED_ORIGINS", "https://a.example, https://b.example,")]).unwrap();
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example", "https://b.example"]
        );
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let config = from_map(&[
            ("PRIMUS_APP_SECRET", "app-secret-value"),
            ("WALLET_PRIVATE_KEY", "wallet-key-value"),
            ("METRICS_TOKEN", "metrics-token-value"),
        ])
        .unwrap();
        let debug = format!("{config:?}");
        assert!(!debug.contains("app-secret-value"));
        assert!(!debug.contains("wallet-key-value"));
        assert!(!debug.contains("metrics-token-value"));
        assert!(debug.contains("[REDACTED]"));
    }
}
