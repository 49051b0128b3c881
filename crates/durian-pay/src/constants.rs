use alloy::primitives::{address, Address};

/// Default RPC endpoint for Base Sepolia.
pub const RPC_URL: &str = "https://sepolia.base.org";

/// USDC on Base Sepolia.
pub const DEFAULT_TOKEN: Address = address!("036CbD53842c5426634e7929541eC2318f3dCF7e");

/// USDC has 6 decimal places.
pub const TOKEN_DECIMALS: u32 = 6;

/// Merchant wallet that receives settlements unless `MERCHANT_ADDRESS` overrides it.
pub const DEFAULT_MERCHANT: Address = address!("A830Cd34D83C10Ba3A8bB2F25ff8BBae9BcD0125");

/// Human-readable amount transferred per settlement.
pub const DEFAULT_PAY_AMOUNT: &str = "0.01";

/// Public Primus application id. The matching secret is server configuration.
pub const DEFAULT_APP_ID: Address = address!("5c4b35a78081b25c779575b75c5224aa921771b3");

/// Attestation template bound into every request.
pub const DEFAULT_TEMPLATE_ID: &str = "22cae243-06b6-484d-89cb-bc571b4025be";

/// Subject address the attestation is issued for.
pub const DEFAULT_USER_ADDRESS: Address = address!("A830Cd34D83C10Ba3A8bB2F25ff8BBae9BcD0125");

/// Default transport mode for attestations.
pub const PROXY_TLS: &str = "proxytls";

/// Prefix of server-generated settlement references.
pub const REFERENCE_PREFIX: &str = "DUR";

/// Default server port, also the client's default API base.
pub const DEFAULT_PORT: u16 = 9000;

/// Default API base URL used by clients.
pub const DEFAULT_API_URL: &str = "http://localhost:9000";
