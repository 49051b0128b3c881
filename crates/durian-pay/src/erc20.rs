use std::time::Duration;

use alloy::network::EthereumWallet;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{
    fillers::{
        BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller, WalletFiller,
    },
    Identity, Provider, ProviderBuilder, RootProvider,
};
use alloy::signers::local::PrivateKeySigner;
use async_trait::async_trait;

use crate::{PayError, ERC20};

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);
const RECEIPT_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Concrete provider type from `ProviderBuilder::new().wallet(...).connect_http(...)`.
pub type WalletProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider,
>;

/// Broadcast `transfer(to, value)` from the provider's wallet.
/// Returns the transaction hash as soon as the node accepts it.
pub async fn send_transfer<P: Provider>(
    provider: &P,
    token: Address,
    to: Address,
    value: U256,
) -> Result<TxHash, PayError> {
    let contract = ERC20::new(token, provider);
    let pending = tokio::time::timeout(SEND_TIMEOUT, contract.transfer(to, value).send())
        .await
        .map_err(|_| PayError::ChainError("transfer send timed out after 30s".to_string()))?
        .map_err(|e| PayError::ChainError(format!("transfer send failed: {e}")))?;
    Ok(*pending.tx_hash())
}

/// Poll for the receipt of `tx_hash`. `Ok(false)` means the transaction was
/// mined and reverted; an error means no receipt was seen in time.
pub async fn wait_for_receipt<P: Provider>(provider: &P, tx_hash: TxHash) -> Result<bool, PayError> {
    let poll = async {
        loop {
            let receipt = provider
                .get_transaction_receipt(tx_hash)
                .await
                .map_err(|e| PayError::ChainError(format!("receipt query failed: {e}")))?;
            if let Some(receipt) = receipt {
                return Ok::<_, PayError>(receipt.status());
            }
            tokio::time::sleep(RECEIPT_POLL_INTERVAL).await;
        }
    };
    tokio::time::timeout(RECEIPT_TIMEOUT, poll)
        .await
        .map_err(|_| PayError::ChainError(format!("no receipt for {tx_hash} after 60s")))?
}

/// The on-chain leg of a settlement, split so the caller learns the
/// transaction hash before waiting for it to be mined.
#[async_trait]
pub trait TokenTransfer: Send + Sync {
    /// Wallet the transfer is paid from.
    fn payer(&self) -> Address;

    /// Broadcast a transfer of `amount` base units to `to`.
    async fn send_transfer(&self, to: Address, amount: U256) -> Result<TxHash, PayError>;

    /// Wait until `tx_hash` is mined. `Ok(true)` confirmed, `Ok(false)` reverted.
    async fn confirm_transfer(&self, tx_hash: TxHash) -> Result<bool, PayError>;

    /// Latest block number, used by health checks.
    async fn latest_block(&self) -> Result<u64, PayError>;
}

/// [`TokenTransfer`] backed by a wallet-filling HTTP provider.
pub struct ChainTransfer {
    provider: WalletProvider,
    payer: Address,
    token: Address,
}

impl ChainTransfer {
    /// Build a wallet provider for `signer` against `rpc_url`.
    pub fn connect(signer: PrivateKeySigner, rpc_url: &str, token: Address) -> Result<Self, PayError> {
        let payer = signer.address();
        let url = rpc_url
            .parse()
            .map_err(|e| PayError::ConfigError(format!("invalid RPC_URL '{rpc_url}': {e}")))?;
        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url);
        Ok(Self {
            provider,
            payer,
            token,
        })
    }

    pub fn token(&self) -> Address {
        self.token
    }
}

#[async_trait]
impl TokenTransfer for ChainTransfer {
    fn payer(&self) -> Address {
        self.payer
    }

    async fn send_transfer(&self, to: Address, amount: U256) -> Result<TxHash, PayError> {
        send_transfer(&self.provider, self.token, to, amount).await
    }

    async fn confirm_transfer(&self, tx_hash: TxHash) -> Result<bool, PayError> {
        wait_for_receipt(&self.provider, tx_hash).await
    }

    async fn latest_block(&self) -> Result<u64, PayError> {
        self.provider
            .get_block_number()
            .await
            .map_err(|e| PayError::ChainError(format!("block number query failed: {e}")))
    }
}
