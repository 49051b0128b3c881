//! Merchant settlement: ERC-20 transfer, then the completion notice.
//!
//! The two legs are not atomic. Once the transfer is broadcast it is never
//! reversed; a failed completion call is reported together with the
//! transaction hash so the caller can reconcile. Caller-supplied references
//! make the whole operation idempotent within a process: a settled reference
//! returns its stored receipt, a reference whose transfer was broadcast but
//! not yet seen mined only waits for that transaction again, and one whose
//! completion failed only re-sends the completion notice.

use std::sync::Arc;
use std::time::{Duration, Instant};

use alloy::primitives::{Address, TxHash, U256};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use thiserror::Error;

use crate::completion::{CompletionApi, CompletionNotice};
use crate::erc20::TokenTransfer;
use crate::payment::{SettlementReceipt, SettlementRequest};
use crate::reference::generate_reference;
use crate::PayError;

/// How long a settled reference keeps answering with its stored receipt.
pub const SETTLED_RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Error)]
pub enum SettlementError {
    #[error("settlement for reference {0} is already in progress")]
    InProgress(String),

    #[error("transfer failed: {0}")]
    Transfer(#[source] PayError),

    /// Broadcast, but no receipt was seen. Retrying the same reference waits
    /// for this transaction instead of sending another.
    #[error("transfer {tx_hash} not confirmed: {error}")]
    Unconfirmed {
        tx_hash: TxHash,
        reference: Option<String>,
        error: String,
    },

    #[error("completion API rejected settlement with status {status}")]
    CompletionRejected {
        tx_hash: TxHash,
        reference: String,
        payer_wallet: Address,
        status: u16,
        body: serde_json::Value,
    },

    #[error("completion API unreachable: {error}")]
    CompletionUnreachable {
        tx_hash: TxHash,
        reference: String,
        payer_wallet: Address,
        error: String,
    },
}

impl SettlementError {
    /// Transaction hash of a transfer that already happened, if any.
    pub fn tx_hash(&self) -> Option<TxHash> {
        match self {
            Self::Unconfirmed { tx_hash, .. }
            | Self::CompletionRejected { tx_hash, .. }
            | Self::CompletionUnreachable { tx_hash, .. } => Some(*tx_hash),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
enum LedgerState {
    InFlight,
    /// Sent to the node, receipt not yet seen.
    Broadcast(TxHash),
    /// Mined, completion notice not yet accepted.
    Transferred(TxHash),
    Settled {
        receipt: SettlementReceipt,
        at: Instant,
    },
}

/// Exclusive hold on a reference while it settles. Dropping an unfinished
/// claim (error or cancellation) records how far the settlement got.
struct Claim<'a> {
    ledger: &'a DashMap<String, LedgerState>,
    reference: String,
    tx_hash: Option<TxHash>,
    confirmed: bool,
    done: bool,
}

impl Claim<'_> {
    fn finish(mut self, receipt: SettlementReceipt) {
        self.ledger.insert(
            self.reference.clone(),
            LedgerState::Settled {
                receipt,
                at: Instant::now(),
            },
        );
        self.done = true;
    }
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        if self.done {
            return;
        }
        match (self.tx_hash, self.confirmed) {
            (Some(tx), true) => {
                self.ledger
                    .insert(self.reference.clone(), LedgerState::Transferred(tx));
            }
            (Some(tx), false) => {
                self.ledger
                    .insert(self.reference.clone(), LedgerState::Broadcast(tx));
            }
            (None, _) => {
                self.ledger.remove(&self.reference);
            }
        }
    }
}

/// Pays the configured merchant a fixed amount and notifies the completion API.
pub struct Settler {
    transfer: Arc<dyn TokenTransfer>,
    completion: Arc<dyn CompletionApi>,
    merchant: Address,
    amount: U256,
    ledger: DashMap<String, LedgerState>,
}

impl Settler {
    pub fn new(
        transfer: Arc<dyn TokenTransfer>,
        completion: Arc<dyn CompletionApi>,
        merchant: Address,
        amount: U256,
    ) -> Self {
        Self {
            transfer,
            completion,
            merchant,
            amount,
            ledger: DashMap::new(),
        }
    }

    pub fn payer(&self) -> Address {
        self.transfer.payer()
    }

    pub fn merchant(&self) -> Address {
        self.merchant
    }

    pub fn amount(&self) -> U256 {
        self.amount
    }

    /// Check RPC connectivity through the transfer backend.
    pub async fn health_check(&self) -> Result<u64, PayError> {
        self.transfer.latest_block().await
    }

    /// Forget settled references older than `max_age`. References with a
    /// transfer that has not settled are kept. Returns the number purged.
    pub fn purge_settled(&self, max_age: Duration) -> usize {
        let before = self.ledger.len();
        self.ledger.retain(|_, state| match state {
            LedgerState::Settled { at, .. } => at.elapsed() < max_age,
            _ => true,
        });
        before.saturating_sub(self.ledger.len())
    }

    /// Settle one payment. See the module docs for the failure model.
    pub async fn settle(
        &self,
        request: &SettlementRequest,
    ) -> Result<SettlementReceipt, SettlementError> {
        self.warn_on_overrides(request);
        let purged = self.purge_settled(SETTLED_RETENTION);
        if purged > 0 {
            tracing::debug!(purged, "expired settled references");
        }

        let requested = request
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);

        // (tx, mined) of an earlier attempt on the same reference.
        let mut prior: Option<(TxHash, bool)> = None;
        let mut claim = None;
        if let Some(reference) = &requested {
            match self.ledger.entry(reference.clone()) {
                Entry::Occupied(mut entry) => match entry.get().clone() {
                    LedgerState::Settled { receipt, .. } => {
                        tracing::info!(reference = %reference, tx = %receipt.tx_hash, "reference already settled");
                        return Ok(receipt);
                    }
                    LedgerState::InFlight => {
                        return Err(SettlementError::InProgress(reference.clone()));
                    }
                    LedgerState::Broadcast(tx) => {
                        entry.insert(LedgerState::InFlight);
                        prior = Some((tx, false));
                    }
                    LedgerState::Transferred(tx) => {
                        entry.insert(LedgerState::InFlight);
                        prior = Some((tx, true));
                    }
                },
                Entry::Vacant(entry) => {
                    entry.insert(LedgerState::InFlight);
                }
            }
            claim = Some(Claim {
                ledger: &self.ledger,
                reference: reference.clone(),
                tx_hash: prior.map(|(tx, _)| tx),
                confirmed: prior.is_some_and(|(_, mined)| mined),
                done: false,
            });
        }

        let payer_wallet = self.transfer.payer();
        let tx_hash = match prior {
            Some((tx, _)) => tx,
            None => {
                let tx = self
                    .transfer
                    .send_transfer(self.merchant, self.amount)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, merchant = %self.merchant, "transfer failed");
                        SettlementError::Transfer(e)
                    })?;
                tracing::info!(tx = %tx, payer = %payer_wallet, merchant = %self.merchant, "transfer broadcast");
                tx
            }
        };
        // Recorded before any further await so cancellation keeps the hash.
        if let Some(claim) = claim.as_mut() {
            claim.tx_hash = Some(tx_hash);
        }

        match prior {
            Some((_, true)) => {
                tracing::info!(tx = %tx_hash, "transfer already confirmed, re-sending completion notice");
            }
            Some((_, false)) | None => {
                if prior.is_some() {
                    tracing::info!(tx = %tx_hash, "transfer already broadcast, waiting for receipt");
                }
                match self.transfer.confirm_transfer(tx_hash).await {
                    Ok(true) => {
                        if let Some(claim) = claim.as_mut() {
                            claim.confirmed = true;
                        }
                        tracing::info!(tx = %tx_hash, "transfer confirmed");
                    }
                    Ok(false) => {
                        // Reverted transfers moved nothing; the reference is free again.
                        if let Some(claim) = claim.as_mut() {
                            claim.tx_hash = None;
                        }
                        tracing::error!(tx = %tx_hash, "transfer reverted");
                        return Err(SettlementError::Transfer(PayError::ChainError(format!(
                            "transfer reverted in {tx_hash}"
                        ))));
                    }
                    Err(e) => {
                        tracing::error!(tx = %tx_hash, error = %e, "transfer not confirmed");
                        return Err(SettlementError::Unconfirmed {
                            tx_hash,
                            reference: requested,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        // Generated references are never presented again, so they skip the ledger.
        let reference = match requested {
            Some(reference) => reference,
            None => {
                let now_millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
                generate_reference(now_millis, &tx_hash)
            }
        };

        let notice = CompletionNotice {
            reference: reference.clone(),
            tx_hash,
            payer_wallet,
        };

        let response = match self.completion.notify(&notice).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(tx = %tx_hash, reference = %reference, error = %e, "completion API unreachable");
                return Err(SettlementError::CompletionUnreachable {
                    tx_hash,
                    reference,
                    payer_wallet,
                    error: e.to_string(),
                });
            }
        };

        if !response.is_success() {
            tracing::warn!(
                tx = %tx_hash,
                reference = %reference,
                status = response.status,
                "completion API rejected settlement"
            );
            return Err(SettlementError::CompletionRejected {
                tx_hash,
                reference,
                payer_wallet,
                status: response.status,
                body: response.body,
            });
        }

        let receipt = SettlementReceipt {
            success: true,
            tx_hash,
            reference,
            payer_wallet,
            payment_complete: response.body,
        };
        if let Some(claim) = claim {
            claim.finish(receipt.clone());
        }
        tracing::info!(tx = %receipt.tx_hash, reference = %receipt.reference, "settlement complete");
        Ok(receipt)
    }

    /// Client-supplied merchant and amount do not drive the transfer; flag
    /// when they disagree with what will actually be paid.
    fn warn_on_overrides(&self, request: &SettlementRequest) {
        if let Some(requested) = request.merchant_address.as_deref() {
            let matches = requested
                .parse::<Address>()
                .map(|a| a == self.merchant)
                .unwrap_or(false);
            if !matches {
                tracing::warn!(
                    requested = %requested,
                    merchant = %self.merchant,
                    "ignoring client merchant address, paying configured merchant"
                );
            }
        }
        if let Some(amount) = &request.amount {
            tracing::warn!(
                requested = %amount,
                paying = %self.amount,
                "ignoring client amount, paying configured amount"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::completion::CompletionResponse;
    use crate::reference::is_generated_reference;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const TX: &str = "0xabc1230000000000000000000000000000000000000000000000000000000001";

    #[derive(Default)]
    struct Events(Mutex<Vec<&'static str>>);

    impl Events {
        fn push(&self, e: &'static str) {
            self.0.lock().unwrap().push(e);
        }
        fn list(&self) -> Vec<&'static str> {
            self.0.lock().unwrap().clone()
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Mined {
        Confirmed,
        Reverted,
        Missing,
        Never,
    }

    struct MockTransfer {
        events: Arc<Events>,
        calls: AtomicUsize,
        confirms: AtomicUsize,
        fail: bool,
        mined: Mutex<Mined>,
    }

    impl MockTransfer {
        fn set_mined(&self, mined: Mined) {
            *self.mined.lock().unwrap() = mined;
        }
    }

    #[async_trait]
    impl TokenTransfer for MockTransfer {
        fn payer(&self) -> Address {
            Address::repeat_byte(0x11)
        }

        async fn send_transfer(&self, _to: Address, _amount: U256) -> Result<TxHash, PayError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.events.push("transfer");
            if self.fail {
                return Err(PayError::ChainError("insufficient funds".into()));
            }
            Ok(TX.parse().unwrap())
        }

        async fn confirm_transfer(&self, _tx_hash: TxHash) -> Result<bool, PayError> {
            self.confirms.fetch_add(1, Ordering::SeqCst);
            let mined = *self.mined.lock().unwrap();
            match mined {
                Mined::Confirmed => Ok(true),
                Mined::Reverted => Ok(false),
                Mined::Missing => Err(PayError::ChainError("no receipt after 60s".into())),
                Mined::Never => {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                    Ok(true)
                }
            }
        }

        async fn latest_block(&self) -> Result<u64, PayError> {
            Ok(1)
        }
    }

    struct MockCompletion {
        events: Arc<Events>,
        statuses: Mutex<Vec<u16>>,
        notices: Mutex<Vec<CompletionNotice>>,
    }

    #[async_trait]
    impl CompletionApi for MockCompletion {
        async fn notify(&self, notice: &CompletionNotice) -> Result<CompletionResponse, PayError> {
            self.events.push("notify");
            self.notices.lock().unwrap().push(notice.clone());
            let status = self.statuses.lock().unwrap().remove(0);
            Ok(CompletionResponse {
                status,
                body: serde_json::json!({"status": status}),
            })
        }
    }

    fn settler(fail_transfer: bool, statuses: Vec<u16>) -> (Settler, Arc<MockTransfer>, Arc<MockCompletion>, Arc<Events>) {
        let events = Arc::new(Events::default());
        let transfer = Arc::new(MockTransfer {
            events: events.clone(),
            calls: AtomicUsize::new(0),
            confirms: AtomicUsize::new(0),
            fail: fail_transfer,
            mined: Mutex::new(Mined::Confirmed),
        });
        let completion = Arc::new(MockCompletion {
            events: events.clone(),
            statuses: Mutex::new(statuses),
            notices: Mutex::new(vec![]),
        });
        let settler = Settler::new(
            transfer.clone(),
            completion.clone(),
            crate::DEFAULT_MERCHANT,
            U256::from(10_000u64),
        );
        (settler, transfer, completion, events)
    }

    fn with_reference(reference: &str) -> SettlementRequest {
        SettlementRequest {
            reference: Some(reference.to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_settle_generates_reference() {
        let (settler, _, completion, events) = settler(false, vec![200]);
        let receipt = settler.settle(&SettlementRequest::default()).await.unwrap();

        assert!(receipt.success);
        assert_eq!(receipt.tx_hash, TX.parse::<TxHash>().unwrap());
        assert!(is_generated_reference(&receipt.reference));
        assert!(receipt.reference.ends_with("-ABC123"));
        assert_eq!(receipt.payer_wallet, Address::repeat_byte(0x11));
        assert_eq!(events.list(), vec!["transfer", "notify"]);

        let notices = completion.notices.lock().unwrap();
        assert_eq!(notices[0].reference, receipt.reference);
        assert_eq!(notices[0].tx_hash, receipt.tx_hash);
    }

    #[tokio::test]
    async fn test_generated_references_are_not_tracked() {
        let (settler, _, _, _) = settler(false, vec![200, 500]);
        settler.settle(&SettlementRequest::default()).await.unwrap();
        assert!(settler.settle(&SettlementRequest::default()).await.is_err());
        assert!(settler.ledger.is_empty());
    }

    #[tokio::test]
    async fn test_transfer_failure_skips_completion() {
        let (settler, _, _, events) = settler(true, vec![200]);
        let err = settler.settle(&SettlementRequest::default()).await.unwrap_err();
        assert!(matches!(err, SettlementError::Transfer(_)));
        assert!(err.tx_hash().is_none());
        assert_eq!(events.list(), vec!["transfer"]);
    }

    #[tokio::test]
    async fn test_completion_rejection_keeps_tx_hash() {
        let (settler, _, _, _) = settler(false, vec![400]);
        let err = settler.settle(&SettlementRequest::default()).await.unwrap_err();
        match &err {
            SettlementError::CompletionRejected { status, body, .. } => {
                assert_eq!(*status, 400);
                assert_eq!(body["status"], 400);
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.tx_hash(), Some(TX.parse().unwrap()));
    }

    #[tokio::test]
    async fn test_settled_reference_is_idempotent() {
        let (settler, transfer, _, _) = settler(false, vec![200]);
        let request = with_reference("DUR-ORDER-2847");
        let first = settler.settle(&request).await.unwrap();
        let second = settler.settle(&request).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.reference, "DUR-ORDER-2847");
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_retry_after_rejection_only_renotifies() {
        let (settler, transfer, _, events) = settler(false, vec![503, 200]);
        let request = with_reference("order-1");
        assert!(settler.settle(&request).await.is_err());
        let receipt = settler.settle(&request).await.unwrap();

        assert_eq!(receipt.reference, "order-1");
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transfer.confirms.load(Ordering::SeqCst), 1);
        assert_eq!(events.list(), vec!["transfer", "notify", "notify"]);
    }

    #[tokio::test]
    async fn test_failed_transfer_releases_reference() {
        let (settler, transfer, _, _) = settler(true, vec![]);
        let request = with_reference("order-2");
        assert!(settler.settle(&request).await.is_err());
        assert!(settler.settle(&request).await.is_err());
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_reverted_transfer_releases_reference() {
        let (settler, transfer, _, _) = settler(false, vec![200]);
        transfer.set_mined(Mined::Reverted);
        let request = with_reference("order-3");

        let err = settler.settle(&request).await.unwrap_err();
        assert!(matches!(err, SettlementError::Transfer(_)));

        transfer.set_mined(Mined::Confirmed);
        settler.settle(&request).await.unwrap();
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_unconfirmed_transfer_is_awaited_not_resent() {
        let (settler, transfer, _, events) = settler(false, vec![200]);
        transfer.set_mined(Mined::Missing);
        let request = with_reference("order-4");

        let err = settler.settle(&request).await.unwrap_err();
        match &err {
            SettlementError::Unconfirmed { reference, .. } => {
                assert_eq!(reference.as_deref(), Some("order-4"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.tx_hash(), Some(TX.parse().unwrap()));

        transfer.set_mined(Mined::Confirmed);
        let receipt = settler.settle(&request).await.unwrap();
        assert_eq!(receipt.tx_hash, TX.parse::<TxHash>().unwrap());
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(transfer.confirms.load(Ordering::SeqCst), 2);
        assert_eq!(events.list(), vec!["transfer", "notify"]);
    }

    #[tokio::test]
    async fn test_cancelled_settlement_keeps_broadcast_transfer() {
        let (settler, transfer, _, _) = settler(false, vec![200]);
        let settler = Arc::new(settler);
        transfer.set_mined(Mined::Never);
        let request = with_reference("order-9");

        let first = {
            let settler = settler.clone();
            let request = request.clone();
            tokio::spawn(async move { settler.settle(&request).await })
        };
        while transfer.confirms.load(Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let concurrent = settler.settle(&request).await.unwrap_err();
        assert!(matches!(concurrent, SettlementError::InProgress(ref r) if r == "order-9"));

        first.abort();
        assert!(first.await.unwrap_err().is_cancelled());

        transfer.set_mined(Mined::Confirmed);
        let receipt = settler.settle(&request).await.unwrap();
        assert_eq!(receipt.reference, "order-9");
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_purge_forgets_only_settled_references() {
        let (settler, transfer, _, _) = settler(false, vec![200, 503, 200]);
        settler.settle(&with_reference("order-5")).await.unwrap();
        assert!(settler.settle(&with_reference("order-6")).await.is_err());

        assert_eq!(settler.purge_settled(Duration::ZERO), 1);
        assert_eq!(settler.ledger.len(), 1);
        assert!(matches!(
            settler.ledger.get("order-6").as_deref(),
            Some(LedgerState::Transferred(_))
        ));

        settler.settle(&with_reference("order-6")).await.unwrap();
        assert_eq!(transfer.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_blank_reference_is_generated() {
        let (settler, _, _, _) = settler(false, vec![200]);
        let receipt = settler.settle(&with_reference("   ")).await.unwrap();
        assert!(is_generated_reference(&receipt.reference));
    }
}
