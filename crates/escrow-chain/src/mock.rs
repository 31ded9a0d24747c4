//! In-memory test doubles for `ChainAdapter` and `Signer`.
//!
//! Every other crate's test suite wires against these instead of a real
//! Cardano node, following the teacher's own preference for hand-rolled
//! fakes over a mocking framework.

use crate::adapter::{AssetHolder, ChainAction, ChainAdapter, ObservedTransaction, SubmittedTransaction};
use crate::error::ChainError;
use crate::signer::{SignedPayload, Signer, SignerError};
use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};
use escrow_core::identifier::cose::encode_ed25519_cose_key;
use escrow_core::model::{Network, TransactionStatus};
use escrow_core::time::TimestampMs;
use std::collections::HashMap;
use std::sync::Mutex;

/// A deterministic signer keyed by wallet address, for tests that need
/// stable `(key, signature)` pairs across runs.
pub struct MockSigner {
    keys: Mutex<HashMap<String, SigningKey>>,
}

impl Default for MockSigner {
    fn default() -> Self {
        Self { keys: Mutex::new(HashMap::new()) }
    }
}

impl MockSigner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a deterministic keypair for `wallet_address`, derived
    /// from `seed`, and return its vkey hex (Blake2b-224 of the raw
    /// public key) so tests can wire it into `sellerVkey` expectations.
    pub fn register_wallet(&self, wallet_address: &str, seed: u8) -> String {
        let signing_key = SigningKey::from_bytes(&[seed; 32]);
        let vkey = vkey_hex(&signing_key.verifying_key());
        self.keys.lock().unwrap().insert(wallet_address.to_string(), signing_key);
        vkey
    }
}

fn vkey_hex(verifying_key: &ed25519_dalek::VerifyingKey) -> String {
    use blake2::digest::consts::U28;
    use blake2::{Blake2b, Digest};
    type Blake2b224 = Blake2b<U28>;
    let mut hasher = Blake2b224::new();
    hasher.update(verifying_key.to_bytes());
    hex::encode(hasher.finalize())
}

#[async_trait]
impl Signer for MockSigner {
    async fn sign(&self, hashed_hex: &str, wallet_address: &str) -> Result<SignedPayload, SignerError> {
        let keys = self.keys.lock().unwrap();
        let signing_key = keys
            .get(wallet_address)
            .ok_or_else(|| SignerError::UnknownWallet(wallet_address.to_string()))?;
        let signature = signing_key.sign(hashed_hex.as_bytes());
        let key_bytes = encode_ed25519_cose_key(&signing_key.verifying_key());
        Ok(SignedPayload {
            key_hex: hex::encode(key_bytes),
            signature_hex: hex::encode(signature.to_bytes()),
        })
    }
}

/// A scriptable in-memory chain: tests seed asset holders and queue
/// observed transactions; `submit_action` records every call it
/// receives so assertions can inspect dispatch behavior without a real
/// adapter.
#[derive(Default)]
pub struct MockChainAdapter {
    holders: Mutex<HashMap<String, AssetHolder>>,
    pending_observations: Mutex<Vec<ObservedTransaction>>,
    submissions: Mutex<Vec<ChainAction>>,
    /// When set, every `submit_action` call fails with this error
    /// instead of succeeding — used to exercise the dispatcher's retry
    /// and error-classification paths (§4.5, §8).
    submit_failure: Mutex<Option<ChainError>>,
}

impl MockChainAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_asset_holder(&self, asset_unit: &str, holder: AssetHolder) {
        self.holders.lock().unwrap().insert(asset_unit.to_string(), holder);
    }

    pub fn queue_observed_transaction(&self, tx: ObservedTransaction) {
        self.pending_observations.lock().unwrap().push(tx);
    }

    pub fn set_submit_failure(&self, error: Option<ChainError>) {
        *self.submit_failure.lock().unwrap() = error;
    }

    pub fn submissions(&self) -> Vec<ChainAction> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainAdapter for MockChainAdapter {
    async fn find_asset_holder(&self, _network: Network, asset_unit: &str) -> Result<Option<AssetHolder>, ChainError> {
        Ok(self.holders.lock().unwrap().get(asset_unit).cloned())
    }

    async fn fetch_transactions_since(
        &self,
        _network: Network,
        _addresses: &[String],
        since_ms: TimestampMs,
        batch_size: u32,
    ) -> Result<Vec<ObservedTransaction>, ChainError> {
        let mut pending = self.pending_observations.lock().unwrap();
        let take = (batch_size as usize).min(pending.len());
        let batch: Vec<ObservedTransaction> = pending
            .iter()
            .filter(|tx| tx.block_time >= since_ms)
            .take(take)
            .cloned()
            .collect();
        pending.retain(|tx| !batch.iter().any(|b| b.tx_hash == tx.tx_hash));
        Ok(batch)
    }

    async fn submit_action(&self, _network: Network, action: ChainAction) -> Result<SubmittedTransaction, ChainError> {
        if let Some(err) = self.submit_failure.lock().unwrap().clone() {
            return Err(err);
        }
        self.submissions.lock().unwrap().push(action);
        Ok(SubmittedTransaction {
            tx_hash: format!("mocktx{}", self.submissions.lock().unwrap().len()),
            fees: escrow_core::money::Lovelace::from_u64(170_000),
            status: TransactionStatus::Pending,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_signer_produces_stable_signatures_per_wallet() {
        let signer = MockSigner::new();
        let vkey = signer.register_wallet("addr_test1seller", 42);
        assert_eq!(vkey.len(), 56);

        let first = signer.sign("deadbeef", "addr_test1seller").await.unwrap();
        let second = signer.sign("deadbeef", "addr_test1seller").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn mock_signer_rejects_unknown_wallets() {
        let signer = MockSigner::new();
        let err = signer.sign("deadbeef", "addr_unknown").await.unwrap_err();
        assert_eq!(err, SignerError::UnknownWallet("addr_unknown".into()));
    }

    #[tokio::test]
    async fn mock_chain_adapter_records_submissions() {
        let adapter = MockChainAdapter::new();
        let action = ChainAction::SubmitResult {
            payment_id: uuid::Uuid::nil(),
            blockchain_identifier: "abcd".into(),
            result_hash: "ff".repeat(32),
        };
        adapter.submit_action(Network::Preprod, action).await.unwrap();
        assert_eq!(adapter.submissions().len(), 1);
    }
}
