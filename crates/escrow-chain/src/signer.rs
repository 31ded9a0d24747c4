//! The `Signer` contract (§1, §4.1): wallet key material and Ed25519/COSE
//! signing stay behind this trait, external to the orchestrator. The
//! identifier codec in `escrow-core` only ever sees the
//! already-produced `(key, signature)` hex pair.

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedPayload {
    /// COSE_Key, CBOR-encoded, hex.
    pub key_hex: String,
    /// COSE signature over the supplied hash, hex.
    pub signature_hex: String,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SignerError {
    #[error("wallet address {0} is not known to this signer")]
    UnknownWallet(String),
    #[error("signing backend failure: {0}")]
    Backend(String),
}

#[async_trait]
pub trait Signer: Send + Sync {
    /// `Signer.sign(hashed, sellerWalletAddress)` from §4.1 step 3.
    async fn sign(&self, hashed_hex: &str, wallet_address: &str) -> Result<SignedPayload, SignerError>;
}
