//! The signed preimage object carried inside every `blockchainIdentifier`.
//!
//! Spec reference: §4.1 — "Preimage object (canonical-JSON serialization,
//! keys in insertion order defined here)". The insertion order matters for
//! readability only; `jcs::canonicalize` re-sorts keys before hashing, so
//! this struct's field order is not load-bearing, but we keep it matching
//! the spec's listing for anyone diffing against it.

use crate::money::UnitValue;
use crate::time::TimestampMs;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preimage {
    pub input_hash: String,
    pub agent_identifier: String,
    pub purchaser_identifier: String,
    pub seller_identifier: String,
    /// `null` for Fixed pricing per §4.1; otherwise the ordered list of
    /// requested funds.
    #[serde(rename = "RequestedFunds")]
    pub requested_funds: Option<Vec<UnitValue>>,
    pub pay_by_time: TimestampMs,
    pub submit_result_time: TimestampMs,
    pub unlock_time: TimestampMs,
    pub external_dispute_unlock_time: TimestampMs,
    pub seller_address: String,
}

impl Preimage {
    /// `SHA-256(canonical_json(preimage))`, hex-encoded — step 2 of the
    /// seller-side encoding pipeline.
    pub fn hash_hex(&self) -> String {
        let value: Value = serde_json::to_value(self).expect("Preimage always serializes");
        let canonical = super::jcs::canonicalize(&value);
        let digest = Sha256::digest(canonical.as_bytes());
        hex::encode(digest)
    }
}
