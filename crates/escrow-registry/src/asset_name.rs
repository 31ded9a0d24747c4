//! Deterministic token-name derivation for a registry NFT.
//!
//! Spec reference: §4.7/§3 — `agentIdentifier = policyId ∥ assetName`,
//! filled only once the mint is confirmed. The asset name itself is
//! never chosen by the caller; we derive it from the request id the
//! same way `escrow-core::identifier::codec` derives `sellerIdentifier`
//! from a random cuid — `hex(SHA-256(requestId))`, truncated to 32 hex
//! characters (16 bytes) to stay well under Cardano's 32-byte asset
//! name limit.

use sha2::{Digest, Sha256};
use uuid::Uuid;

pub fn asset_name_hex(registry_request_id: Uuid) -> String {
    let digest = Sha256::digest(registry_request_id.as_bytes());
    hex::encode(&digest[..16])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derivation_is_deterministic_and_bounded() {
        let id = Uuid::new_v4();
        assert_eq!(asset_name_hex(id), asset_name_hex(id));
        assert_eq!(asset_name_hex(id).len(), 32);
    }

    #[test]
    fn distinct_requests_get_distinct_names() {
        assert_ne!(asset_name_hex(Uuid::new_v4()), asset_name_hex(Uuid::new_v4()));
    }
}
