//! Buyer-side identifier verification (§4.1 "Verification").
//!
//! This is the step CreatePurchase runs before it trusts anything a
//! seller's `blockchainIdentifier` claims: every mismatch here is a
//! rejection, never a best-effort acceptance.

use super::cose;
use super::codec::{decode_blockchain_identifier, DecodedIdentifier};
use super::preimage::Preimage;
use blake2::digest::consts::U28;
use blake2::{Blake2b, Digest};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("blockchainIdentifier is not validly formatted")]
    InvalidFormat,
    #[error("purchaser id in blockchainIdentifier does not match identifierFromPurchaser")]
    PurchaserMismatch,
    #[error("agent id embedded in blockchainIdentifier does not match the claimed agentIdentifier")]
    AgentMismatch,
    #[error("COSE key embedded in blockchainIdentifier does not hash to sellerVkey")]
    KeyMismatch,
    #[error("signature over the reconstructed preimage does not verify")]
    SignatureInvalid,
}

/// Everything the buyer supplies (or has separately confirmed on-chain)
/// to verify a seller-issued `blockchainIdentifier`.
pub struct VerifyInput<'a> {
    pub agent_identifier: &'a str,
    pub identifier_from_purchaser: &'a str,
    pub seller_vkey: &'a str,
    pub preimage: Preimage,
}

type Blake2b224 = Blake2b<U28>;

/// Cardano's payment-key-hash convention: Blake2b-224 of the raw public
/// key bytes, hex-encoded. Used only to check a COSE key's embedded
/// Ed25519 public key against the `sellerVkey` the buyer already trusts
/// from the on-chain asset holder lookup.
fn cose_key_to_vkey_hex(cose_key_bytes: &[u8]) -> Result<String, VerifyError> {
    let verifying_key =
        cose::decode_ed25519_public_key(cose_key_bytes).map_err(|_| VerifyError::KeyMismatch)?;
    let mut hasher = Blake2b224::new();
    hasher.update(verifying_key.to_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Runs the full §4.1 verification sequence and returns the decoded
/// identifier on success.
pub fn verify_blockchain_identifier(
    blockchain_identifier: &str,
    input: VerifyInput,
) -> Result<DecodedIdentifier, VerifyError> {
    let decoded = decode_blockchain_identifier(blockchain_identifier).ok_or(VerifyError::InvalidFormat)?;

    if decoded.agent_identifier.as_deref() != Some(input.agent_identifier) {
        return Err(VerifyError::AgentMismatch);
    }
    if decoded.purchaser_id != input.identifier_from_purchaser {
        return Err(VerifyError::PurchaserMismatch);
    }

    let key_bytes = hex::decode(&decoded.key).map_err(|_| VerifyError::KeyMismatch)?;
    let vkey_hex = cose_key_to_vkey_hex(&key_bytes)?;
    if vkey_hex != input.seller_vkey {
        return Err(VerifyError::KeyMismatch);
    }

    let hashed = input.preimage.hash_hex();
    let signature_bytes = hex::decode(&decoded.signature).map_err(|_| VerifyError::SignatureInvalid)?;
    if !cose::verify(&key_bytes, hashed.as_bytes(), &signature_bytes) {
        return Err(VerifyError::SignatureInvalid);
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identifier::codec::{build_token_payload, encode_blockchain_identifier, new_seller_identifier};
    use ciborium::value::Value as Cbor;
    use ed25519_dalek::{Signer, SigningKey};

    fn encode_cose_key(verifying_key: &ed25519_dalek::VerifyingKey) -> Vec<u8> {
        let map = Cbor::Map(vec![
            (Cbor::Integer(1i64.into()), Cbor::Integer(1i64.into())),
            (Cbor::Integer((-1i64).into()), Cbor::Integer(6i64.into())),
            (Cbor::Integer((-2i64).into()), Cbor::Bytes(verifying_key.to_bytes().to_vec())),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&map, &mut out).unwrap();
        out
    }

    fn sample_preimage(seller_identifier: &str, purchaser_identifier: &str) -> Preimage {
        Preimage {
            input_hash: "a".repeat(64),
            agent_identifier: "b".repeat(60),
            purchaser_identifier: purchaser_identifier.to_string(),
            seller_identifier: seller_identifier.to_string(),
            requested_funds: None,
            pay_by_time: 1,
            submit_result_time: 2,
            unlock_time: 3,
            external_dispute_unlock_time: 4,
            seller_address: "addr_test1...".into(),
        }
    }

    #[test]
    fn verifies_a_genuinely_signed_identifier() {
        let agent_identifier = "b".repeat(60);
        let purchaser_identifier = "cafebabecafebabe";
        let seller_identifier = new_seller_identifier(&agent_identifier);

        let signing_key = SigningKey::from_bytes(&[3u8; 32]);
        let verifying_key = signing_key.verifying_key();
        let cose_key_bytes = encode_cose_key(&verifying_key);

        let preimage = sample_preimage(&seller_identifier, purchaser_identifier);
        let hashed = preimage.hash_hex();
        let signature = signing_key.sign(hashed.as_bytes());

        let payload = build_token_payload(
            &seller_identifier,
            purchaser_identifier,
            &hex::encode(signature.to_bytes()),
            &hex::encode(&cose_key_bytes),
        );
        let blockchain_identifier = encode_blockchain_identifier(&payload);

        let mut vkey_hasher = Blake2b224::new();
        vkey_hasher.update(verifying_key.to_bytes());
        let seller_vkey = hex::encode(vkey_hasher.finalize());

        let result = verify_blockchain_identifier(
            &blockchain_identifier,
            VerifyInput {
                agent_identifier: &agent_identifier,
                identifier_from_purchaser: purchaser_identifier,
                seller_vkey: &seller_vkey,
                preimage,
            },
        );

        assert!(result.is_ok(), "{result:?}");
    }

    #[test]
    fn rejects_purchaser_id_mismatch() {
        let agent_identifier = "b".repeat(60);
        let seller_identifier = new_seller_identifier(&agent_identifier);
        let signing_key = SigningKey::from_bytes(&[5u8; 32]);
        let verifying_key = signing_key.verifying_key();
        let cose_key_bytes = encode_cose_key(&verifying_key);

        let preimage = sample_preimage(&seller_identifier, "cafebabecafebabe");
        let hashed = preimage.hash_hex();
        let signature = signing_key.sign(hashed.as_bytes());
        let payload = build_token_payload(
            &seller_identifier,
            "cafebabecafebabe",
            &hex::encode(signature.to_bytes()),
            &hex::encode(&cose_key_bytes),
        );
        let blockchain_identifier = encode_blockchain_identifier(&payload);

        let mut vkey_hasher = Blake2b224::new();
        vkey_hasher.update(verifying_key.to_bytes());
        let seller_vkey = hex::encode(vkey_hasher.finalize());

        let result = verify_blockchain_identifier(
            &blockchain_identifier,
            VerifyInput {
                agent_identifier: &agent_identifier,
                identifier_from_purchaser: "deaddeaddeaddead",
                seller_vkey: &seller_vkey,
                preimage,
            },
        );

        assert_eq!(result.unwrap_err(), VerifyError::PurchaserMismatch);
    }

    #[test]
    fn rejects_malformed_identifiers_without_panicking() {
        let preimage = sample_preimage("aa", "bb");
        let result = verify_blockchain_identifier(
            "zz",
            VerifyInput {
                agent_identifier: "agent",
                identifier_from_purchaser: "bb",
                seller_vkey: "vkey",
                preimage,
            },
        );
        assert_eq!(result.unwrap_err(), VerifyError::InvalidFormat);
    }
}
