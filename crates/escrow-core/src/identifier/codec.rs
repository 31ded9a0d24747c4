//! The seller-side encoding / buyer-side decoding pipeline for
//! `blockchainIdentifier` (§4.1).
//!
//! This module never signs anything — signing lives behind the `Signer`
//! trait in `escrow-chain`, which is given `hashed` (the preimage hash)
//! and a seller wallet address, and returns the `(key, signature)` hex
//! pair this module assembles into a token.

use cuid2::create_id;
use sha2::{Digest, Sha256};

/// `SHA-256(random_cuid) ∥ agentIdentifier`, hex, per §4.1 step 1. The
/// embedded `agentIdentifier` lets a buyer recover it from `sellerId`
/// alone without trusting the rest of the envelope.
pub fn new_seller_identifier(agent_identifier: &str) -> String {
    let cuid = create_id();
    let digest = Sha256::digest(cuid.as_bytes());
    format!("{}{agent_identifier}", hex::encode(digest))
}

/// Length, in hex characters, of the `SHA-256(random_cuid)` prefix of a
/// `sellerIdentifier` — a 32-byte digest hex-encodes to 64 characters.
const SELLER_ID_HASH_HEX_LEN: usize = 64;

/// `sellerIdentifier ∥ "." ∥ purchaserIdentifier ∥ "." ∥ signature ∥ "." ∥ key`
/// (§4.1 step 4).
pub fn build_token_payload(seller_identifier: &str, purchaser_identifier: &str, signature_hex: &str, key_hex: &str) -> String {
    format!("{seller_identifier}.{purchaser_identifier}.{signature_hex}.{key_hex}")
}

/// `hex(LZ-string compress of UTF-8 payload)` (§4.1 step 5). LZ-string's
/// JS implementation operates on UTF-16 code units; we mirror that by
/// compressing to a `u16` stream and serializing it big-endian before
/// hex-encoding, which is what makes this bit-exact with a JS decoder.
pub fn encode_blockchain_identifier(payload: &str) -> String {
    let compressed: Vec<u16> = lz_str::compress(payload);
    let mut bytes = Vec::with_capacity(compressed.len() * 2);
    for unit in compressed {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    hex::encode(bytes)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedIdentifier {
    pub seller_id: String,
    pub purchaser_id: String,
    pub signature: String,
    pub key: String,
    pub agent_identifier: Option<String>,
}

/// Buyer-side decode (§4.1 steps 1-5). Never panics: any malformed input
/// returns `None`.
pub fn decode_blockchain_identifier(identifier: &str) -> Option<DecodedIdentifier> {
    if identifier.is_empty() || identifier.len() % 2 != 0 {
        return None;
    }
    if !identifier.bytes().all(|b| b.is_ascii_hexdigit() && !b.is_ascii_uppercase()) {
        return None;
    }
    let bytes = hex::decode(identifier).ok()?;
    if bytes.len() % 2 != 0 {
        return None;
    }
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    let decompressed_units = lz_str::decompress(&units)?;
    let payload = String::from_utf16(&decompressed_units).ok()?;

    let fields: Vec<&str> = payload.split('.').collect();
    let [seller_id, purchaser_id, signature, key] = <[&str; 4]>::try_from(fields).ok()?;

    if !is_hex(seller_id) || !is_hex(purchaser_id) {
        return None;
    }

    let agent_identifier = if seller_id.len() > SELLER_ID_HASH_HEX_LEN {
        Some(seller_id[SELLER_ID_HASH_HEX_LEN..].to_string())
    } else {
        None
    };

    Some(DecodedIdentifier {
        seller_id: seller_id.to_string(),
        purchaser_id: purchaser_id.to_string(),
        signature: signature.to_string(),
        key: key.to_string(),
        agent_identifier,
    })
}

fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.len() % 2 == 0 && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seller_identifier_embeds_the_agent_identifier_suffix() {
        let agent = "cc".repeat(30);
        let seller_id = new_seller_identifier(&agent);
        assert_eq!(&seller_id[SELLER_ID_HASH_HEX_LEN..], agent);
        assert!(is_hex(&seller_id));
    }

    #[test]
    fn round_trips_through_compress_and_decompress() {
        let agent = "aa".repeat(30);
        let seller_id = new_seller_identifier(&agent);
        let purchaser_id = "cafebabecafebabe";
        let payload = build_token_payload(&seller_id, purchaser_id, "deadbeef", "feedface");
        let encoded = encode_blockchain_identifier(&payload);

        assert!(is_hex(&encoded));
        let decoded = decode_blockchain_identifier(&encoded).expect("round trip");
        assert_eq!(decoded.seller_id, seller_id);
        assert_eq!(decoded.purchaser_id, purchaser_id);
        assert_eq!(decoded.signature, "deadbeef");
        assert_eq!(decoded.key, "feedface");
        assert_eq!(decoded.agent_identifier.as_deref(), Some(agent.as_str()));
    }

    #[test]
    fn decode_rejects_odd_length_or_non_hex_input() {
        assert!(decode_blockchain_identifier("abc").is_none());
        assert!(decode_blockchain_identifier("zz").is_none());
        assert!(decode_blockchain_identifier("AB").is_none());
    }

    #[test]
    fn decode_rejects_payloads_without_four_fields() {
        let payload = "only.three.fields";
        let encoded = encode_blockchain_identifier(payload);
        assert!(decode_blockchain_identifier(&encoded).is_none());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn hex_string(len: usize) -> impl Strategy<Value = String> {
        proptest::collection::vec(0u8..16, len).prop_map(|digits| digits.iter().map(|d| std::char::from_digit(*d as u32, 16).unwrap()).collect())
    }

    proptest! {
        /// §8 Identifier round-trip: any well-formed token fields survive
        /// encode -> decode unchanged, and flipping a single hex character
        /// anywhere in the encoded identifier either fails to decode or
        /// decodes to a different seller/purchaser/signature/key tuple.
        #[test]
        fn encode_decode_round_trips(
            agent in hex_string(58),
            purchaser_id in hex_string(16),
            signature in hex_string(128),
            key in hex_string(90),
            flip_index in 0usize..200,
        ) {
            let seller_id = new_seller_identifier(&agent);
            let payload = build_token_payload(&seller_id, &purchaser_id, &signature, &key);
            let encoded = encode_blockchain_identifier(&payload);

            let decoded = decode_blockchain_identifier(&encoded).expect("well-formed token must decode");
            prop_assert_eq!(&decoded.seller_id, &seller_id);
            prop_assert_eq!(&decoded.purchaser_id, &purchaser_id);
            prop_assert_eq!(&decoded.signature, &signature);
            prop_assert_eq!(&decoded.key, &key);
            prop_assert_eq!(decoded.agent_identifier.as_deref(), Some(agent.as_str()));

            if flip_index < encoded.len() {
                let mut chars: Vec<char> = encoded.chars().collect();
                let original = chars[flip_index];
                let flipped = if original == '0' { '1' } else { '0' };
                chars[flip_index] = flipped;
                let tampered: String = chars.into_iter().collect();
                if tampered != encoded {
                    let tampered_decoded = decode_blockchain_identifier(&tampered);
                    let unchanged = tampered_decoded.as_ref().map(|d| (d.seller_id.as_str(), d.purchaser_id.as_str(), d.signature.as_str(), d.key.as_str()))
                        == Some((seller_id.as_str(), purchaser_id.as_str(), signature.as_str(), key.as_str()));
                    prop_assert!(!unchanged, "a single-character tamper must not decode back to the same fields");
                }
            }
        }
    }
}
