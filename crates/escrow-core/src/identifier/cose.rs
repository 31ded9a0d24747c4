//! Minimal COSE_Key (RFC 8152 §7) decoding for the Ed25519 public key
//! embedded in a `blockchainIdentifier`'s `key` field.
//!
//! Spec reference: §4.1 — "COSE-key→vkey mismatch" is one of the buyer's
//! verification failure modes. We only need to pull the raw Ed25519
//! public key (`x`, label `-2`) out of the CBOR map; every other COSE_Key
//! label is ignored.

use ciborium::value::Value as Cbor;
use ed25519_dalek::{Signature, VerifyingKey, SIGNATURE_LENGTH};

const LABEL_KTY: i64 = 1;
const LABEL_CRV: i64 = -1;
const LABEL_X: i64 = -2;
const KTY_OKP: i64 = 1;
const CRV_ED25519: i64 = 6;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CoseError {
    #[error("key bytes are not a valid CBOR map")]
    NotCbor,
    #[error("COSE_Key is not an OKP/Ed25519 key")]
    WrongKeyType,
    #[error("COSE_Key is missing the `x` coordinate")]
    MissingX,
    #[error("`x` coordinate has the wrong length for an Ed25519 public key")]
    BadKeyLength,
}

/// Decode a CBOR-encoded COSE_Key map and extract its Ed25519 public key.
pub fn decode_ed25519_public_key(cose_key_bytes: &[u8]) -> Result<VerifyingKey, CoseError> {
    let value: Cbor = ciborium::de::from_reader(cose_key_bytes).map_err(|_| CoseError::NotCbor)?;
    let entries = match value {
        Cbor::Map(entries) => entries,
        _ => return Err(CoseError::NotCbor),
    };

    let mut kty = None;
    let mut crv = None;
    let mut x = None;
    for (k, v) in entries {
        let label = match k {
            Cbor::Integer(i) => i64::try_from(i).ok(),
            _ => continue,
        };
        let Some(label) = label else { continue };
        match label {
            LABEL_KTY => kty = as_i64(&v),
            LABEL_CRV => crv = as_i64(&v),
            LABEL_X => {
                if let Cbor::Bytes(b) = v {
                    x = Some(b);
                }
            }
            _ => {}
        }
    }

    if kty != Some(KTY_OKP) || crv != Some(CRV_ED25519) {
        return Err(CoseError::WrongKeyType);
    }
    let x = x.ok_or(CoseError::MissingX)?;
    let bytes: [u8; 32] = x.try_into().map_err(|_| CoseError::BadKeyLength)?;
    VerifyingKey::from_bytes(&bytes).map_err(|_| CoseError::BadKeyLength)
}

fn as_i64(v: &Cbor) -> Option<i64> {
    match v {
        Cbor::Integer(i) => i64::try_from(*i).ok(),
        _ => None,
    }
}

/// Encode an Ed25519 public key as a minimal COSE_Key CBOR map (kty=OKP,
/// crv=Ed25519, x=<raw bytes>). Counterpart to `decode_ed25519_public_key`,
/// used by `Signer` implementations (and their test doubles) to produce
/// the `key` field of a `blockchainIdentifier` (§4.1 step 3).
pub fn encode_ed25519_cose_key(public: &VerifyingKey) -> Vec<u8> {
    let map = Cbor::Map(vec![
        (Cbor::Integer(LABEL_KTY.into()), Cbor::Integer(KTY_OKP.into())),
        (Cbor::Integer(LABEL_CRV.into()), Cbor::Integer(CRV_ED25519.into())),
        (Cbor::Integer(LABEL_X.into()), Cbor::Bytes(public.to_bytes().to_vec())),
    ]);
    let mut out = Vec::new();
    ciborium::ser::into_writer(&map, &mut out).expect("COSE_Key map always serializes");
    out
}

/// Verify an Ed25519 signature over `message` using the key decoded from
/// a COSE_Key CBOR blob. Returns `false` on any malformed input rather
/// than propagating a decode error — callers fold this into the single
/// `SignatureInvalid` failure mode (§4.1).
pub fn verify(cose_key_bytes: &[u8], message: &[u8], signature_bytes: &[u8]) -> bool {
    let Ok(verifying_key) = decode_ed25519_public_key(cose_key_bytes) else {
        return false;
    };
    let sig_array: [u8; SIGNATURE_LENGTH] = match signature_bytes.try_into() {
        Ok(a) => a,
        Err(_) => return false,
    };
    let signature = Signature::from_bytes(&sig_array);
    verifying_key.verify_strict(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ciborium::value::Value as Cbor;
    use ed25519_dalek::{Signer, SigningKey};

    fn encode_cose_key(public: &VerifyingKey) -> Vec<u8> {
        let map = Cbor::Map(vec![
            (Cbor::Integer(LABEL_KTY.into()), Cbor::Integer(KTY_OKP.into())),
            (Cbor::Integer(LABEL_CRV.into()), Cbor::Integer(CRV_ED25519.into())),
            (Cbor::Integer(LABEL_X.into()), Cbor::Bytes(public.to_bytes().to_vec())),
        ]);
        let mut out = Vec::new();
        ciborium::ser::into_writer(&map, &mut out).unwrap();
        out
    }

    #[test]
    fn round_trips_a_well_formed_ed25519_cose_key() {
        let signing_key = SigningKey::from_bytes(&[7u8; 32]);
        let verifying_key = signing_key.verifying_key();
        let encoded = encode_cose_key(&verifying_key);
        let decoded = decode_ed25519_public_key(&encoded).unwrap();
        assert_eq!(decoded.to_bytes(), verifying_key.to_bytes());
    }

    #[test]
    fn verify_accepts_a_genuine_signature_and_rejects_a_tampered_message() {
        let signing_key = SigningKey::from_bytes(&[9u8; 32]);
        let verifying_key = signing_key.verifying_key();
        let encoded = encode_cose_key(&verifying_key);
        let message = b"hash-of-preimage";
        let signature = signing_key.sign(message);

        assert!(verify(&encoded, message, &signature.to_bytes()));
        assert!(!verify(&encoded, b"tampered", &signature.to_bytes()));
    }

    #[test]
    fn rejects_keys_that_are_not_cbor() {
        assert_eq!(decode_ed25519_public_key(b"not cbor"), Err(CoseError::NotCbor));
    }
}
