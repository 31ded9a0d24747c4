//! The blockchain-identifier codec (§4.1): canonical JSON, the preimage
//! object, COSE key decoding, the seller-side encode / buyer-side decode
//! pipeline, and buyer-side verification.

pub mod codec;
pub mod cose;
pub mod jcs;
pub mod preimage;
pub mod verify;

pub use codec::{build_token_payload, decode_blockchain_identifier, encode_blockchain_identifier, new_seller_identifier, DecodedIdentifier};
pub use preimage::Preimage;
pub use verify::{verify_blockchain_identifier, VerifyError, VerifyInput};
