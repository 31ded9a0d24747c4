//! The failure shape every `ChainAdapter` call surfaces.
//!
//! Spec reference: §7 — "ChainAdapter 4xx on unknown asset → `NotFound`;
//! ChainAdapter network errors → `ChainAdapterUnavailable`; all others →
//! `Internal`." §4.5's dispatcher additionally classifies submit
//! failures into `NetworkError`/`ValidationError`/`InsufficientFunds`/
//! `Unknown` (`escrow_core::ErrorType`); `ChainError` carries enough
//! detail for callers on either side to make that call without a second
//! round-trip.

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChainError {
    #[error("asset or transaction not found on chain: {0}")]
    NotFound(String),
    #[error("chain adapter unreachable: {0}")]
    Unavailable(String),
    #[error("submitted transaction was rejected: {0}")]
    Validation(String),
    #[error("wallet has insufficient funds to submit: {0}")]
    InsufficientFunds(String),
    #[error("chain adapter call timed out")]
    Timeout,
    #[error("unclassified chain adapter failure: {0}")]
    Unknown(String),
}

impl ChainError {
    /// §4.5's submit-failure classification, reused by the dispatcher to
    /// decide retry-with-backoff vs. `WaitingForManualAction`.
    pub fn to_error_type(&self) -> escrow_core::state::ErrorType {
        use escrow_core::state::ErrorType;
        match self {
            ChainError::Unavailable(_) | ChainError::Timeout => ErrorType::NetworkError,
            ChainError::Validation(_) => ErrorType::ValidationError,
            ChainError::InsufficientFunds(_) => ErrorType::InsufficientFunds,
            ChainError::NotFound(_) | ChainError::Unknown(_) => ErrorType::Unknown,
        }
    }
}
