//! Error kinds shared across the orchestrator.
//!
//! Spec reference: §7 Error Handling Design. Every failure an API-facing
//! operation can produce is one of these kinds; handlers map them to
//! `{statusCode, message}` (see `escrow-api`).

use thiserror::Error;

/// The closed set of ways an orchestrator operation can fail.
///
/// Kinds, not type hierarchies: callers match on `ErrorKind`, never on a
/// concrete Rust type per failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    InvalidArgument,
    Unauthenticated,
    Forbidden,
    NotFound,
    AlreadyExists,
    PreconditionFailed,
    Conflict,
    Unsupported,
    Timeout,
    ChainAdapterUnavailable,
    SignatureInvalid,
    Internal,
}

impl ErrorKind {
    /// Conventional HTTP status used by `escrow-api` when surfacing this
    /// kind. Kept here so every caller agrees on the mapping.
    pub fn http_status(self) -> u16 {
        match self {
            ErrorKind::InvalidArgument => 400,
            ErrorKind::Unauthenticated => 401,
            ErrorKind::Forbidden => 403,
            ErrorKind::NotFound => 404,
            ErrorKind::AlreadyExists => 409,
            ErrorKind::Conflict => 409,
            ErrorKind::PreconditionFailed => 412,
            ErrorKind::Unsupported => 422,
            ErrorKind::Timeout => 504,
            ErrorKind::ChainAdapterUnavailable => 503,
            ErrorKind::SignatureInvalid => 400,
            ErrorKind::Internal => 500,
        }
    }
}

/// A domain error carrying a human-readable message and, for the
/// idempotent-create case, the conflicting entity id so a caller can look
/// it up again.
#[derive(Debug, Error)]
#[error("{kind:?}: {message}")]
pub struct OrchestratorError {
    pub kind: ErrorKind,
    pub message: String,
    /// Set only for `AlreadyExists` on CreatePurchase (§4.3, §7): the id of
    /// the pre-existing row so the handler can return it verbatim.
    pub existing_id: Option<uuid::Uuid>,
}

impl OrchestratorError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            existing_id: None,
        }
    }

    pub fn with_existing(kind: ErrorKind, message: impl Into<String>, existing_id: uuid::Uuid) -> Self {
        Self {
            kind,
            message: message.into(),
            existing_id: Some(existing_id),
        }
    }

    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidArgument, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::PreconditionFailed, message)
    }

    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Unsupported, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }
}
