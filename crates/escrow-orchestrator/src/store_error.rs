//! Translates `escrow_store::StoreError` into the API-facing
//! `OrchestratorError` kinds (§7) at the point where this crate knows
//! the business context a bare "row not found" or "constraint
//! violated" doesn't carry on its own.

use escrow_core::error::OrchestratorError;
use escrow_store::StoreError;

pub fn internal(err: StoreError) -> OrchestratorError {
    OrchestratorError::internal(format!("store error: {err}"))
}

pub fn not_found(err: StoreError, what: &str) -> OrchestratorError {
    match err {
        StoreError::NotFound => OrchestratorError::not_found(format!("{what} not found")),
        other => internal(other),
    }
}
