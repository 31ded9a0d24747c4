//! Store-level errors.
//!
//! Kept separate from `escrow_core::ErrorKind` because the store speaks
//! in terms of rows and constraints, not API-facing failure kinds;
//! callers in `escrow-orchestrator` translate a `StoreError` into an
//! `OrchestratorError` at the point where they know the business context.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("row not found")]
    NotFound,
    #[error("unique constraint violated: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
