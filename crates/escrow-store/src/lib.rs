//! Postgres-backed persistence for payments, purchases, registry
//! requests, payment sources, and hot wallets, plus the cursor mechanics
//! behind the Diff Feed (§4.6) and the Chain Reconciler's batch cursor
//! (§4.4).

pub mod cursor;
pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cursor::{DiffCursor, DiffMode, DiffPage};
pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use postgres::PgStore;
pub use store::{ListFilter, ReconcilerCursor, ReconcilerCursorKind, Store};
