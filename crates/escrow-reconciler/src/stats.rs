//! The operator-facing snapshot §4.4 step 6 asks for: "Expose `stats =
//! {trackedEntities, purchaseCursor, paymentCursor, memoryUsage}`".
//!
//! `escrow-cli`'s `/monitoring` equivalent and `escrow-api`'s
//! `GET /monitoring` route both read this through `Reconciler::stats()`.

use escrow_store::ReconcilerCursor;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceCursors {
    pub payment_source_id: uuid::Uuid,
    pub payment_cursor: Option<ReconcilerCursor>,
    pub purchase_cursor: Option<ReconcilerCursor>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcilerStats {
    /// Total payments + purchases advanced across every tracked source
    /// since process start.
    pub tracked_entities: u64,
    pub cursors: Vec<SourceCursors>,
    /// A coarse proxy for in-process working-set size: the count of rows
    /// touched in the most recently completed batch. The Reconciler holds
    /// no long-lived cache of its own — each cycle reads fresh from the
    /// `Store` — so there is no heap structure to size precisely.
    pub memory_usage: usize,
}
