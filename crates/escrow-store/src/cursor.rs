//! Diff Feed cursor mechanics (§4.6).
//!
//! Three independently-cursored views exist for payments, purchases, and
//! registrations alike: `NextAction`, `OnChainStateOrResult`, and their
//! coarser disjunction. All three share the same pagination shape —
//! `(lastUpdate, cursorId)` — and the same tie-break rule, so the type
//! lives once here instead of being duplicated per entity.

use escrow_core::time::TimestampMs;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Which of an entity's three monotone timestamps a diff page is
/// cursoring over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DiffMode {
    NextAction,
    OnChainStateOrResult,
    Either,
}

/// Resume point for a diff feed page: "give me everything that changed
/// at or after `since`, breaking ties by id so a page boundary that
/// lands mid-timestamp never drops or repeats a row across replays."
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffCursor {
    pub since: TimestampMs,
    pub cursor_id: Uuid,
}

impl DiffCursor {
    pub fn start() -> Self {
        Self {
            since: TimestampMs::MIN,
            cursor_id: Uuid::nil(),
        }
    }

    /// The cursor to resume from after consuming a page: the last row's
    /// own `(timestamp, id)`, per §4.6's guarantee that replaying from it
    /// resumes exactly-once.
    pub fn after(last_timestamp: TimestampMs, last_id: Uuid) -> Self {
        Self {
            since: last_timestamp,
            cursor_id: last_id,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<DiffCursor>,
}
