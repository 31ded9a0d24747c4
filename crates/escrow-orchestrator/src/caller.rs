//! The caller context every orchestrator operation is invoked with.
//!
//! Spec reference: §1 — authentication, API-key storage, and credit
//! metering live outside this crate; §5 — "the HTTP layer never decides
//! authorization, it only plumbs the value through". `escrow-api`'s auth
//! layer builds one of these per request from the validated API key and
//! passes it down; this crate only ever reads it.

use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Standard,
    Admin,
}

#[derive(Debug, Clone)]
pub struct CallerContext {
    pub requester_id: Uuid,
    pub role: Role,
}

impl CallerContext {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }

    /// §4.3 refund/result guard shape: "caller owns entity OR Admin".
    pub fn owns_or_admin(&self, owner_id: Uuid) -> bool {
        self.is_admin() || self.requester_id == owner_id
    }
}
