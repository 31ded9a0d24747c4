//! An in-memory `Store` implementation for tests.
//!
//! `escrow-orchestrator`, `escrow-reconciler`, `escrow-dispatcher`, and
//! `escrow-registry` all test against this instead of a live Postgres
//! instance — the same reasoning as `escrow-chain::mock`: a hand-rolled
//! fake that implements the real contract beats a mocking framework.

use crate::cursor::{DiffCursor, DiffMode, DiffPage};
use crate::error::{Result, StoreError};
use crate::store::{ListFilter, ReconcilerCursor, ReconcilerCursorKind, Store};
use async_trait::async_trait;
use escrow_core::model::{HotWallet, Network, Payment, PaymentSource, Purchase, RegistryRequest};
use escrow_core::time::TimestampMs;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    payment_sources: HashMap<Uuid, PaymentSource>,
    hot_wallets: HashMap<Uuid, HotWallet>,
    payments: HashMap<Uuid, Payment>,
    payment_leases: HashMap<Uuid, TimestampMs>,
    purchases: HashMap<Uuid, Purchase>,
    purchase_leases: HashMap<Uuid, TimestampMs>,
    registry_requests: HashMap<Uuid, RegistryRequest>,
    registry_leases: HashMap<Uuid, TimestampMs>,
    reconciler_cursors: HashMap<(Uuid, ReconcilerCursorKind), ReconcilerCursor>,
}

#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seed_payment_source(&self, source: PaymentSource) {
        self.inner.lock().unwrap().payment_sources.insert(source.id, source);
    }

    pub fn seed_hot_wallet(&self, wallet: HotWallet) {
        self.inner.lock().unwrap().hot_wallets.insert(wallet.id, wallet);
    }
}

fn is_requested_payment_action(action: escrow_core::state::PaymentNextAction) -> bool {
    action.is_requested()
}

fn is_requested_purchase_action(action: escrow_core::state::PurchaseNextAction) -> bool {
    action.is_requested()
}

fn is_requested_registration_state(state: escrow_core::state::RegistrationState) -> bool {
    use escrow_core::state::RegistrationState::*;
    matches!(state, RegistrationRequested | DeregistrationRequested)
}

#[async_trait]
impl Store for InMemoryStore {
    async fn get_payment_source(&self, network: Network, smart_contract_address: &str) -> Result<Option<PaymentSource>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .payment_sources
            .values()
            .find(|p| p.network == network && p.smart_contract_address == smart_contract_address && !p.is_deleted())
            .cloned())
    }

    async fn get_payment_source_by_id(&self, id: Uuid) -> Result<Option<PaymentSource>> {
        Ok(self.inner.lock().unwrap().payment_sources.get(&id).cloned())
    }

    async fn list_active_payment_sources(&self) -> Result<Vec<PaymentSource>> {
        Ok(self.inner.lock().unwrap().payment_sources.values().filter(|p| !p.is_deleted()).cloned().collect())
    }

    async fn get_payment_source_by_policy(&self, network: Network, policy_id: &str) -> Result<Option<PaymentSource>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .payment_sources
            .values()
            .find(|p| p.network == network && p.policy_id.as_deref() == Some(policy_id) && !p.is_deleted())
            .cloned())
    }

    async fn get_hot_wallet(&self, id: Uuid) -> Result<Option<HotWallet>> {
        Ok(self.inner.lock().unwrap().hot_wallets.get(&id).cloned())
    }

    async fn find_hot_wallet_by_address(&self, payment_source_id: Uuid, wallet_address: &str) -> Result<Option<HotWallet>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .hot_wallets
            .values()
            .find(|w| w.payment_source_id == payment_source_id && w.wallet_address == wallet_address && w.deleted_at.is_none())
            .cloned())
    }

    async fn find_purchasing_hot_wallet(&self, payment_source_id: Uuid) -> Result<Option<HotWallet>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner
            .hot_wallets
            .values()
            .find(|w| {
                w.payment_source_id == payment_source_id
                    && w.wallet_type == escrow_core::model::WalletType::Purchasing
                    && w.deleted_at.is_none()
            })
            .cloned())
    }

    async fn find_payment_by_id(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.inner.lock().unwrap().payments.get(&id).cloned())
    }

    async fn find_payment_by_blockchain_identifier(&self, blockchain_identifier: &str) -> Result<Option<Payment>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.payments.values().find(|p| p.blockchain_identifier == blockchain_identifier).cloned())
    }

    async fn insert_payment(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.payments.values().any(|p| p.blockchain_identifier == payment.blockchain_identifier) {
            return Err(StoreError::Conflict("blockchain_identifier already exists".into()));
        }
        inner.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn list_payments(&self, filter: &ListFilter) -> Result<Vec<Payment>> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| match filter.network {
                Some(_) => true, // Network isn't stored directly on Payment; PaymentSource join is left to callers that need it.
                None => true,
            })
            .cloned()
            .collect();
        items.sort_by_key(|p| p.id);
        let limit = filter.limit.clamp(1, 100) as usize;
        let start = filter
            .cursor_id
            .and_then(|c| items.iter().position(|p| p.id >= c))
            .unwrap_or(0);
        Ok(items.into_iter().skip(start).take(limit).collect())
    }

    async fn claim_payment_for_dispatch(&self, lease_duration_ms: i64, now: TimestampMs) -> Result<Option<Payment>> {
        let mut inner = self.inner.lock().unwrap();
        let candidate = inner
            .payments
            .values()
            .filter(|p| is_requested_payment_action(p.next_action))
            .filter(|p| inner.payment_leases.get(&p.id).copied().unwrap_or(TimestampMs::MIN) < now)
            .min_by_key(|p| p.next_action_last_changed_at)
            .cloned();
        if let Some(p) = &candidate {
            inner.payment_leases.insert(p.id, now + lease_duration_ms);
        }
        Ok(candidate)
    }

    async fn save_payment(&self, payment: &Payment) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.payment_leases.remove(&payment.id);
        inner.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn diff_payments(&self, mode: DiffMode, cursor: DiffCursor, limit: u32) -> Result<DiffPage<Payment>> {
        let inner = self.inner.lock().unwrap();
        let ts = |p: &Payment| match mode {
            DiffMode::NextAction => p.next_action_last_changed_at,
            DiffMode::OnChainStateOrResult => p.on_chain_state_or_result_last_changed_at,
            DiffMode::Either => p.next_action_or_on_chain_state_or_result_last_changed_at,
        };
        let mut items: Vec<Payment> = inner
            .payments
            .values()
            .filter(|p| ts(p) > cursor.since || (ts(p) == cursor.since && p.id >= cursor.cursor_id))
            .cloned()
            .collect();
        items.sort_by_key(|p| (ts(p), p.id));
        items.truncate(limit.clamp(1, 500) as usize);
        let next_cursor = items.last().map(|p| DiffCursor::after(ts(p), p.id));
        Ok(DiffPage { items, next_cursor })
    }

    async fn find_purchase_by_id(&self, id: Uuid) -> Result<Option<Purchase>> {
        Ok(self.inner.lock().unwrap().purchases.get(&id).cloned())
    }

    async fn find_purchase_by_blockchain_identifier(&self, blockchain_identifier: &str) -> Result<Option<Purchase>> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.purchases.values().find(|p| p.blockchain_identifier == blockchain_identifier).cloned())
    }

    async fn insert_purchase(&self, purchase: &Purchase) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn list_purchases(&self, filter: &ListFilter) -> Result<Vec<Purchase>> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<Purchase> = inner.purchases.values().cloned().collect();
        items.sort_by_key(|p| p.id);
        let limit = filter.limit.clamp(1, 100) as usize;
        let start = filter
            .cursor_id
            .and_then(|c| items.iter().position(|p| p.id >= c))
            .unwrap_or(0);
        Ok(items.into_iter().skip(start).take(limit).collect())
    }

    async fn claim_purchase_for_dispatch(&self, lease_duration_ms: i64, now: TimestampMs) -> Result<Option<Purchase>> {
        let mut inner = self.inner.lock().unwrap();
        let candidate = inner
            .purchases
            .values()
            .filter(|p| is_requested_purchase_action(p.next_action))
            .filter(|p| inner.purchase_leases.get(&p.id).copied().unwrap_or(TimestampMs::MIN) < now)
            .min_by_key(|p| p.next_action_last_changed_at)
            .cloned();
        if let Some(p) = &candidate {
            inner.purchase_leases.insert(p.id, now + lease_duration_ms);
        }
        Ok(candidate)
    }

    async fn save_purchase(&self, purchase: &Purchase) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.purchase_leases.remove(&purchase.id);
        inner.purchases.insert(purchase.id, purchase.clone());
        Ok(())
    }

    async fn diff_purchases(&self, mode: DiffMode, cursor: DiffCursor, limit: u32) -> Result<DiffPage<Purchase>> {
        let inner = self.inner.lock().unwrap();
        let ts = |p: &Purchase| match mode {
            DiffMode::NextAction => p.next_action_last_changed_at,
            DiffMode::OnChainStateOrResult => p.on_chain_state_or_result_last_changed_at,
            DiffMode::Either => p.next_action_or_on_chain_state_or_result_last_changed_at,
        };
        let mut items: Vec<Purchase> = inner
            .purchases
            .values()
            .filter(|p| ts(p) > cursor.since || (ts(p) == cursor.since && p.id >= cursor.cursor_id))
            .cloned()
            .collect();
        items.sort_by_key(|p| (ts(p), p.id));
        items.truncate(limit.clamp(1, 500) as usize);
        let next_cursor = items.last().map(|p| DiffCursor::after(ts(p), p.id));
        Ok(DiffPage { items, next_cursor })
    }

    async fn find_registry_request_by_id(&self, id: Uuid) -> Result<Option<RegistryRequest>> {
        Ok(self.inner.lock().unwrap().registry_requests.get(&id).cloned())
    }

    async fn insert_registry_request(&self, request: &RegistryRequest) -> Result<()> {
        self.inner.lock().unwrap().registry_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn claim_registry_request_for_dispatch(&self, lease_duration_ms: i64, now: TimestampMs) -> Result<Option<RegistryRequest>> {
        let mut inner = self.inner.lock().unwrap();
        let candidate = inner
            .registry_requests
            .values()
            .filter(|r| is_requested_registration_state(r.state))
            .filter(|r| inner.registry_leases.get(&r.id).copied().unwrap_or(TimestampMs::MIN) < now)
            .min_by_key(|r| r.next_action_last_changed_at)
            .cloned();
        if let Some(r) = &candidate {
            inner.registry_leases.insert(r.id, now + lease_duration_ms);
        }
        Ok(candidate)
    }

    async fn save_registry_request(&self, request: &RegistryRequest) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        inner.registry_leases.remove(&request.id);
        inner.registry_requests.insert(request.id, request.clone());
        Ok(())
    }

    async fn delete_registry_request(&self, id: Uuid) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(r) = inner.registry_requests.get(&id) {
            if r.state.deletable() {
                inner.registry_requests.remove(&id);
            }
        }
        Ok(())
    }

    async fn diff_registry_requests(&self, cursor: DiffCursor, limit: u32) -> Result<DiffPage<RegistryRequest>> {
        let inner = self.inner.lock().unwrap();
        let mut items: Vec<RegistryRequest> = inner
            .registry_requests
            .values()
            .filter(|r| {
                r.next_action_last_changed_at > cursor.since
                    || (r.next_action_last_changed_at == cursor.since && r.id >= cursor.cursor_id)
            })
            .cloned()
            .collect();
        items.sort_by_key(|r| (r.next_action_last_changed_at, r.id));
        items.truncate(limit.clamp(1, 500) as usize);
        let next_cursor = items.last().map(|r| DiffCursor::after(r.next_action_last_changed_at, r.id));
        Ok(DiffPage { items, next_cursor })
    }

    async fn get_reconciler_cursor(&self, payment_source_id: Uuid, kind: ReconcilerCursorKind) -> Result<Option<ReconcilerCursor>> {
        Ok(self.inner.lock().unwrap().reconciler_cursors.get(&(payment_source_id, kind)).copied())
    }

    async fn advance_reconciler_cursor(&self, payment_source_id: Uuid, kind: ReconcilerCursorKind, cursor: ReconcilerCursor) -> Result<()> {
        self.inner.lock().unwrap().reconciler_cursors.insert((payment_source_id, kind), cursor);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_core::state::PaymentNextAction;

    fn sample_payment(id: Uuid, blockchain_identifier: &str) -> Payment {
        Payment {
            id,
            blockchain_identifier: blockchain_identifier.into(),
            agent_identifier: "a".repeat(60),
            input_hash: "a".repeat(64),
            pay_by_time: 0,
            submit_result_time: 0,
            unlock_time: 0,
            external_dispute_unlock_time: 0,
            requested_funds: escrow_core::money::RequestedFunds::new(vec![escrow_core::money::UnitValue::lovelace(1)]).unwrap(),
            on_chain_state: None,
            next_action: PaymentNextAction::AuthorizeRefundRequested,
            next_action_error_type: None,
            next_action_error_note: None,
            current_transaction_id: None,
            transaction_history: vec![],
            withdrawn_for_seller: vec![],
            withdrawn_for_buyer: vec![],
            total_seller_cardano_fees: escrow_core::money::Lovelace::zero(),
            total_buyer_cardano_fees: escrow_core::money::Lovelace::zero(),
            result_hash: String::new(),
            created_at: 0,
            updated_at: 0,
            next_action_last_changed_at: 0,
            on_chain_state_or_result_last_changed_at: 0,
            next_action_or_on_chain_state_or_result_last_changed_at: 0,
            requested_by_id: Uuid::nil(),
            metadata: None,
            payment_source_id: Uuid::nil(),
            seller_wallet_id: Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn claim_is_exclusive_until_lease_expires() {
        let store = InMemoryStore::new();
        let payment = sample_payment(Uuid::new_v4(), "ident-1");
        store.insert_payment(&payment).await.unwrap();

        let claimed = store.claim_payment_for_dispatch(1_000, 0).await.unwrap();
        assert!(claimed.is_some());
        let second = store.claim_payment_for_dispatch(1_000, 100).await.unwrap();
        assert!(second.is_none(), "second worker must not see a live lease");

        let third = store.claim_payment_for_dispatch(1_000, 2_000).await.unwrap();
        assert!(third.is_some(), "lease must age out");
    }

    #[tokio::test]
    async fn insert_rejects_duplicate_blockchain_identifier() {
        let store = InMemoryStore::new();
        let a = sample_payment(Uuid::new_v4(), "dup");
        let b = sample_payment(Uuid::new_v4(), "dup");
        store.insert_payment(&a).await.unwrap();
        let err = store.insert_payment(&b).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }
}
