//! The four guarded NextAction transitions of §4.3: AuthorizePaymentRefund,
//! SubmitPaymentResult (Payment side), RequestPurchaseRefund,
//! CancelPurchaseRefundRequest (Purchase side).
//!
//! All four share the same shape the spec gives for its one worked
//! example (AuthorizePaymentRefund): a precondition on the current
//! `NextAction`/`OnChainState`/`CurrentTransaction`/caller, then an
//! update to `NextAction` and its change-timestamp. Archiving the
//! superseded `NextAction` into an `ActionHistory` table is future
//! work — the `Store` contract has no method for it yet, and this
//! crate never invents a write path the store can't durably perform.

use crate::caller::CallerContext;
use crate::deps::OrchestratorDeps;
use escrow_core::error::OrchestratorError;
use escrow_core::model::{Payment, Purchase};
use escrow_core::state::{OnChainState, PaymentNextAction, PurchaseNextAction};
use uuid::Uuid;

fn require_owner(caller: &CallerContext, owner_id: Uuid) -> Result<(), OrchestratorError> {
    if caller.owns_or_admin(owner_id) {
        Ok(())
    } else {
        Err(OrchestratorError::new(
            escrow_core::error::ErrorKind::Forbidden,
            "caller does not own this entity",
        ))
    }
}

/// §4.3 worked example: `NextAction=WaitingForExternalAction ∧
/// onChainState ∈ {Disputed, RefundRequested} ∧ CurrentTransaction ≠
/// null ∧ caller owns entity OR Admin` → `AuthorizeRefundRequested`.
pub async fn authorize_payment_refund(
    deps: &OrchestratorDeps,
    payment_id: Uuid,
    caller: &CallerContext,
) -> Result<Payment, OrchestratorError> {
    let mut payment = deps
        .store
        .find_payment_by_id(payment_id)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| OrchestratorError::not_found("payment not found"))?;

    require_owner(caller, payment.requested_by_id)?;

    if payment.next_action != PaymentNextAction::WaitingForExternalAction {
        return Err(OrchestratorError::precondition_failed("payment is not waiting for an external action"));
    }
    if !matches!(payment.on_chain_state, Some(OnChainState::Disputed) | Some(OnChainState::RefundRequested)) {
        return Err(OrchestratorError::precondition_failed(
            "payment's onChainState must be Disputed or RefundRequested to authorize a refund",
        ));
    }
    if payment.current_transaction_id.is_none() {
        return Err(OrchestratorError::precondition_failed("payment has no CurrentTransaction"));
    }

    let now = deps.now();
    payment.next_action = PaymentNextAction::AuthorizeRefundRequested;
    payment.next_action_error_type = None;
    payment.next_action_error_note = None;
    payment.bump_next_action_timestamp(now);

    deps.store.save_payment(&payment).await.map_err(crate::store_error::internal)?;
    Ok(payment)
}

/// Seller hash-commits a result while funds are still locked:
/// `NextAction=WaitingForExternalAction ∧ onChainState=FundsLocked ∧
/// CurrentTransaction ≠ null ∧ caller owns entity OR Admin` →
/// `SubmitResultRequested`, with `resultHash` recorded.
pub async fn submit_payment_result(
    deps: &OrchestratorDeps,
    payment_id: Uuid,
    result_hash: String,
    caller: &CallerContext,
) -> Result<Payment, OrchestratorError> {
    let mut payment = deps
        .store
        .find_payment_by_id(payment_id)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| OrchestratorError::not_found("payment not found"))?;

    require_owner(caller, payment.requested_by_id)?;

    if payment.next_action != PaymentNextAction::WaitingForExternalAction {
        return Err(OrchestratorError::precondition_failed("payment is not waiting for an external action"));
    }
    if payment.on_chain_state != Some(OnChainState::FundsLocked) {
        return Err(OrchestratorError::precondition_failed("payment's onChainState must be FundsLocked to submit a result"));
    }
    if payment.current_transaction_id.is_none() {
        return Err(OrchestratorError::precondition_failed("payment has no CurrentTransaction"));
    }
    if result_hash.len() != 64 || !result_hash.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(OrchestratorError::invalid_argument("resultHash must be 64 hex characters"));
    }

    let now = deps.now();
    payment.result_hash = result_hash;
    payment.next_action = PaymentNextAction::SubmitResultRequested;
    payment.next_action_error_type = None;
    payment.next_action_error_note = None;
    payment.bump_next_action_timestamp(now);

    deps.store.save_payment(&payment).await.map_err(crate::store_error::internal)?;
    Ok(payment)
}

/// Buyer requests a refund while funds are locked:
/// `NextAction=WaitingForExternalAction ∧ onChainState=FundsLocked ∧
/// CurrentTransaction ≠ null ∧ caller owns entity OR Admin` →
/// `SetRefundRequestedRequested`.
pub async fn request_purchase_refund(
    deps: &OrchestratorDeps,
    purchase_id: Uuid,
    caller: &CallerContext,
) -> Result<Purchase, OrchestratorError> {
    let mut purchase = deps
        .store
        .find_purchase_by_id(purchase_id)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| OrchestratorError::not_found("purchase not found"))?;

    require_owner(caller, purchase.requested_by_id)?;

    if purchase.next_action != PurchaseNextAction::WaitingForExternalAction {
        return Err(OrchestratorError::precondition_failed("purchase is not waiting for an external action"));
    }
    if purchase.on_chain_state != Some(OnChainState::FundsLocked) {
        return Err(OrchestratorError::precondition_failed("purchase's onChainState must be FundsLocked to request a refund"));
    }
    if purchase.current_transaction_id.is_none() {
        return Err(OrchestratorError::precondition_failed("purchase has no CurrentTransaction"));
    }

    let now = deps.now();
    purchase.next_action = PurchaseNextAction::SetRefundRequestedRequested;
    purchase.next_action_error_type = None;
    purchase.next_action_error_note = None;
    purchase.bump_next_action_timestamp(now);

    deps.store.save_purchase(&purchase).await.map_err(crate::store_error::internal)?;
    Ok(purchase)
}

/// Buyer withdraws a pending refund request before the seller disputes
/// it: `NextAction=WaitingForExternalAction ∧ onChainState=RefundRequested
/// ∧ CurrentTransaction ≠ null ∧ caller owns entity OR Admin` →
/// `UnSetRefundRequestedRequested`.
pub async fn cancel_purchase_refund_request(
    deps: &OrchestratorDeps,
    purchase_id: Uuid,
    caller: &CallerContext,
) -> Result<Purchase, OrchestratorError> {
    let mut purchase = deps
        .store
        .find_purchase_by_id(purchase_id)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| OrchestratorError::not_found("purchase not found"))?;

    require_owner(caller, purchase.requested_by_id)?;

    if purchase.next_action != PurchaseNextAction::WaitingForExternalAction {
        return Err(OrchestratorError::precondition_failed("purchase is not waiting for an external action"));
    }
    if purchase.on_chain_state != Some(OnChainState::RefundRequested) {
        return Err(OrchestratorError::precondition_failed(
            "purchase's onChainState must be RefundRequested to cancel the refund request",
        ));
    }
    if purchase.current_transaction_id.is_none() {
        return Err(OrchestratorError::precondition_failed("purchase has no CurrentTransaction"));
    }

    let now = deps.now();
    purchase.next_action = PurchaseNextAction::UnSetRefundRequestedRequested;
    purchase.next_action_error_type = None;
    purchase.next_action_error_note = None;
    purchase.bump_next_action_timestamp(now);

    deps.store.save_purchase(&purchase).await.map_err(crate::store_error::internal)?;
    Ok(purchase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::caller::Role;
    use escrow_chain::mock::{MockChainAdapter, MockSigner};
    use escrow_core::time::SystemClock;
    use escrow_store::InMemoryStore;
    use std::sync::Arc;

    fn deps() -> OrchestratorDeps {
        OrchestratorDeps::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockChainAdapter::new()),
            Arc::new(MockSigner::new()),
            Arc::new(SystemClock),
        )
    }

    fn admin() -> CallerContext {
        CallerContext { requester_id: Uuid::new_v4(), role: Role::Admin }
    }

    #[tokio::test]
    async fn authorize_refund_rejects_payment_in_wrong_state() {
        let deps = deps();
        let err = authorize_payment_refund(&deps, Uuid::new_v4(), &admin()).await.unwrap_err();
        assert_eq!(err.kind, escrow_core::error::ErrorKind::NotFound);
    }
}
