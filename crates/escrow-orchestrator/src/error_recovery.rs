//! `ErrorStateRecovery` (§4.3): manual recovery from `WaitingForManualAction`.
//!
//! Rewinds `CurrentTransaction` to the best-known-good predecessor and
//! fails out every `Pending` transaction submitted after it, so the
//! Dispatcher gets a clean slate to retry from.

use crate::deps::OrchestratorDeps;
use escrow_core::error::OrchestratorError;
use escrow_core::model::{Payment, Purchase, Transaction, TransactionStatus};
use escrow_core::state::{PaymentNextAction, PurchaseNextAction};
use escrow_store::Store;
use uuid::Uuid;

/// Step 1-3 of §4.3's ErrorStateRecovery, shared by both entity kinds:
/// picks the most-recent `Confirmed` transaction, falling back to the
/// most-recent `Pending` one, fails every `Pending` transaction newer
/// than it, and returns the id the caller should set as
/// `currentTransactionId` (`None` if no predecessor exists).
fn rewind_transaction_history(history: &mut [Transaction]) -> Option<Uuid> {
    let predecessor = history
        .iter()
        .filter(|t| t.status == TransactionStatus::Confirmed)
        .max_by_key(|t| t.created_at)
        .or_else(|| history.iter().filter(|t| t.status == TransactionStatus::Pending).max_by_key(|t| t.created_at))
        .map(|t| (t.id, t.created_at));

    let predecessor_id = predecessor.map(|(id, _)| id);
    let predecessor_created_at = predecessor.map(|(_, ts)| ts);

    for tx in history.iter_mut() {
        if tx.status != TransactionStatus::Pending || Some(tx.id) == predecessor_id {
            continue;
        }
        let is_newer = predecessor_created_at.map_or(true, |p_ts| tx.created_at > p_ts);
        if is_newer {
            tx.status = TransactionStatus::FailedViaManualReset;
        }
    }

    predecessor_id
}

pub async fn payment_error_state_recovery(deps: &OrchestratorDeps, payment_id: Uuid) -> Result<Payment, OrchestratorError> {
    let mut payment = deps
        .store
        .find_payment_by_id(payment_id)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| OrchestratorError::not_found("payment not found"))?;

    if payment.next_action != PaymentNextAction::WaitingForManualAction || payment.next_action_error_type.is_none() {
        return Err(OrchestratorError::precondition_failed(
            "payment is not in WaitingForManualAction with a recorded errorType",
        ));
    }

    let now = deps.now();
    let predecessor_id = rewind_transaction_history(&mut payment.transaction_history);
    payment.current_transaction_id = predecessor_id;
    payment.next_action = if payment.on_chain_state.is_some_and(|s| s.is_terminal()) {
        PaymentNextAction::None
    } else {
        PaymentNextAction::WaitingForExternalAction
    };
    payment.next_action_error_type = None;
    payment.next_action_error_note = None;
    payment.bump_next_action_timestamp(now);

    deps.store.save_payment(&payment).await.map_err(crate::store_error::internal)?;
    Ok(payment)
}

pub async fn purchase_error_state_recovery(deps: &OrchestratorDeps, purchase_id: Uuid) -> Result<Purchase, OrchestratorError> {
    let mut purchase = deps
        .store
        .find_purchase_by_id(purchase_id)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| OrchestratorError::not_found("purchase not found"))?;

    if purchase.next_action != PurchaseNextAction::WaitingForManualAction || purchase.next_action_error_type.is_none() {
        return Err(OrchestratorError::precondition_failed(
            "purchase is not in WaitingForManualAction with a recorded errorType",
        ));
    }

    let now = deps.now();
    let predecessor_id = rewind_transaction_history(&mut purchase.transaction_history);
    purchase.current_transaction_id = predecessor_id;
    purchase.next_action = if purchase.on_chain_state.is_some_and(|s| s.is_terminal()) {
        PurchaseNextAction::None
    } else {
        PurchaseNextAction::WaitingForExternalAction
    };
    purchase.next_action_error_type = None;
    purchase.next_action_error_note = None;
    purchase.bump_next_action_timestamp(now);

    deps.store.save_purchase(&purchase).await.map_err(crate::store_error::internal)?;
    Ok(purchase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tx(id: u8, status: TransactionStatus, created_at: i64) -> Transaction {
        Transaction {
            id: Uuid::from_u128(id as u128),
            tx_hash: format!("tx{id}"),
            status,
            fees: escrow_core::money::Lovelace::zero(),
            block_height: None,
            block_time: None,
            previous_on_chain_state: None,
            new_on_chain_state: None,
            confirmations: 0,
            collateral_return_lovelace: None,
            created_at,
        }
    }

    #[test]
    fn scenario_4_fails_pending_transactions_newer_than_the_confirmed_predecessor() {
        let mut history = vec![
            tx(1, TransactionStatus::Confirmed, 10_000),
            tx(2, TransactionStatus::Pending, 20_000),
            tx(3, TransactionStatus::Pending, 30_000),
        ];
        let predecessor = rewind_transaction_history(&mut history);
        assert_eq!(predecessor, Some(Uuid::from_u128(1)));
        assert_eq!(history[0].status, TransactionStatus::Confirmed);
        assert_eq!(history[1].status, TransactionStatus::FailedViaManualReset);
        assert_eq!(history[2].status, TransactionStatus::FailedViaManualReset);
    }

    #[test]
    fn falls_back_to_most_recent_pending_when_nothing_is_confirmed() {
        let mut history = vec![tx(1, TransactionStatus::Pending, 10_000), tx(2, TransactionStatus::Pending, 20_000)];
        let predecessor = rewind_transaction_history(&mut history);
        assert_eq!(predecessor, Some(Uuid::from_u128(2)));
        assert_eq!(history[1].status, TransactionStatus::Pending);
    }

    #[test]
    fn no_transactions_yields_no_predecessor() {
        let mut history: Vec<Transaction> = vec![];
        assert_eq!(rewind_transaction_history(&mut history), None);
    }
}
