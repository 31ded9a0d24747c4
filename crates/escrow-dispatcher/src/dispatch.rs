//! Core dispatch step (§4.5): claim one ready entity, submit its action,
//! and fold the result back into `NextAction`/`Transaction`.

use crate::attempts::AttemptTracker;
use crate::backoff::backoff_ms;
use escrow_chain::{ChainAction, ChainAdapter, ChainError};
use escrow_core::model::{Payment, Purchase, Transaction, TransactionStatus};
use escrow_core::state::{ErrorType, PaymentNextAction, PurchaseNextAction};
use escrow_core::time::{Clock, TimestampMs};
use escrow_store::Store;
use std::sync::Arc;
use uuid::Uuid;

/// Retry count is bounded (e.g., 5); exceeding it promotes the error to
/// `WaitingForManualAction` regardless of whether the kind was transient.
pub const MAX_RETRY_COUNT: u32 = 5;

fn payment_action(payment: &Payment) -> Option<ChainAction> {
    match payment.next_action {
        PaymentNextAction::AuthorizeRefundRequested => Some(ChainAction::AuthorizeRefund {
            payment_id: payment.id,
            blockchain_identifier: payment.blockchain_identifier.clone(),
        }),
        PaymentNextAction::SubmitResultRequested => Some(ChainAction::SubmitResult {
            payment_id: payment.id,
            blockchain_identifier: payment.blockchain_identifier.clone(),
            result_hash: payment.result_hash.clone(),
        }),
        _ => None,
    }
}

fn purchase_action(purchase: &Purchase) -> Option<ChainAction> {
    match purchase.next_action {
        PurchaseNextAction::SetRefundRequestedRequested => Some(ChainAction::SetRefundRequested {
            purchase_id: purchase.id,
            blockchain_identifier: purchase.blockchain_identifier.clone(),
        }),
        PurchaseNextAction::UnSetRefundRequestedRequested => Some(ChainAction::UnsetRefundRequested {
            purchase_id: purchase.id,
            blockchain_identifier: purchase.blockchain_identifier.clone(),
        }),
        _ => None,
    }
}

fn pending_transaction(tx_hash: String, fees: escrow_core::money::Lovelace, status: TransactionStatus, now: TimestampMs) -> Transaction {
    Transaction {
        id: Uuid::new_v4(),
        tx_hash,
        status,
        fees,
        block_height: None,
        block_time: None,
        previous_on_chain_state: None,
        new_on_chain_state: None,
        confirmations: 0,
        collateral_return_lovelace: None,
        created_at: now,
    }
}

/// One dispatch attempt against a claimed `Payment`. Returns `true` if a
/// row was claimed and processed (whether the submit itself succeeded or
/// failed), `false` if the queue was empty.
pub async fn dispatch_one_payment(
    store: &Arc<dyn Store>,
    chain: &Arc<dyn ChainAdapter>,
    clock: &Arc<dyn Clock>,
    attempts: &AttemptTracker,
    lease_duration_ms: i64,
) -> bool {
    let now = clock.now_ms();
    let Ok(Some(mut payment)) = store.claim_payment_for_dispatch(lease_duration_ms, now).await else {
        return false;
    };

    let Some(action) = payment_action(&payment) else {
        // Claimed a row whose NextAction is no longer a *Requested variant
        // (raced with another writer); release it unchanged.
        let _ = store.save_payment(&payment).await;
        return true;
    };

    let network = match store.get_payment_source_by_id(payment.payment_source_id).await {
        Ok(Some(source)) => source.network,
        _ => {
            payment.next_action = PaymentNextAction::WaitingForManualAction;
            payment.next_action_error_type = Some(ErrorType::Unknown);
            payment.next_action_error_note = Some("payment source for this payment no longer exists".into());
            payment.bump_next_action_timestamp(now);
            let _ = store.save_payment(&payment).await;
            return true;
        }
    };

    match chain.submit_action(network, action).await {
        Ok(submitted) => {
            attempts.clear(payment.id);
            let tx = pending_transaction(submitted.tx_hash, submitted.fees, submitted.status, now);
            payment.current_transaction_id = Some(tx.id);
            payment.transaction_history.push(tx);
            payment.next_action = payment.next_action.after_submit_success();
            payment.next_action_error_type = None;
            payment.next_action_error_note = None;
            payment.bump_next_action_timestamp(now);
        }
        Err(err) => apply_payment_failure(&mut payment, &err, attempts, now),
    }

    let _ = store.save_payment(&payment).await;
    true
}

pub async fn dispatch_one_purchase(
    store: &Arc<dyn Store>,
    chain: &Arc<dyn ChainAdapter>,
    clock: &Arc<dyn Clock>,
    attempts: &AttemptTracker,
    lease_duration_ms: i64,
) -> bool {
    let now = clock.now_ms();
    let Ok(Some(mut purchase)) = store.claim_purchase_for_dispatch(lease_duration_ms, now).await else {
        return false;
    };

    let Some(action) = purchase_action(&purchase) else {
        let _ = store.save_purchase(&purchase).await;
        return true;
    };

    let network = match store.get_payment_source_by_id(purchase.payment_source_id).await {
        Ok(Some(source)) => source.network,
        _ => {
            purchase.next_action = PurchaseNextAction::WaitingForManualAction;
            purchase.next_action_error_type = Some(ErrorType::Unknown);
            purchase.next_action_error_note = Some("payment source for this purchase no longer exists".into());
            purchase.bump_next_action_timestamp(now);
            let _ = store.save_purchase(&purchase).await;
            return true;
        }
    };

    match chain.submit_action(network, action).await {
        Ok(submitted) => {
            attempts.clear(purchase.id);
            let tx = pending_transaction(submitted.tx_hash, submitted.fees, submitted.status, now);
            purchase.current_transaction_id = Some(tx.id);
            purchase.transaction_history.push(tx);
            purchase.next_action = purchase.next_action.after_submit_success();
            purchase.next_action_error_type = None;
            purchase.next_action_error_note = None;
            purchase.bump_next_action_timestamp(now);
        }
        Err(err) => apply_purchase_failure(&mut purchase, &err, attempts, now),
    }

    let _ = store.save_purchase(&purchase).await;
    true
}

fn apply_payment_failure(payment: &mut Payment, err: &ChainError, attempts: &AttemptTracker, now: TimestampMs) {
    let error_type = err.to_error_type();
    let attempt = attempts.record_failure(payment.id);
    if error_type.is_transient() && attempt < MAX_RETRY_COUNT {
        payment.next_action_error_type = Some(error_type);
        payment.next_action_error_note = Some(format!("{err} (retry {attempt}/{MAX_RETRY_COUNT}, next in {}ms)", backoff_ms(attempt)));
    } else {
        payment.next_action = PaymentNextAction::WaitingForManualAction;
        payment.next_action_error_type = Some(error_type);
        payment.next_action_error_note = Some(format!("{err} (exhausted after {attempt} attempts)"));
        attempts.clear(payment.id);
    }
    payment.bump_next_action_timestamp(now);
}

fn apply_purchase_failure(purchase: &mut Purchase, err: &ChainError, attempts: &AttemptTracker, now: TimestampMs) {
    let error_type = err.to_error_type();
    let attempt = attempts.record_failure(purchase.id);
    if error_type.is_transient() && attempt < MAX_RETRY_COUNT {
        purchase.next_action_error_type = Some(error_type);
        purchase.next_action_error_note = Some(format!("{err} (retry {attempt}/{MAX_RETRY_COUNT}, next in {}ms)", backoff_ms(attempt)));
    } else {
        purchase.next_action = PurchaseNextAction::WaitingForManualAction;
        purchase.next_action_error_type = Some(error_type);
        purchase.next_action_error_note = Some(format!("{err} (exhausted after {attempt} attempts)"));
        attempts.clear(purchase.id);
    }
    purchase.bump_next_action_timestamp(now);
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_chain::MockChainAdapter;
    use escrow_core::money::{Lovelace, RequestedFunds, UnitValue};
    use escrow_core::time::FixedClock;
    use escrow_store::InMemoryStore;

    fn sample_source() -> escrow_core::model::PaymentSource {
        escrow_core::model::PaymentSource {
            id: Uuid::nil(),
            network: escrow_core::model::Network::Preprod,
            smart_contract_address: "addr_test1contract".into(),
            policy_id: Some("a".repeat(56)),
            fee_rate_permille: 50,
            deleted_at: None,
            config: escrow_core::model::PaymentSourceConfig { rpc_provider_api_key: "key".into() },
            created_at: 0,
            updated_at: 0,
        }
    }

    fn sample_payment() -> Payment {
        Payment {
            id: Uuid::new_v4(),
            blockchain_identifier: "ident".into(),
            agent_identifier: "a".repeat(60),
            input_hash: "a".repeat(64),
            pay_by_time: 0,
            submit_result_time: 0,
            unlock_time: 0,
            external_dispute_unlock_time: 0,
            requested_funds: RequestedFunds::new(vec![UnitValue::lovelace(1_000_000)]).unwrap(),
            on_chain_state: Some(escrow_core::state::OnChainState::FundsLocked),
            next_action: PaymentNextAction::SubmitResultRequested,
            next_action_error_type: None,
            next_action_error_note: None,
            current_transaction_id: None,
            transaction_history: vec![],
            withdrawn_for_seller: vec![],
            withdrawn_for_buyer: vec![],
            total_seller_cardano_fees: Lovelace::zero(),
            total_buyer_cardano_fees: Lovelace::zero(),
            result_hash: "ff".repeat(32),
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
    async fn successful_submit_clears_next_action_and_attaches_transaction() {
        let mem = InMemoryStore::new();
        mem.seed_payment_source(sample_source());
        let store: Arc<dyn Store> = Arc::new(mem);
        let chain: Arc<dyn ChainAdapter> = Arc::new(MockChainAdapter::new());
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(5_000));
        let attempts = AttemptTracker::new();

        let payment = sample_payment();
        store.insert_payment(&payment).await.unwrap();

        let dispatched = dispatch_one_payment(&store, &chain, &clock, &attempts, 60_000).await;
        assert!(dispatched);

        let saved = store.find_payment_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(saved.next_action, PaymentNextAction::WaitingForExternalAction);
        assert!(saved.current_transaction_id.is_some());
        assert_eq!(saved.transaction_history.len(), 1);
    }

    #[tokio::test]
    async fn persistent_failure_promotes_to_manual_action() {
        let mem = InMemoryStore::new();
        mem.seed_payment_source(sample_source());
        let store: Arc<dyn Store> = Arc::new(mem);
        let chain_fake = MockChainAdapter::new();
        chain_fake.set_submit_failure(Some(ChainError::Validation("bad datum".into())));
        let chain: Arc<dyn ChainAdapter> = Arc::new(chain_fake);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(5_000));
        let attempts = AttemptTracker::new();

        let payment = sample_payment();
        store.insert_payment(&payment).await.unwrap();

        dispatch_one_payment(&store, &chain, &clock, &attempts, 60_000).await;

        let saved = store.find_payment_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(saved.next_action, PaymentNextAction::WaitingForManualAction);
        assert_eq!(saved.next_action_error_type, Some(ErrorType::ValidationError));
    }

    #[tokio::test]
    async fn transient_failure_retries_until_retry_count_exhausted() {
        let mem = InMemoryStore::new();
        mem.seed_payment_source(sample_source());
        let store: Arc<dyn Store> = Arc::new(mem);
        let chain_fake = MockChainAdapter::new();
        chain_fake.set_submit_failure(Some(ChainError::Unavailable("node down".into())));
        let chain: Arc<dyn ChainAdapter> = Arc::new(chain_fake);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(5_000));
        let attempts = AttemptTracker::new();

        let mut payment = sample_payment();
        store.insert_payment(&payment).await.unwrap();

        for expected_attempt in 1..=MAX_RETRY_COUNT {
            // Release the lease each loop so the next claim can see it again.
            payment = store.find_payment_by_id(payment.id).await.unwrap().unwrap();
            payment.next_action = PaymentNextAction::SubmitResultRequested;
            store.save_payment(&payment).await.unwrap();

            dispatch_one_payment(&store, &chain, &clock, &attempts, 0).await;
            let saved = store.find_payment_by_id(payment.id).await.unwrap().unwrap();
            if expected_attempt < MAX_RETRY_COUNT {
                assert_eq!(saved.next_action, PaymentNextAction::SubmitResultRequested, "attempt {expected_attempt} should still be retryable");
                assert_eq!(saved.next_action_error_type, Some(ErrorType::NetworkError));
            } else {
                assert_eq!(saved.next_action, PaymentNextAction::WaitingForManualAction);
            }
        }
    }
}
