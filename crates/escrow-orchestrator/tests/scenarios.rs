//! End-to-end scenario coverage (§8): each test drives more than one
//! orchestrator operation in sequence against a shared `InMemoryStore`
//! and `MockChainAdapter`/`MockSigner` pair, the way a real caller would
//! chain CreatePayment/CreatePurchase with the guarded transitions and
//! the reconciler/dispatcher's downstream effects.

use escrow_chain::mock::{MockChainAdapter, MockSigner};
use escrow_chain::AssetHolder;
use escrow_core::agent_metadata::{AgentMetadata, AgentPricing, FixedPricing as MetaFixedPricing, StringOrChunks};
use escrow_core::error::ErrorKind;
use escrow_core::model::{HotWallet, Network, PaymentSource, PaymentSourceConfig, WalletType};
use escrow_core::money::UnitValue;
use escrow_core::state::{OnChainState, PaymentNextAction};
use escrow_core::time::SystemClock;
use escrow_orchestrator::caller::{CallerContext, Role};
use escrow_orchestrator::create_payment::{create_payment, CreatePaymentInput};
use escrow_orchestrator::create_purchase::{create_purchase, CreatePurchaseInput};
use escrow_orchestrator::earnings::{aggregate_payment_income, EarningsQuery};
use escrow_orchestrator::{authorize_payment_refund, payment_error_state_recovery, OrchestratorDeps};
use escrow_store::{DiffCursor, DiffMode, InMemoryStore, Store};
use std::sync::Arc;
use uuid::Uuid;

const AGENT_IDENTIFIER_SEED: &str = "aa";

fn agent_identifier() -> String {
    // policyId (56 hex chars) || assetName (at least one more hex char).
    AGENT_IDENTIFIER_SEED.repeat(28) + "bb"
}

fn policy_id() -> String {
    agent_identifier()[0..56].to_string()
}

struct Fixture {
    deps: OrchestratorDeps,
    payment_source_id: Uuid,
}

/// Seeds one `PaymentSource`, one `Selling` `HotWallet`, a deterministic
/// signer keypair for that wallet, and a Fixed-pricing asset holder for
/// `agent_identifier()` — everything `create_payment`/`create_purchase`
/// need to resolve a selling agent (§4.3).
async fn fixture() -> Fixture {
    let store = Arc::new(InMemoryStore::new());
    let chain = Arc::new(MockChainAdapter::new());
    let signer = Arc::new(MockSigner::new());
    let clock = Arc::new(SystemClock);

    let payment_source = PaymentSource {
        id: Uuid::new_v4(),
        network: Network::Preprod,
        smart_contract_address: "addr_test1contract".into(),
        policy_id: Some(policy_id()),
        fee_rate_permille: 50,
        deleted_at: None,
        config: PaymentSourceConfig { rpc_provider_api_key: "test-key".into() },
        created_at: 0,
        updated_at: 0,
    };
    store.seed_payment_source(payment_source.clone());

    let selling_wallet = HotWallet {
        id: Uuid::new_v4(),
        wallet_vkey: "unused".into(),
        wallet_address: "addr_test1seller".into(),
        wallet_type: WalletType::Selling,
        payment_source_id: payment_source.id,
        encrypted_mnemonic: "encrypted".into(),
        deleted_at: None,
    };
    store.seed_hot_wallet(selling_wallet.clone());

    let purchasing_wallet = HotWallet {
        id: Uuid::new_v4(),
        wallet_vkey: "unused".into(),
        wallet_address: "addr_test1purchasing".into(),
        wallet_type: WalletType::Purchasing,
        payment_source_id: payment_source.id,
        encrypted_mnemonic: "encrypted".into(),
        deleted_at: None,
    };
    store.seed_hot_wallet(purchasing_wallet);

    signer.register_wallet(&selling_wallet.wallet_address, 11);

    let metadata = AgentMetadata {
        name: StringOrChunks::Atomic("summarizer".into()),
        api_base_url: StringOrChunks::Atomic("https://example.com/api".into()),
        author: escrow_core::agent_metadata::Author {
            name: StringOrChunks::Atomic("alice".into()),
            contact_email: None,
            contact_other: None,
            organization: None,
        },
        legal: None,
        tags: vec!["summarization".into()],
        pricing: AgentPricing::Fixed(MetaFixedPricing { amounts: vec![UnitValue::lovelace(5_000_000)] }),
        capability: None,
        example_output: None,
        image: None,
    };
    chain.seed_asset_holder(
        &agent_identifier(),
        AssetHolder {
            wallet_address: selling_wallet.wallet_address.clone(),
            vkey: "unused".into(),
            metadata: Some(serde_json::to_value(&metadata).unwrap()),
        },
    );

    let deps = OrchestratorDeps::new(store, chain.clone(), signer, clock);
    Fixture { deps, payment_source_id: payment_source.id }
}

fn seller() -> CallerContext {
    CallerContext { requester_id: Uuid::new_v4(), role: Role::Standard }
}

fn now_plus_window(now: i64) -> (i64, i64) {
    (now + 3_600_000, now + 6 * 3_600_000)
}

/// Scenario 1 (§8): happy path for a Fixed-pricing agent. CreatePayment
/// resolves the seeded asset holder, signs a preimage, and persists a
/// `Payment` whose `blockchainIdentifier` independently decodes.
#[tokio::test]
async fn happy_path_create_payment_for_a_fixed_price_agent() {
    let fx = fixture().await;
    let now = fx.deps.now();
    let (pay_by_time, submit_result_time) = now_plus_window(now);
    let caller = seller();

    let payment = create_payment(
        &fx.deps,
        CreatePaymentInput {
            network: Network::Preprod,
            agent_identifier: agent_identifier(),
            input_hash: "a".repeat(64),
            identifier_from_purchaser: "c".repeat(20),
            pay_by_time,
            submit_result_time,
            unlock_time: None,
            external_dispute_unlock_time: None,
            metadata: None,
            requested_by_id: caller.requester_id,
        },
    )
    .await
    .expect("create_payment should succeed against a seeded Fixed-pricing agent");

    assert_eq!(payment.payment_source_id, fx.payment_source_id);
    assert_eq!(payment.next_action, PaymentNextAction::WaitingForExternalAction);
    assert!(payment.on_chain_state.is_none());

    let decoded = escrow_core::identifier::codec::decode_blockchain_identifier(&payment.blockchain_identifier)
        .expect("a freshly minted blockchainIdentifier must decode");
    assert_eq!(decoded.purchaser_id, "c".repeat(20));

    let stored = fx.deps.store.find_payment_by_id(payment.id).await.unwrap().expect("payment must be persisted");
    assert_eq!(stored.id, payment.id);
}

/// Scenario 2 (§8, §4.1 Verification): a buyer who builds their own
/// `identifierFromPurchaser` but gets handed a `blockchainIdentifier`
/// signed for a *different* purchaser id must have CreatePurchase reject
/// it — the preimage hash won't match what the seller actually signed.
#[tokio::test]
async fn create_purchase_rejects_an_identifier_signed_for_a_different_purchaser() {
    let fx = fixture().await;
    let now = fx.deps.now();
    let (pay_by_time, submit_result_time) = now_plus_window(now);

    let payment = create_payment(
        &fx.deps,
        CreatePaymentInput {
            network: Network::Preprod,
            agent_identifier: agent_identifier(),
            input_hash: "a".repeat(64),
            identifier_from_purchaser: "c".repeat(20),
            pay_by_time,
            submit_result_time,
            unlock_time: None,
            external_dispute_unlock_time: None,
            metadata: None,
            requested_by_id: Uuid::new_v4(),
        },
    )
    .await
    .unwrap();

    let wrong_purchaser_id = "d".repeat(20);
    let err = create_purchase(
        &fx.deps,
        CreatePurchaseInput {
            network: Network::Preprod,
            blockchain_identifier: payment.blockchain_identifier,
            input_hash: payment.input_hash,
            // The value is irrelevant here: verification rejects the
            // purchaser-id mismatch before it ever inspects the vkey.
            seller_vkey: String::new(),
            agent_identifier: agent_identifier(),
            identifier_from_purchaser: wrong_purchaser_id,
            pay_by_time: payment.pay_by_time,
            submit_result_time: payment.submit_result_time,
            unlock_time: payment.unlock_time,
            external_dispute_unlock_time: payment.external_dispute_unlock_time,
            metadata: None,
            requested_by_id: Uuid::new_v4(),
        },
    )
    .await
    .unwrap_err();

    assert_eq!(err.kind, ErrorKind::InvalidArgument);
}

/// Scenario 3 (§8): the refund guard only fires from the exact precondition
/// §4.3 names. A payment still `WaitingForExternalAction` with no observed
/// on-chain state at all cannot have its refund authorized yet, even
/// though it is "waiting" in the colloquial sense.
#[tokio::test]
async fn authorize_refund_rejects_a_payment_with_no_observed_on_chain_state() {
    let fx = fixture().await;
    let now = fx.deps.now();
    let (pay_by_time, submit_result_time) = now_plus_window(now);
    let caller = seller();

    let payment = create_payment(
        &fx.deps,
        CreatePaymentInput {
            network: Network::Preprod,
            agent_identifier: agent_identifier(),
            input_hash: "a".repeat(64),
            identifier_from_purchaser: "c".repeat(20),
            pay_by_time,
            submit_result_time,
            unlock_time: None,
            external_dispute_unlock_time: None,
            metadata: None,
            requested_by_id: caller.requester_id,
        },
    )
    .await
    .unwrap();

    let err = authorize_payment_refund(&fx.deps, payment.id, &caller).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::PreconditionFailed);

    // A caller who doesn't own the payment (and isn't Admin) is rejected
    // even once ownership is the only remaining question.
    let stranger = CallerContext { requester_id: Uuid::new_v4(), role: Role::Standard };
    let err = authorize_payment_refund(&fx.deps, payment.id, &stranger).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Forbidden);
}

/// Scenario 4 (§8): error-state recovery rewinds `CurrentTransaction` to
/// the last confirmed predecessor and clears the error, handing the
/// Dispatcher a clean slate — exercised here against a payment the
/// reconciler/dispatcher pair has already pushed into
/// `WaitingForManualAction`.
#[tokio::test]
async fn error_state_recovery_rewinds_to_the_last_confirmed_transaction() {
    let fx = fixture().await;
    let now = fx.deps.now();
    let (pay_by_time, submit_result_time) = now_plus_window(now);

    let mut payment = create_payment(
        &fx.deps,
        CreatePaymentInput {
            network: Network::Preprod,
            agent_identifier: agent_identifier(),
            input_hash: "a".repeat(64),
            identifier_from_purchaser: "c".repeat(20),
            pay_by_time,
            submit_result_time,
            unlock_time: None,
            external_dispute_unlock_time: None,
            metadata: None,
            requested_by_id: Uuid::new_v4(),
        },
    )
    .await
    .unwrap();

    let confirmed_tx = escrow_core::model::Transaction {
        id: Uuid::new_v4(),
        tx_hash: "confirmed".into(),
        status: escrow_core::model::TransactionStatus::Confirmed,
        fees: escrow_core::money::Lovelace::from_u64(170_000),
        block_height: Some(100),
        block_time: Some(now),
        previous_on_chain_state: None,
        new_on_chain_state: Some(OnChainState::FundsLocked),
        confirmations: 10,
        collateral_return_lovelace: None,
        created_at: now,
    };
    let failed_retry_tx = escrow_core::model::Transaction {
        id: Uuid::new_v4(),
        tx_hash: "retry-attempt".into(),
        status: escrow_core::model::TransactionStatus::Pending,
        fees: escrow_core::money::Lovelace::zero(),
        block_height: None,
        block_time: None,
        previous_on_chain_state: Some(OnChainState::FundsLocked),
        new_on_chain_state: None,
        confirmations: 0,
        collateral_return_lovelace: None,
        created_at: now + 1,
    };
    payment.on_chain_state = Some(OnChainState::FundsLocked);
    payment.current_transaction_id = Some(failed_retry_tx.id);
    payment.transaction_history = vec![confirmed_tx.clone(), failed_retry_tx];
    payment.next_action = PaymentNextAction::WaitingForManualAction;
    payment.next_action_error_type = Some(escrow_core::state::ErrorType::NetworkError);
    fx.deps.store.save_payment(&payment).await.unwrap();

    let recovered = payment_error_state_recovery(&fx.deps, payment.id).await.unwrap();

    assert_eq!(recovered.current_transaction_id, Some(confirmed_tx.id));
    assert_eq!(recovered.next_action, PaymentNextAction::WaitingForExternalAction);
    assert!(recovered.next_action_error_type.is_none());
    assert_eq!(
        recovered.transaction_history[1].status,
        escrow_core::model::TransactionStatus::FailedViaManualReset,
        "the superseded retry must be marked failed, not silently dropped"
    );
}

/// Scenario 5 (§8): a diff consumer that persists the cursor from each
/// page and resumes from it, a page at a time, eventually observes every
/// payment — the cursor boundary is inclusive (§4.6: replaying it after
/// a crash must never drop a row), so a consumer is expected to tolerate
/// the boundary row reappearing in the next page rather than assume
/// strict advancement past it.
#[tokio::test]
async fn diff_cursor_resumption_eventually_sees_every_payment() {
    let fx = fixture().await;
    let now = fx.deps.now();
    let (pay_by_time, submit_result_time) = now_plus_window(now);

    let mut ids = Vec::new();
    for i in 0..3u8 {
        let payment = create_payment(
            &fx.deps,
            CreatePaymentInput {
                network: Network::Preprod,
                agent_identifier: agent_identifier(),
                input_hash: "a".repeat(64),
                identifier_from_purchaser: format!("{}{}", "c".repeat(19), i),
                pay_by_time,
                submit_result_time,
                unlock_time: None,
                external_dispute_unlock_time: None,
                metadata: None,
                requested_by_id: Uuid::new_v4(),
            },
        )
        .await
        .unwrap();
        ids.push(payment.id);
    }

    let mut seen = std::collections::HashSet::new();
    let mut cursor = DiffCursor::start();
    for _ in 0..(ids.len() * 2) {
        let page = fx.deps.store.diff_payments(DiffMode::Either, cursor, 2).await.unwrap();
        if page.items.is_empty() {
            break;
        }
        seen.extend(page.items.iter().map(|p| p.id));
        cursor = page.next_cursor.unwrap();
        if seen.len() >= ids.len() {
            break;
        }
    }

    let expected: std::collections::HashSet<Uuid> = ids.into_iter().collect();
    assert_eq!(seen, expected, "every payment must eventually be observed via cursor resumption");
}

fn withdrawn_payment(pay_by_time: i64) -> escrow_core::model::Payment {
    escrow_core::model::Payment {
        id: Uuid::new_v4(),
        blockchain_identifier: Uuid::new_v4().to_string(),
        agent_identifier: agent_identifier(),
        input_hash: "a".repeat(64),
        pay_by_time,
        submit_result_time: pay_by_time + 1,
        unlock_time: pay_by_time + 2,
        external_dispute_unlock_time: pay_by_time + 3,
        requested_funds: escrow_core::money::RequestedFunds::new(vec![UnitValue::lovelace(5_000_000)]).unwrap(),
        on_chain_state: Some(OnChainState::Withdrawn),
        next_action: escrow_core::state::PaymentNextAction::None,
        next_action_error_type: None,
        next_action_error_note: None,
        current_transaction_id: None,
        transaction_history: Vec::new(),
        withdrawn_for_seller: Vec::new(),
        withdrawn_for_buyer: Vec::new(),
        total_seller_cardano_fees: escrow_core::money::Lovelace::from_u64(170_000),
        total_buyer_cardano_fees: escrow_core::money::Lovelace::zero(),
        result_hash: String::new(),
        created_at: pay_by_time,
        updated_at: pay_by_time,
        next_action_last_changed_at: pay_by_time,
        on_chain_state_or_result_last_changed_at: pay_by_time,
        next_action_or_on_chain_state_or_result_last_changed_at: pay_by_time,
        requested_by_id: Uuid::new_v4(),
        metadata: None,
        payment_source_id: Uuid::new_v4(),
        seller_wallet_id: Uuid::new_v4(),
    }
}

/// Scenario 6 (§8): a withdrawn payment buckets into that day's income
/// under the timezone the caller supplied, not UTC — a payment that
/// lands just after midnight UTC still falls on the *previous* local
/// day for a timezone west of Greenwich.
#[tokio::test]
async fn income_aggregation_buckets_by_the_caller_supplied_time_zone() {
    // 2024-03-15T02:00:00Z
    let pay_by_time = 1_710_468_000_000;
    let payment = withdrawn_payment(pay_by_time);
    let payments = std::slice::from_ref(&payment);

    let utc_report = aggregate_payment_income(
        payments,
        &EarningsQuery { agent_identifier: None, start: None, end: None, time_zone: "UTC".into() },
    )
    .unwrap();
    assert_eq!(utc_report.daily_income[0].date, "2024-03-15");
    assert_eq!(utc_report.total_income.units, vec![UnitValue::lovelace(5_000_000)]);
    assert!(utc_report.daily_refund.is_empty());
    assert!(utc_report.daily_pending.is_empty());

    let ny_report = aggregate_payment_income(
        payments,
        &EarningsQuery { agent_identifier: None, start: None, end: None, time_zone: "America/New_York".into() },
    )
    .unwrap();
    assert_eq!(
        ny_report.daily_income[0].date, "2024-03-14",
        "02:00 UTC is still the prior evening in America/New_York"
    );

    let err = aggregate_payment_income(
        payments,
        &EarningsQuery { agent_identifier: None, start: None, end: None, time_zone: "Not/AZone".into() },
    )
    .unwrap_err();
    assert_eq!(err.kind, ErrorKind::InvalidArgument);
}
