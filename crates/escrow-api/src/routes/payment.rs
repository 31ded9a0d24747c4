//! `/payment/*` (§6): CreatePayment, listing, lookup, the refund/result
//! guarded transitions, error recovery, the diff cursors (§4.6), and the
//! income aggregator (§4.8).

use crate::auth::AuthenticatedCaller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use escrow_core::model::{Network, Payment};
use escrow_orchestrator::create_payment::CreatePaymentInput;
use escrow_orchestrator::earnings::EarningsQuery;
use escrow_store::{DiffCursor, DiffMode, Store};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/payment", post(create_payment).get(list_payments))
        .route("/payment/resolve-blockchain-identifier", post(resolve_blockchain_identifier))
        .route("/payment/authorize-refund", post(authorize_refund))
        .route("/payment/submit-result", post(submit_result))
        .route("/payment/error-state-recovery", post(error_state_recovery))
        .route("/payment/diff", get(diff_either))
        .route("/payment/diff/next-action", get(diff_next_action))
        .route("/payment/diff/onchain-state-or-result", get(diff_onchain_state_or_result))
        .route("/payment/income", post(income))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePaymentBody {
    network: Network,
    agent_identifier: String,
    input_hash: String,
    identifier_from_purchaser: String,
    pay_by_time: i64,
    submit_result_time: i64,
    unlock_time: Option<i64>,
    external_dispute_unlock_time: Option<i64>,
    metadata: Option<JsonValue>,
}

async fn create_payment(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(body): Json<CreatePaymentBody>,
) -> ApiResult<Json<Payment>> {
    let payment = escrow_orchestrator::create_payment::create_payment(
        &state.deps,
        CreatePaymentInput {
            network: body.network,
            agent_identifier: body.agent_identifier,
            input_hash: body.input_hash,
            identifier_from_purchaser: body.identifier_from_purchaser,
            pay_by_time: body.pay_by_time,
            submit_result_time: body.submit_result_time,
            unlock_time: body.unlock_time,
            external_dispute_unlock_time: body.external_dispute_unlock_time,
            metadata: body.metadata,
            requested_by_id: caller.requester_id,
        },
    )
    .await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPaymentsQuery {
    network: Option<Network>,
    smart_contract_address: Option<String>,
    on_chain_state_category: Option<String>,
    search_query: Option<String>,
    #[serde(default)]
    include_history: bool,
    cursor_id: Option<Uuid>,
    limit: Option<u32>,
}

async fn list_payments(State(state): State<AppState>, Query(q): Query<ListPaymentsQuery>) -> ApiResult<Json<Vec<Payment>>> {
    let filter = escrow_store::ListFilter {
        network: q.network,
        smart_contract_address: q.smart_contract_address,
        on_chain_state_category: q.on_chain_state_category,
        search_query: q.search_query,
        include_history: q.include_history,
        cursor_id: q.cursor_id,
        limit: q.limit.unwrap_or(20).min(100),
    };
    let payments = state.deps.store.list_payments(&filter).await.map_err(|e| crate::error::ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?;
    Ok(Json(payments))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveIdentifierBody {
    blockchain_identifier: String,
}

async fn resolve_blockchain_identifier(State(state): State<AppState>, Json(body): Json<ResolveIdentifierBody>) -> ApiResult<Json<Payment>> {
    let payment = state
        .deps
        .store
        .find_payment_by_blockchain_identifier(&body.blockchain_identifier)
        .await
        .map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?
        .ok_or_else(|| ApiError(escrow_core::error::OrchestratorError::not_found("no payment with this blockchainIdentifier")))?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
struct PaymentIdBody {
    #[serde(rename = "paymentId")]
    payment_id: Uuid,
}

async fn authorize_refund(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(body): Json<PaymentIdBody>,
) -> ApiResult<Json<Payment>> {
    let payment = escrow_orchestrator::authorize_payment_refund(&state.deps, body.payment_id, &caller).await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResultBody {
    payment_id: Uuid,
    result_hash: String,
}

async fn submit_result(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(body): Json<SubmitResultBody>,
) -> ApiResult<Json<Payment>> {
    let payment = escrow_orchestrator::submit_payment_result(&state.deps, body.payment_id, body.result_hash, &caller).await?;
    Ok(Json(payment))
}

async fn error_state_recovery(State(state): State<AppState>, Json(body): Json<PaymentIdBody>) -> ApiResult<Json<Payment>> {
    let payment = escrow_orchestrator::payment_error_state_recovery(&state.deps, body.payment_id).await?;
    Ok(Json(payment))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffQuery {
    since: Option<i64>,
    cursor_id: Option<Uuid>,
    limit: Option<u32>,
}

impl DiffQuery {
    fn cursor(&self) -> DiffCursor {
        match (self.since, self.cursor_id) {
            (Some(since), Some(cursor_id)) => DiffCursor { since, cursor_id },
            _ => DiffCursor::start(),
        }
    }
}

async fn diff_with_mode(state: &AppState, mode: DiffMode, q: DiffQuery) -> ApiResult<Json<escrow_store::DiffPage<Payment>>> {
    let page = state
        .deps
        .store
        .diff_payments(mode, q.cursor(), q.limit.unwrap_or(50).min(500))
        .await
        .map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?;
    Ok(Json(page))
}

async fn diff_either(State(state): State<AppState>, Query(q): Query<DiffQuery>) -> ApiResult<Json<escrow_store::DiffPage<Payment>>> {
    diff_with_mode(&state, DiffMode::Either, q).await
}

async fn diff_next_action(State(state): State<AppState>, Query(q): Query<DiffQuery>) -> ApiResult<Json<escrow_store::DiffPage<Payment>>> {
    diff_with_mode(&state, DiffMode::NextAction, q).await
}

async fn diff_onchain_state_or_result(State(state): State<AppState>, Query(q): Query<DiffQuery>) -> ApiResult<Json<escrow_store::DiffPage<Payment>>> {
    diff_with_mode(&state, DiffMode::OnChainStateOrResult, q).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct IncomeBody {
    agent_identifier: Option<String>,
    start_date: Option<i64>,
    end_date: Option<i64>,
    time_zone: String,
    network: Network,
}

async fn income(State(state): State<AppState>, Json(body): Json<IncomeBody>) -> ApiResult<Json<escrow_orchestrator::earnings::IncomeReport>> {
    let filter = escrow_store::ListFilter {
        network: Some(body.network),
        smart_contract_address: None,
        on_chain_state_category: None,
        search_query: None,
        include_history: false,
        cursor_id: None,
        limit: 10_000,
    };
    let payments = state.deps.store.list_payments(&filter).await.map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?;
    let query = EarningsQuery {
        agent_identifier: body.agent_identifier,
        start: body.start_date,
        end: body.end_date,
        time_zone: body.time_zone,
    };
    let report = escrow_orchestrator::aggregate_payment_income(&payments, &query)?;
    Ok(Json(report))
}
