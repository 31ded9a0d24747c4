//! `/purchase/*` (§6): CreatePurchase (with AlreadyExists idempotent
//! resume, §4.3/§7/§8), the refund-request guarded transitions, error
//! recovery, diff cursors, and the spending aggregator (§4.8).

use crate::auth::AuthenticatedCaller;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use escrow_core::error::ErrorKind;
use escrow_core::model::{Network, Purchase};
use escrow_orchestrator::create_purchase::CreatePurchaseInput;
use escrow_orchestrator::earnings::EarningsQuery;
use escrow_store::{DiffCursor, DiffMode, Store};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/purchase", post(create_purchase).get(list_purchases))
        .route("/purchase/resolve-blockchain-identifier", post(resolve_blockchain_identifier))
        .route("/purchase/request-refund", post(request_refund))
        .route("/purchase/cancel-refund-request", post(cancel_refund_request))
        .route("/purchase/error-state-recovery", post(error_state_recovery))
        .route("/purchase/diff", get(diff_either))
        .route("/purchase/diff/next-action", get(diff_next_action))
        .route("/purchase/diff/onchain-state-or-result", get(diff_onchain_state_or_result))
        .route("/purchase/spending", post(spending))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePurchaseBody {
    network: Network,
    blockchain_identifier: String,
    input_hash: String,
    seller_vkey: String,
    agent_identifier: String,
    identifier_from_purchaser: String,
    pay_by_time: i64,
    submit_result_time: i64,
    unlock_time: i64,
    external_dispute_unlock_time: i64,
    metadata: Option<JsonValue>,
}

async fn create_purchase(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(body): Json<CreatePurchaseBody>,
) -> ApiResult<Json<Purchase>> {
    let result = escrow_orchestrator::create_purchase::create_purchase(
        &state.deps,
        CreatePurchaseInput {
            network: body.network,
            blockchain_identifier: body.blockchain_identifier,
            input_hash: body.input_hash,
            seller_vkey: body.seller_vkey,
            agent_identifier: body.agent_identifier,
            identifier_from_purchaser: body.identifier_from_purchaser,
            pay_by_time: body.pay_by_time,
            submit_result_time: body.submit_result_time,
            unlock_time: body.unlock_time,
            external_dispute_unlock_time: body.external_dispute_unlock_time,
            metadata: body.metadata,
            requested_by_id: caller.requester_id,
        },
    )
    .await;

    match result {
        Ok(purchase) => Ok(Json(purchase)),
        // §7/§8: idempotent clients resume with the pre-existing row, not
        // a bare error — the second CreatePurchase call "returns the
        // same entity".
        Err(err) if err.kind == ErrorKind::AlreadyExists => {
            let existing_id = err.existing_id.expect("AlreadyExists always carries existing_id");
            let existing = state
                .deps
                .store
                .find_purchase_by_id(existing_id)
                .await
                .map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?
                .ok_or(ApiError(err))?;
            Ok(Json(existing))
        }
        Err(err) => Err(ApiError(err)),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListPurchasesQuery {
    network: Option<Network>,
    smart_contract_address: Option<String>,
    on_chain_state_category: Option<String>,
    search_query: Option<String>,
    #[serde(default)]
    include_history: bool,
    cursor_id: Option<Uuid>,
    limit: Option<u32>,
}

async fn list_purchases(State(state): State<AppState>, Query(q): Query<ListPurchasesQuery>) -> ApiResult<Json<Vec<Purchase>>> {
    let filter = escrow_store::ListFilter {
        network: q.network,
        smart_contract_address: q.smart_contract_address,
        on_chain_state_category: q.on_chain_state_category,
        search_query: q.search_query,
        include_history: q.include_history,
        cursor_id: q.cursor_id,
        limit: q.limit.unwrap_or(20).min(100),
    };
    let purchases = state.deps.store.list_purchases(&filter).await.map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?;
    Ok(Json(purchases))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResolveIdentifierBody {
    blockchain_identifier: String,
}

async fn resolve_blockchain_identifier(State(state): State<AppState>, Json(body): Json<ResolveIdentifierBody>) -> ApiResult<Json<Purchase>> {
    let purchase = state
        .deps
        .store
        .find_purchase_by_blockchain_identifier(&body.blockchain_identifier)
        .await
        .map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?
        .ok_or_else(|| ApiError(escrow_core::error::OrchestratorError::not_found("no purchase with this blockchainIdentifier")))?;
    Ok(Json(purchase))
}

#[derive(Debug, Deserialize)]
struct PurchaseIdBody {
    #[serde(rename = "purchaseId")]
    purchase_id: Uuid,
}

async fn request_refund(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(body): Json<PurchaseIdBody>,
) -> ApiResult<Json<Purchase>> {
    let purchase = escrow_orchestrator::request_purchase_refund(&state.deps, body.purchase_id, &caller).await?;
    Ok(Json(purchase))
}

async fn cancel_refund_request(
    State(state): State<AppState>,
    AuthenticatedCaller(caller): AuthenticatedCaller,
    Json(body): Json<PurchaseIdBody>,
) -> ApiResult<Json<Purchase>> {
    let purchase = escrow_orchestrator::cancel_purchase_refund_request(&state.deps, body.purchase_id, &caller).await?;
    Ok(Json(purchase))
}

async fn error_state_recovery(State(state): State<AppState>, Json(body): Json<PurchaseIdBody>) -> ApiResult<Json<Purchase>> {
    let purchase = escrow_orchestrator::purchase_error_state_recovery(&state.deps, body.purchase_id).await?;
    Ok(Json(purchase))
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

async fn diff_with_mode(state: &AppState, mode: DiffMode, q: DiffQuery) -> ApiResult<Json<escrow_store::DiffPage<Purchase>>> {
    let page = state
        .deps
        .store
        .diff_purchases(mode, q.cursor(), q.limit.unwrap_or(50).min(500))
        .await
        .map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?;
    Ok(Json(page))
}

async fn diff_either(State(state): State<AppState>, Query(q): Query<DiffQuery>) -> ApiResult<Json<escrow_store::DiffPage<Purchase>>> {
    diff_with_mode(&state, DiffMode::Either, q).await
}

async fn diff_next_action(State(state): State<AppState>, Query(q): Query<DiffQuery>) -> ApiResult<Json<escrow_store::DiffPage<Purchase>>> {
    diff_with_mode(&state, DiffMode::NextAction, q).await
}

async fn diff_onchain_state_or_result(State(state): State<AppState>, Query(q): Query<DiffQuery>) -> ApiResult<Json<escrow_store::DiffPage<Purchase>>> {
    diff_with_mode(&state, DiffMode::OnChainStateOrResult, q).await
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SpendingBody {
    agent_identifier: Option<String>,
    start_date: Option<i64>,
    end_date: Option<i64>,
    time_zone: String,
    network: Network,
}

async fn spending(State(state): State<AppState>, Json(body): Json<SpendingBody>) -> ApiResult<Json<escrow_orchestrator::earnings::SpendingReport>> {
    let filter = escrow_store::ListFilter {
        network: Some(body.network),
        smart_contract_address: None,
        on_chain_state_category: None,
        search_query: None,
        include_history: false,
        cursor_id: None,
        limit: 10_000,
    };
    let purchases = state.deps.store.list_purchases(&filter).await.map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?;
    let query = EarningsQuery {
        agent_identifier: body.agent_identifier,
        start: body.start_date,
        end: body.end_date,
        time_zone: body.time_zone,
    };
    let report = escrow_orchestrator::aggregate_purchase_spending(&purchases, &query)?;
    Ok(Json(report))
}
