//! `/registry/*` (§4.7, §6): create/list/lookup/delete a `RegistryRequest`,
//! request deregistration, and the diff cursor.

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;
use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use escrow_core::model::{Author, Legal, Network, Pricing, RegistryRequest};
use escrow_registry::CreateRegistryRequestInput;
use escrow_store::{DiffCursor, Store};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use uuid::Uuid;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/registry", post(create_registry_request).get(list_registry_requests))
        .route("/registry/:id", get(get_registry_request).delete(delete_registry_request))
        .route("/registry/deregister", post(deregister))
        .route("/registry/diff", get(diff))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateRegistryRequestBody {
    network: Network,
    smart_contract_wallet_id: Uuid,
    name: String,
    api_base_url: String,
    author: Author,
    legal: Option<Legal>,
    #[serde(default)]
    tags: Vec<String>,
    pricing: Pricing,
    capability: Option<JsonValue>,
    example_output: Option<JsonValue>,
    image: Option<String>,
}

async fn create_registry_request(State(state): State<AppState>, Json(body): Json<CreateRegistryRequestBody>) -> ApiResult<Json<RegistryRequest>> {
    let request = escrow_registry::create_registry_request(
        &state.deps.store,
        &state.deps.clock,
        CreateRegistryRequestInput {
            network: body.network,
            smart_contract_wallet_id: body.smart_contract_wallet_id,
            name: body.name,
            api_base_url: body.api_base_url,
            author: body.author,
            legal: body.legal,
            tags: body.tags,
            pricing: body.pricing,
            capability: body.capability,
            example_output: body.example_output,
            image: body.image,
        },
    )
    .await?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListRegistryQuery {
    limit: Option<u32>,
}

/// There is no dedicated list-with-filter store method for registry
/// requests (§4.7 exposes only the diff cursor and point lookups) — a
/// wide-open diff page from the start of time stands in for "list all".
async fn list_registry_requests(State(state): State<AppState>, Query(q): Query<ListRegistryQuery>) -> ApiResult<Json<Vec<RegistryRequest>>> {
    let page = state
        .deps
        .store
        .diff_registry_requests(DiffCursor::start(), q.limit.unwrap_or(100).min(500))
        .await
        .map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?;
    Ok(Json(page.items))
}

async fn get_registry_request(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<Json<RegistryRequest>> {
    let request = state
        .deps
        .store
        .find_registry_request_by_id(id)
        .await
        .map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?
        .ok_or_else(|| ApiError(escrow_core::error::OrchestratorError::not_found("no registry request with this id")))?;
    Ok(Json(request))
}

async fn delete_registry_request(State(state): State<AppState>, Path(id): Path<Uuid>) -> ApiResult<()> {
    escrow_registry::deregister::delete_registry_request(&state.deps.store, id).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RegistryIdBody {
    #[serde(rename = "registryRequestId")]
    registry_request_id: Uuid,
}

async fn deregister(State(state): State<AppState>, Json(body): Json<RegistryIdBody>) -> ApiResult<Json<RegistryRequest>> {
    let request = escrow_registry::request_deregistration(&state.deps.store, &state.deps.clock, body.registry_request_id).await?;
    Ok(Json(request))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DiffQuery {
    since: Option<i64>,
    cursor_id: Option<Uuid>,
    limit: Option<u32>,
}

async fn diff(State(state): State<AppState>, Query(q): Query<DiffQuery>) -> ApiResult<Json<escrow_store::DiffPage<RegistryRequest>>> {
    let cursor = match (q.since, q.cursor_id) {
        (Some(since), Some(cursor_id)) => DiffCursor { since, cursor_id },
        _ => DiffCursor::start(),
    };
    let page = state
        .deps
        .store
        .diff_registry_requests(cursor, q.limit.unwrap_or(50).min(500))
        .await
        .map_err(|e| ApiError(escrow_core::error::OrchestratorError::internal(e.to_string())))?;
    Ok(Json(page))
}
