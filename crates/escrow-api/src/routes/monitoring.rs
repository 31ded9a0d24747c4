//! `/monitoring/*` (§4.4 step 6, §5): health and lifecycle control for
//! the three background loops. Same surface the operator CLI in
//! `escrow-cli` drives.

use crate::state::AppState;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use escrow_dispatcher::DispatcherLifecycle;
use escrow_reconciler::ReconcilerLifecycle;
use escrow_reconciler::ReconcilerStats;
use escrow_registry::RegistryLifecycle;
use serde::Serialize;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/monitoring", get(status))
        .route("/monitoring/reconciler/trigger-cycle", post(trigger_reconciler))
        .route("/monitoring/reconciler/stop", post(stop_reconciler))
        .route("/monitoring/dispatcher/trigger-cycle", post(trigger_dispatcher))
        .route("/monitoring/dispatcher/stop", post(stop_dispatcher))
        .route("/monitoring/registry-dispatcher/trigger-cycle", post(trigger_registry_dispatcher))
        .route("/monitoring/registry-dispatcher/stop", post(stop_registry_dispatcher))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MonitoringStatus {
    reconciler: ReconcilerLifecycle,
    dispatcher: DispatcherLifecycle,
    registry_dispatcher: RegistryLifecycle,
    reconciler_stats: ReconcilerStats,
}

async fn status(State(state): State<AppState>) -> Json<MonitoringStatus> {
    let stats = state.reconciler.run_once().await;
    Json(MonitoringStatus {
        reconciler: state.reconciler.lifecycle(),
        dispatcher: state.dispatcher.lifecycle(),
        registry_dispatcher: state.registry_dispatcher.lifecycle(),
        reconciler_stats: stats,
    })
}

async fn trigger_reconciler(State(state): State<AppState>) -> Json<ReconcilerStats> {
    Json(state.reconciler.run_once().await)
}

async fn stop_reconciler(State(state): State<AppState>) -> &'static str {
    state.reconciler.stop();
    "stopped"
}

async fn trigger_dispatcher(State(state): State<AppState>) -> Json<u64> {
    Json(state.dispatcher.drain_once().await)
}

async fn stop_dispatcher(State(state): State<AppState>) -> &'static str {
    state.dispatcher.stop();
    "stopped"
}

async fn trigger_registry_dispatcher(State(state): State<AppState>) -> Json<u64> {
    Json(state.registry_dispatcher.drain_once().await)
}

async fn stop_registry_dispatcher(State(state): State<AppState>) -> &'static str {
    state.registry_dispatcher.stop();
    "stopped"
}
