//! The HTTP surface (§6): one `axum::Router<AppState>` nesting the
//! payment, purchase, registry, and monitoring resource routers under
//! `/api/v1`. Authentication, API-key storage, and credit metering are
//! an external collaborator's concern (§1) — this crate only extracts
//! the `token` header and defers the decision to the injected
//! [`auth::ApiKeyValidator`].

pub mod auth;
pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Assembles the full router. The controller binary mounts this
/// directly onto its listener; tests mount it over an in-memory
/// `AppState` via `tower::ServiceExt::oneshot`.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api/v1",
            Router::new()
                .merge(routes::payment::router())
                .merge(routes::purchase::router())
                .merge(routes::registry::router())
                .merge(routes::monitoring::router()),
        )
        .route("/healthz", axum::routing::get(|| async { "ok" }))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::AllowAllValidator;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use escrow_chain::{MockChainAdapter, MockSigner};
    use escrow_core::time::SystemClock;
    use escrow_dispatcher::{Dispatcher, DispatcherConfig};
    use escrow_orchestrator::OrchestratorDeps;
    use escrow_reconciler::{Reconciler, ReconcilerConfig};
    use escrow_registry::{RegistryDispatcher, RegistryDispatcherConfig};
    use escrow_store::InMemoryStore;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        let store: Arc<dyn escrow_store::Store> = Arc::new(InMemoryStore::new());
        let chain: Arc<dyn escrow_chain::ChainAdapter> = Arc::new(MockChainAdapter::new());
        let signer: Arc<dyn escrow_chain::Signer> = Arc::new(MockSigner::new());
        let clock: Arc<dyn escrow_core::time::Clock> = Arc::new(SystemClock);
        let deps = OrchestratorDeps::new(store.clone(), chain.clone(), signer, clock.clone());

        AppState {
            reconciler: Arc::new(Reconciler::new(store.clone(), chain.clone(), clock.clone(), ReconcilerConfig::default())),
            dispatcher: Arc::new(Dispatcher::new(store.clone(), chain.clone(), clock.clone(), DispatcherConfig::default())),
            registry_dispatcher: Arc::new(RegistryDispatcher::new(store, chain, clock, RegistryDispatcherConfig::default())),
            deps,
            api_keys: Arc::new(AllowAllValidator),
        }
    }

    #[tokio::test]
    async fn healthz_is_reachable_without_auth() {
        let app = router(test_state());
        let response = app.oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn create_payment_without_token_is_unauthorized() {
        let app = router(test_state());
        let request = Request::builder()
            .method("POST")
            .uri("/api/v1/payment")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn monitoring_status_reports_running_lifecycles() {
        let app = router(test_state());
        let response = app.oneshot(Request::builder().uri("/api/v1/monitoring").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
