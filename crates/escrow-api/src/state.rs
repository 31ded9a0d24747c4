//! Shared application state: one `OrchestratorDeps` plus the background
//! singletons (§5) the `/monitoring` routes introspect and control.

use crate::auth::ApiKeyValidator;
use escrow_dispatcher::Dispatcher;
use escrow_orchestrator::OrchestratorDeps;
use escrow_reconciler::Reconciler;
use escrow_registry::RegistryDispatcher;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub deps: OrchestratorDeps,
    pub reconciler: Arc<Reconciler>,
    pub dispatcher: Arc<Dispatcher>,
    pub registry_dispatcher: Arc<RegistryDispatcher>,
    pub api_keys: Arc<dyn ApiKeyValidator>,
}

impl AsRef<dyn ApiKeyValidator> for AppState {
    fn as_ref(&self) -> &dyn ApiKeyValidator {
        self.api_keys.as_ref()
    }
}
