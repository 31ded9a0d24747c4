//! The two guarded `RegistryRequest` transitions §4.7 hands to callers
//! directly rather than to the mint/burn dispatcher: requesting
//! deregistration, and deleting a request once it has reached a
//! terminal state. Same shape as
//! `escrow_orchestrator::refund_result`'s guarded transitions.

use escrow_core::error::OrchestratorError;
use escrow_core::model::RegistryRequest;
use escrow_core::state::RegistrationState;
use escrow_core::time::Clock;
use escrow_store::Store;
use std::sync::Arc;
use uuid::Uuid;

/// `RegistrationConfirmed → DeregistrationRequested` (§4.7). Queues the
/// burn for `escrow-registry::dispatch` to carry out.
pub async fn request_deregistration(store: &Arc<dyn Store>, clock: &Arc<dyn Clock>, registry_request_id: Uuid) -> Result<RegistryRequest, OrchestratorError> {
    let mut request = store
        .find_registry_request_by_id(registry_request_id)
        .await
        .map_err(|e| OrchestratorError::internal(e.to_string()))?
        .ok_or_else(|| OrchestratorError::not_found("no registry request with this id"))?;

    if !RegistrationState::transition_allowed(request.state, RegistrationState::DeregistrationRequested) {
        return Err(OrchestratorError::precondition_failed(format!(
            "cannot deregister a request in state {:?}",
            request.state
        )));
    }

    let now = clock.now_ms();
    request.state = RegistrationState::DeregistrationRequested;
    request.updated_at = now;
    request.next_action_last_changed_at = now;

    store.save_registry_request(&request).await.map_err(|e| OrchestratorError::internal(e.to_string()))?;
    Ok(request)
}

/// Deletes a `RegistryRequest` from the local store. Permitted only once
/// the request is terminal (§4.7) — the on-chain NFT itself is
/// unaffected either way.
pub async fn delete_registry_request(store: &Arc<dyn Store>, registry_request_id: Uuid) -> Result<(), OrchestratorError> {
    let request = store
        .find_registry_request_by_id(registry_request_id)
        .await
        .map_err(|e| OrchestratorError::internal(e.to_string()))?
        .ok_or_else(|| OrchestratorError::not_found("no registry request with this id"))?;

    if !request.state.deletable() {
        return Err(OrchestratorError::precondition_failed(format!(
            "cannot delete a request in state {:?}, only RegistrationFailed or DeregistrationConfirmed",
            request.state
        )));
    }

    store.delete_registry_request(registry_request_id).await.map_err(|e| OrchestratorError::internal(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_core::model::{Author, Pricing, RegistryRequest};
    use escrow_core::time::FixedClock;
    use escrow_store::InMemoryStore;

    fn sample_request(state: RegistrationState) -> RegistryRequest {
        RegistryRequest {
            id: Uuid::new_v4(),
            state,
            agent_identifier: Some(format!("{}{}", "a".repeat(56), "b".repeat(32))),
            pricing: Pricing::Free,
            name: "agent".into(),
            api_base_url: "https://example.com".into(),
            author: Author { name: "bob".into(), contact_email: None, contact_other: None, organization: None },
            legal: None,
            tags: vec![],
            capability: None,
            example_output: None,
            image: None,
            smart_contract_wallet_id: Uuid::new_v4(),
            payment_source_id: Uuid::new_v4(),
            created_at: 0,
            updated_at: 0,
            next_action_last_changed_at: 0,
        }
    }

    #[tokio::test]
    async fn confirmed_request_can_be_deregistered() {
        let mem = InMemoryStore::new();
        let request = sample_request(RegistrationState::RegistrationConfirmed);
        mem.insert_registry_request(&request).await.unwrap();
        let store: Arc<dyn Store> = Arc::new(mem);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(5_000));

        let updated = request_deregistration(&store, &clock, request.id).await.unwrap();
        assert_eq!(updated.state, RegistrationState::DeregistrationRequested);
    }

    #[tokio::test]
    async fn cannot_deregister_a_request_still_pending_mint() {
        let mem = InMemoryStore::new();
        let request = sample_request(RegistrationState::RegistrationRequested);
        mem.insert_registry_request(&request).await.unwrap();
        let store: Arc<dyn Store> = Arc::new(mem);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(5_000));

        let err = request_deregistration(&store, &clock, request.id).await.unwrap_err();
        assert_eq!(err.kind, escrow_core::error::ErrorKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn cannot_delete_a_non_terminal_request() {
        let mem = InMemoryStore::new();
        let request = sample_request(RegistrationState::DeregistrationRequested);
        mem.insert_registry_request(&request).await.unwrap();
        let store: Arc<dyn Store> = Arc::new(mem);

        let err = delete_registry_request(&store, request.id).await.unwrap_err();
        assert_eq!(err.kind, escrow_core::error::ErrorKind::PreconditionFailed);
    }

    #[tokio::test]
    async fn deletes_a_terminal_request() {
        let mem = InMemoryStore::new();
        let request = sample_request(RegistrationState::DeregistrationConfirmed);
        mem.insert_registry_request(&request).await.unwrap();
        let store: Arc<dyn Store> = Arc::new(mem);

        delete_registry_request(&store, request.id).await.unwrap();
        assert!(store.find_registry_request_by_id(request.id).await.unwrap().is_none());
    }
}
