//! `CreateRegistryRequest`: the Orchestrator-shaped creation half of the
//! Registration Lifecycle (§4.7). Lives in this crate rather than
//! `escrow-orchestrator` because every other piece of §4.7's state
//! machine (confirmation, deregistration, deletion) already does —
//! `RegistryRequest` mutation is this crate's concern end to end.
//!
//! Seeds a row in `RegistrationRequested` with `agentIdentifier=None`;
//! `escrow-registry::dispatch` fills `agentIdentifier` once the mint
//! confirms (§3, §4.7).

use escrow_core::error::OrchestratorError;
use escrow_core::model::{Author, HotWallet, Legal, Network, Pricing, RegistryRequest, WalletType};
use escrow_core::state::RegistrationState;
use escrow_core::time::Clock;
use escrow_store::{Store, StoreError};
use serde_json::Value as Json;
use std::sync::Arc;
use uuid::Uuid;

pub struct CreateRegistryRequestInput {
    pub network: Network,
    pub smart_contract_wallet_id: Uuid,
    pub name: String,
    pub api_base_url: String,
    pub author: Author,
    pub legal: Option<Legal>,
    pub tags: Vec<String>,
    pub pricing: Pricing,
    pub capability: Option<Json>,
    pub example_output: Option<Json>,
    pub image: Option<String>,
}

async fn resolve_selling_wallet(store: &Arc<dyn Store>, network: Network, wallet_id: Uuid) -> Result<HotWallet, OrchestratorError> {
    let wallet = store
        .get_hot_wallet(wallet_id)
        .await
        .map_err(|e| OrchestratorError::internal(e.to_string()))?
        .ok_or_else(|| OrchestratorError::not_found("smartContractWalletId does not reference a known hot wallet"))?;
    if wallet.wallet_type != WalletType::Selling {
        return Err(OrchestratorError::invalid_argument("smartContractWalletId must reference a Selling wallet"));
    }
    let source = store
        .get_payment_source_by_id(wallet.payment_source_id)
        .await
        .map_err(|e| OrchestratorError::internal(e.to_string()))?
        .ok_or_else(|| OrchestratorError::not_found("wallet's PaymentSource no longer exists"))?;
    if source.network != network {
        return Err(OrchestratorError::invalid_argument("wallet's PaymentSource is on a different network"));
    }
    Ok(wallet)
}

pub async fn create_registry_request(
    store: &Arc<dyn Store>,
    clock: &Arc<dyn Clock>,
    input: CreateRegistryRequestInput,
) -> Result<RegistryRequest, OrchestratorError> {
    let wallet = resolve_selling_wallet(store, input.network, input.smart_contract_wallet_id).await?;
    let now = clock.now_ms();

    let request = RegistryRequest {
        id: Uuid::new_v4(),
        state: RegistrationState::RegistrationRequested,
        agent_identifier: None,
        pricing: input.pricing,
        name: input.name,
        api_base_url: input.api_base_url,
        author: input.author,
        legal: input.legal,
        tags: input.tags,
        capability: input.capability,
        example_output: input.example_output,
        image: input.image,
        smart_contract_wallet_id: wallet.id,
        payment_source_id: wallet.payment_source_id,
        created_at: now,
        updated_at: now,
        next_action_last_changed_at: now,
    };

    match store.insert_registry_request(&request).await {
        Ok(()) => Ok(request),
        Err(StoreError::Conflict(msg)) => Err(OrchestratorError::new(escrow_core::error::ErrorKind::Conflict, msg)),
        Err(other) => Err(OrchestratorError::internal(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_core::model::{PaymentSource, PaymentSourceConfig};
    use escrow_core::time::FixedClock;
    use escrow_store::InMemoryStore;

    fn seed(mem: &InMemoryStore) -> (Uuid, Network) {
        let source = PaymentSource {
            id: Uuid::new_v4(),
            network: Network::Preprod,
            smart_contract_address: "addr_test1contract".into(),
            policy_id: Some("a".repeat(56)),
            fee_rate_permille: 0,
            deleted_at: None,
            config: PaymentSourceConfig { rpc_provider_api_key: "key".into() },
            created_at: 0,
            updated_at: 0,
        };
        let wallet = HotWallet {
            id: Uuid::new_v4(),
            wallet_vkey: "c".repeat(56),
            wallet_address: "addr_test1seller".into(),
            wallet_type: WalletType::Selling,
            payment_source_id: source.id,
            encrypted_mnemonic: "enc".into(),
            deleted_at: None,
        };
        mem.seed_payment_source(source.clone());
        mem.seed_hot_wallet(wallet.clone());
        (wallet.id, source.network)
    }

    fn sample_input(wallet_id: Uuid, network: Network) -> CreateRegistryRequestInput {
        CreateRegistryRequestInput {
            network,
            smart_contract_wallet_id: wallet_id,
            name: "summarizer".into(),
            api_base_url: "https://example.com/api".into(),
            author: Author { name: "alice".into(), contact_email: None, contact_other: None, organization: None },
            legal: None,
            tags: vec!["nlp".into()],
            pricing: Pricing::Free,
            capability: None,
            example_output: None,
            image: None,
        }
    }

    #[tokio::test]
    async fn creates_request_in_requested_state_with_no_agent_identifier() {
        let mem = InMemoryStore::new();
        let (wallet_id, network) = seed(&mem);
        let store: Arc<dyn Store> = Arc::new(mem);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(1_000));

        let request = create_registry_request(&store, &clock, sample_input(wallet_id, network)).await.unwrap();
        assert_eq!(request.state, RegistrationState::RegistrationRequested);
        assert!(request.agent_identifier.is_none());
    }

    #[tokio::test]
    async fn rejects_a_purchasing_wallet() {
        let mem = InMemoryStore::new();
        let (_, network) = seed(&mem);
        let purchasing = HotWallet {
            id: Uuid::new_v4(),
            wallet_vkey: "d".repeat(56),
            wallet_address: "addr_test1buyer".into(),
            wallet_type: WalletType::Purchasing,
            payment_source_id: Uuid::new_v4(),
            encrypted_mnemonic: "enc".into(),
            deleted_at: None,
        };
        mem.seed_hot_wallet(purchasing.clone());
        let store: Arc<dyn Store> = Arc::new(mem);
        let clock: Arc<dyn Clock> = Arc::new(FixedClock(1_000));

        let err = create_registry_request(&store, &clock, sample_input(purchasing.id, network)).await.unwrap_err();
        assert_eq!(err.kind, escrow_core::error::ErrorKind::InvalidArgument);
    }
}
