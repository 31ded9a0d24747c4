//! Resolves the seller's `PaymentSource`, hot wallet, and on-chain agent
//! metadata for CreatePayment/CreatePurchase (§4.3).

use crate::deps::OrchestratorDeps;
use crate::validation::policy_id_of;
use escrow_chain::AssetHolder;
use escrow_core::agent_metadata::{AgentMetadata, AgentPricing};
use escrow_core::error::OrchestratorError;
use escrow_core::model::{HotWallet, Network, PaymentSource, WalletType};
use escrow_core::money::UnitValue;

pub struct ResolvedAgent {
    pub payment_source: PaymentSource,
    pub holder: AssetHolder,
    pub hot_wallet: HotWallet,
    pub metadata: AgentMetadata,
}

/// Resolves `(network, agentIdentifier)` to its owning `PaymentSource`,
/// the wallet currently holding the asset, that wallet's `HotWallet`
/// row (must be `Selling`, owned by the resolved source), and the
/// parsed on-chain agent metadata.
pub async fn resolve_selling_agent(
    deps: &OrchestratorDeps,
    network: Network,
    agent_identifier: &str,
) -> Result<ResolvedAgent, OrchestratorError> {
    let policy_id = policy_id_of(agent_identifier);

    let payment_source = deps
        .store
        .get_payment_source_by_policy(network, policy_id)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| OrchestratorError::not_found(format!("no PaymentSource for policyId {policy_id}")))?;

    let holder = deps
        .chain
        .find_asset_holder(network, agent_identifier)
        .await
        .map_err(|e| OrchestratorError::not_found(format!("agent asset {agent_identifier} not found: {e}")))?
        .ok_or_else(|| OrchestratorError::not_found(format!("agent asset {agent_identifier} has no holder")))?;

    let hot_wallet = deps
        .store
        .find_hot_wallet_by_address(payment_source.id, &holder.wallet_address)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| {
            OrchestratorError::not_found("asset holder is not a hot wallet owned by the resolved PaymentSource")
        })?;

    if hot_wallet.wallet_type != WalletType::Selling {
        return Err(OrchestratorError::not_found("asset holder wallet is not a Selling wallet"));
    }

    let raw_metadata = holder
        .metadata
        .clone()
        .ok_or_else(|| OrchestratorError::not_found("agent asset has no on-chain metadata"))?;
    let metadata: AgentMetadata = serde_json::from_value(raw_metadata)
        .map_err(|e| OrchestratorError::invalid_argument(format!("malformed agent metadata: {e}")))?;

    Ok(ResolvedAgent {
        payment_source,
        holder,
        hot_wallet,
        metadata,
    })
}

/// §4.3: "only `pricingType=Fixed` is supported (others fail with
/// `Unsupported`)".
pub fn require_fixed_pricing(metadata: &AgentMetadata) -> Result<Vec<UnitValue>, OrchestratorError> {
    match &metadata.pricing {
        AgentPricing::Fixed(fixed) => Ok(fixed.amounts.clone()),
        AgentPricing::Free => Err(OrchestratorError::unsupported("only Fixed pricing is supported for CreatePayment/CreatePurchase")),
    }
}
