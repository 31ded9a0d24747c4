//! `CreatePurchase` (§4.3): the buyer side of escrow creation.
//!
//! Unlike `CreatePayment`, which synthesizes the identifier, this
//! operation trusts nothing about the `blockchainIdentifier` a seller
//! handed the caller until it independently verifies it (§4.1
//! Verification). The initial credit-hold against the `token-credit`
//! collaborator mentioned in §4.3 is out of scope here (§1: credit
//! metering is an external collaborator).

use crate::agent_resolution::{require_fixed_pricing, resolve_selling_agent};
use crate::deps::OrchestratorDeps;
use crate::time_window::{validate_time_window, TimeWindowInput};
use crate::validation::{validate_agent_identifier, validate_identifier_from_purchaser, validate_input_hash};
use escrow_core::error::{ErrorKind, OrchestratorError};
use escrow_core::identifier::codec::decode_blockchain_identifier;
use escrow_core::identifier::preimage::Preimage;
use escrow_core::identifier::verify::{verify_blockchain_identifier, VerifyError, VerifyInput};
use escrow_core::model::{Network, Purchase};
use escrow_core::state::PurchaseNextAction;
use escrow_store::StoreError;
use serde_json::Value as Json;
use uuid::Uuid;

pub struct CreatePurchaseInput {
    pub network: Network,
    pub blockchain_identifier: String,
    pub input_hash: String,
    pub seller_vkey: String,
    pub agent_identifier: String,
    pub identifier_from_purchaser: String,
    pub pay_by_time: i64,
    pub submit_result_time: i64,
    pub unlock_time: i64,
    pub external_dispute_unlock_time: i64,
    pub metadata: Option<Json>,
    pub requested_by_id: Uuid,
}

fn verify_error_kind(err: &VerifyError) -> ErrorKind {
    match err {
        VerifyError::KeyMismatch | VerifyError::SignatureInvalid => ErrorKind::SignatureInvalid,
        VerifyError::InvalidFormat | VerifyError::PurchaserMismatch | VerifyError::AgentMismatch => ErrorKind::InvalidArgument,
    }
}

pub async fn create_purchase(deps: &OrchestratorDeps, input: CreatePurchaseInput) -> Result<Purchase, OrchestratorError> {
    validate_agent_identifier(&input.agent_identifier)?;
    validate_input_hash(&input.input_hash)?;
    validate_identifier_from_purchaser(&input.identifier_from_purchaser)?;

    if let Some(existing) = deps
        .store
        .find_purchase_by_blockchain_identifier(&input.blockchain_identifier)
        .await
        .map_err(crate::store_error::internal)?
    {
        return Err(OrchestratorError::with_existing(
            ErrorKind::AlreadyExists,
            "a Purchase with this blockchainIdentifier already exists",
            existing.id,
        ));
    }

    let now = deps.now();
    let window = validate_time_window(
        TimeWindowInput {
            pay_by_time: input.pay_by_time,
            submit_result_time: input.submit_result_time,
            unlock_time: Some(input.unlock_time),
            external_dispute_unlock_time: Some(input.external_dispute_unlock_time),
        },
        now,
    )?;

    let resolved = resolve_selling_agent(deps, input.network, &input.agent_identifier).await?;
    let fixed_amounts = require_fixed_pricing(&resolved.metadata)?;

    let decoded = decode_blockchain_identifier(&input.blockchain_identifier)
        .ok_or_else(|| OrchestratorError::invalid_argument("blockchainIdentifier is not validly formatted"))?;

    let preimage = Preimage {
        input_hash: input.input_hash.clone(),
        agent_identifier: input.agent_identifier.clone(),
        purchaser_identifier: input.identifier_from_purchaser.clone(),
        seller_identifier: decoded.seller_id.clone(),
        requested_funds: None,
        pay_by_time: window.pay_by_time,
        submit_result_time: window.submit_result_time,
        unlock_time: window.unlock_time,
        external_dispute_unlock_time: window.external_dispute_unlock_time,
        seller_address: resolved.hot_wallet.wallet_address.clone(),
    };

    verify_blockchain_identifier(
        &input.blockchain_identifier,
        VerifyInput {
            agent_identifier: &input.agent_identifier,
            identifier_from_purchaser: &input.identifier_from_purchaser,
            seller_vkey: &input.seller_vkey,
            preimage,
        },
    )
    .map_err(|e| OrchestratorError::new(verify_error_kind(&e), e.to_string()))?;

    let smart_contract_wallet = deps
        .store
        .find_purchasing_hot_wallet(resolved.payment_source.id)
        .await
        .map_err(crate::store_error::internal)?
        .ok_or_else(|| OrchestratorError::not_found("no Purchasing hot wallet configured for this PaymentSource"))?;

    let purchase = Purchase {
        id: Uuid::new_v4(),
        blockchain_identifier: input.blockchain_identifier,
        agent_identifier: input.agent_identifier,
        input_hash: input.input_hash,
        pay_by_time: window.pay_by_time,
        submit_result_time: window.submit_result_time,
        unlock_time: window.unlock_time,
        external_dispute_unlock_time: window.external_dispute_unlock_time,
        paid_funds: fixed_amounts,
        on_chain_state: None,
        next_action: PurchaseNextAction::WaitingForExternalAction,
        next_action_error_type: None,
        next_action_error_note: None,
        current_transaction_id: None,
        transaction_history: Vec::new(),
        withdrawn_for_seller: Vec::new(),
        withdrawn_for_buyer: Vec::new(),
        total_seller_cardano_fees: escrow_core::money::Lovelace::zero(),
        total_buyer_cardano_fees: escrow_core::money::Lovelace::zero(),
        created_at: now,
        updated_at: now,
        next_action_last_changed_at: now,
        on_chain_state_or_result_last_changed_at: now,
        next_action_or_on_chain_state_or_result_last_changed_at: now,
        requested_by_id: input.requested_by_id,
        metadata: input.metadata,
        payment_source_id: resolved.payment_source.id,
        seller_wallet_address: resolved.hot_wallet.wallet_address,
        smart_contract_wallet_id: smart_contract_wallet.id,
    };

    match deps.store.insert_purchase(&purchase).await {
        Ok(()) => Ok(purchase),
        Err(StoreError::Conflict(msg)) => Err(OrchestratorError::new(ErrorKind::Conflict, msg)),
        Err(other) => Err(crate::store_error::internal(other)),
    }
}
