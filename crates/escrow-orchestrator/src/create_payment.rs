//! `CreatePayment` (§4.3): the seller side of escrow creation.
//!
//! Runs in what the spec calls "a single serializable database
//! transaction" — here, a sequence of adapter reads (no DB transaction
//! held across them, per §5) followed by one `Store::insert_payment`
//! call that is itself the atomic commit point.

use crate::agent_resolution::{require_fixed_pricing, resolve_selling_agent};
use crate::deps::OrchestratorDeps;
use crate::time_window::{validate_time_window, TimeWindowInput};
use crate::validation::{validate_agent_identifier, validate_identifier_from_purchaser, validate_input_hash};
use escrow_core::error::OrchestratorError;
use escrow_core::identifier::codec::{build_token_payload, encode_blockchain_identifier, new_seller_identifier};
use escrow_core::identifier::preimage::Preimage;
use escrow_core::model::{Network, Payment};
use escrow_core::money::RequestedFunds;
use escrow_core::state::PaymentNextAction;
use escrow_store::StoreError;
use serde_json::Value as Json;
use uuid::Uuid;

pub struct CreatePaymentInput {
    pub network: Network,
    pub agent_identifier: String,
    pub input_hash: String,
    pub identifier_from_purchaser: String,
    pub pay_by_time: i64,
    pub submit_result_time: i64,
    pub unlock_time: Option<i64>,
    pub external_dispute_unlock_time: Option<i64>,
    pub metadata: Option<Json>,
    pub requested_by_id: Uuid,
}

pub async fn create_payment(deps: &OrchestratorDeps, input: CreatePaymentInput) -> Result<Payment, OrchestratorError> {
    validate_agent_identifier(&input.agent_identifier)?;
    validate_input_hash(&input.input_hash)?;
    validate_identifier_from_purchaser(&input.identifier_from_purchaser)?;

    let now = deps.now();
    let window = validate_time_window(
        TimeWindowInput {
            pay_by_time: input.pay_by_time,
            submit_result_time: input.submit_result_time,
            unlock_time: input.unlock_time,
            external_dispute_unlock_time: input.external_dispute_unlock_time,
        },
        now,
    )?;

    let resolved = resolve_selling_agent(deps, input.network, &input.agent_identifier).await?;
    let fixed_amounts = require_fixed_pricing(&resolved.metadata)?;
    let requested_funds = RequestedFunds::new(fixed_amounts)
        .map_err(|e| OrchestratorError::invalid_argument(e.to_string()))?;

    let seller_identifier = new_seller_identifier(&input.agent_identifier);
    let preimage = Preimage {
        input_hash: input.input_hash.clone(),
        agent_identifier: input.agent_identifier.clone(),
        purchaser_identifier: input.identifier_from_purchaser.clone(),
        seller_identifier: seller_identifier.clone(),
        // null for Fixed pricing (§4.1): parties derive amounts from on-chain metadata.
        requested_funds: None,
        pay_by_time: window.pay_by_time,
        submit_result_time: window.submit_result_time,
        unlock_time: window.unlock_time,
        external_dispute_unlock_time: window.external_dispute_unlock_time,
        seller_address: resolved.hot_wallet.wallet_address.clone(),
    };
    let hashed = preimage.hash_hex();

    let signed = deps
        .signer
        .sign(&hashed, &resolved.hot_wallet.wallet_address)
        .await
        .map_err(|e| OrchestratorError::internal(format!("signer failure: {e}")))?;

    let payload = build_token_payload(
        &seller_identifier,
        &input.identifier_from_purchaser,
        &signed.signature_hex,
        &signed.key_hex,
    );
    let blockchain_identifier = encode_blockchain_identifier(&payload);

    let payment = Payment {
        id: Uuid::new_v4(),
        blockchain_identifier,
        agent_identifier: input.agent_identifier,
        input_hash: input.input_hash,
        pay_by_time: window.pay_by_time,
        submit_result_time: window.submit_result_time,
        unlock_time: window.unlock_time,
        external_dispute_unlock_time: window.external_dispute_unlock_time,
        requested_funds,
        on_chain_state: None,
        next_action: PaymentNextAction::WaitingForExternalAction,
        next_action_error_type: None,
        next_action_error_note: None,
        current_transaction_id: None,
        transaction_history: Vec::new(),
        withdrawn_for_seller: Vec::new(),
        withdrawn_for_buyer: Vec::new(),
        total_seller_cardano_fees: escrow_core::money::Lovelace::zero(),
        total_buyer_cardano_fees: escrow_core::money::Lovelace::zero(),
        result_hash: String::new(),
        created_at: now,
        updated_at: now,
        next_action_last_changed_at: now,
        on_chain_state_or_result_last_changed_at: now,
        next_action_or_on_chain_state_or_result_last_changed_at: now,
        requested_by_id: input.requested_by_id,
        metadata: input.metadata,
        payment_source_id: resolved.payment_source.id,
        seller_wallet_id: resolved.hot_wallet.id,
    };

    match deps.store.insert_payment(&payment).await {
        Ok(()) => Ok(payment),
        Err(StoreError::Conflict(msg)) => Err(OrchestratorError::new(escrow_core::error::ErrorKind::Conflict, msg)),
        Err(other) => Err(crate::store_error::internal(other)),
    }
}
