//! Persisted entity shapes.
//!
//! Spec reference: §3 Data Model. These are plain data — `escrow-store`
//! owns mapping them to rows, `escrow-orchestrator`/`escrow-reconciler`/
//! `escrow-dispatcher` own mutating them under the invariants described
//! alongside each type.

use crate::money::{Lovelace, RequestedFunds, UnitValue};
use crate::state::{ErrorType, OnChainState, PaymentNextAction, PurchaseNextAction, RegistrationState};
use crate::time::TimestampMs;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum Network {
    Mainnet,
    Preprod,
}

// ============================================================================
// PaymentSource / HotWallet
// ============================================================================

/// A deployed smart-contract instance on one network.
///
/// Invariant (§3): `(network, smartContractAddress)` unique among
/// non-deleted rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSource {
    pub id: Uuid,
    pub network: Network,
    pub smart_contract_address: String,
    pub policy_id: Option<String>,
    /// 0..1000, applied as parts-per-mille.
    pub fee_rate_permille: u16,
    pub deleted_at: Option<TimestampMs>,
    pub config: PaymentSourceConfig,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

impl PaymentSource {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSourceConfig {
    pub rpc_provider_api_key: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum WalletType {
    Selling,
    Purchasing,
}

/// A server-managed wallet. Invariant (§3): scoped to exactly one
/// `PaymentSource` for its lifetime — `payment_source_id` is set at
/// creation and never reassigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HotWallet {
    pub id: Uuid,
    /// Payment key hash, hex.
    pub wallet_vkey: String,
    pub wallet_address: String,
    pub wallet_type: WalletType,
    pub payment_source_id: Uuid,
    pub encrypted_mnemonic: String,
    pub deleted_at: Option<TimestampMs>,
}

// ============================================================================
// Pricing (Agent Metadata, §3 / Glossary)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "pricingType")]
pub enum Pricing {
    Fixed(FixedPricing),
    Free,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixedPricing {
    pub amounts: Vec<UnitValue>,
}

// ============================================================================
// Transaction (§3)
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum TransactionStatus {
    Pending,
    Confirmed,
    FailedViaManualReset,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: Uuid,
    pub tx_hash: String,
    pub status: TransactionStatus,
    pub fees: Lovelace,
    pub block_height: Option<u64>,
    pub block_time: Option<TimestampMs>,
    pub previous_on_chain_state: Option<OnChainState>,
    pub new_on_chain_state: Option<OnChainState>,
    pub confirmations: u32,
    /// Persisted per §9 Design Notes; derivation is the `ChainAdapter`'s
    /// responsibility, not ours.
    pub collateral_return_lovelace: Option<Lovelace>,
    pub created_at: TimestampMs,
}

// ============================================================================
// ActionRecord (§3) — archived NextAction history for a payment or purchase
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentActionRecord {
    pub id: Uuid,
    pub requested_action: PaymentNextAction,
    pub error_type: Option<ErrorType>,
    pub error_note: Option<String>,
    pub result_hash: Option<String>,
    pub created_at: TimestampMs,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseActionRecord {
    pub id: Uuid,
    pub requested_action: PurchaseNextAction,
    pub error_type: Option<ErrorType>,
    pub error_note: Option<String>,
    pub created_at: TimestampMs,
}

// ============================================================================
// Payment (§3) — seller-side escrow record
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    pub id: Uuid,
    pub blockchain_identifier: String,
    pub agent_identifier: String,
    /// hex, 64 chars, SHA-256.
    pub input_hash: String,

    pub pay_by_time: TimestampMs,
    pub submit_result_time: TimestampMs,
    pub unlock_time: TimestampMs,
    pub external_dispute_unlock_time: TimestampMs,

    pub requested_funds: RequestedFunds,

    pub on_chain_state: Option<OnChainState>,

    pub next_action: PaymentNextAction,
    pub next_action_error_type: Option<ErrorType>,
    pub next_action_error_note: Option<String>,

    pub current_transaction_id: Option<Uuid>,
    pub transaction_history: Vec<Transaction>,

    pub withdrawn_for_seller: Vec<UnitValue>,
    pub withdrawn_for_buyer: Vec<UnitValue>,

    pub total_seller_cardano_fees: Lovelace,
    pub total_buyer_cardano_fees: Lovelace,

    pub result_hash: String,

    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
    pub next_action_last_changed_at: TimestampMs,
    pub on_chain_state_or_result_last_changed_at: TimestampMs,
    pub next_action_or_on_chain_state_or_result_last_changed_at: TimestampMs,
    pub requested_by_id: Uuid,
    pub metadata: Option<Json>,

    pub payment_source_id: Uuid,
    pub seller_wallet_id: Uuid,
}

impl Payment {
    /// §3: "logically terminated when they reach a terminal OnChainState
    /// ... with NextAction=None."
    pub fn is_logically_terminated(&self) -> bool {
        self.on_chain_state.is_some_and(OnChainState::is_terminal)
            && self.next_action == PaymentNextAction::None
    }

    /// Monotone change-timestamp helper (§5): never regress a
    /// `*LastChangedAt` column.
    pub fn bump_next_action_timestamp(&mut self, now: TimestampMs) {
        self.next_action_last_changed_at = self.next_action_last_changed_at.max(now);
        self.next_action_or_on_chain_state_or_result_last_changed_at =
            self.next_action_or_on_chain_state_or_result_last_changed_at.max(now);
        self.updated_at = self.updated_at.max(now);
    }

    pub fn bump_on_chain_state_timestamp(&mut self, now: TimestampMs) {
        self.on_chain_state_or_result_last_changed_at =
            self.on_chain_state_or_result_last_changed_at.max(now);
        self.next_action_or_on_chain_state_or_result_last_changed_at =
            self.next_action_or_on_chain_state_or_result_last_changed_at.max(now);
        self.updated_at = self.updated_at.max(now);
    }
}

// ============================================================================
// Purchase (§3) — buyer-side mirror
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub blockchain_identifier: String,
    pub agent_identifier: String,
    pub input_hash: String,

    pub pay_by_time: TimestampMs,
    pub submit_result_time: TimestampMs,
    pub unlock_time: TimestampMs,
    pub external_dispute_unlock_time: TimestampMs,

    pub paid_funds: Vec<UnitValue>,

    pub on_chain_state: Option<OnChainState>,

    pub next_action: PurchaseNextAction,
    pub next_action_error_type: Option<ErrorType>,
    pub next_action_error_note: Option<String>,

    pub current_transaction_id: Option<Uuid>,
    pub transaction_history: Vec<Transaction>,

    pub withdrawn_for_seller: Vec<UnitValue>,
    pub withdrawn_for_buyer: Vec<UnitValue>,

    pub total_seller_cardano_fees: Lovelace,
    pub total_buyer_cardano_fees: Lovelace,

    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
    pub next_action_last_changed_at: TimestampMs,
    pub on_chain_state_or_result_last_changed_at: TimestampMs,
    pub next_action_or_on_chain_state_or_result_last_changed_at: TimestampMs,
    pub requested_by_id: Uuid,
    pub metadata: Option<Json>,

    pub payment_source_id: Uuid,
    /// Cross-link to the seller wallet address observed on-chain, not a
    /// foreign key to any `Payment` row — §3: "Cross-links to a Payment
    /// only through a matching blockchainIdentifier; they are not
    /// foreign-keyed."
    pub seller_wallet_address: String,
    pub smart_contract_wallet_id: Uuid,
}

impl Purchase {
    pub fn is_logically_terminated(&self) -> bool {
        self.on_chain_state.is_some_and(OnChainState::is_terminal)
            && self.next_action == PurchaseNextAction::None
    }

    pub fn bump_next_action_timestamp(&mut self, now: TimestampMs) {
        self.next_action_last_changed_at = self.next_action_last_changed_at.max(now);
        self.next_action_or_on_chain_state_or_result_last_changed_at =
            self.next_action_or_on_chain_state_or_result_last_changed_at.max(now);
        self.updated_at = self.updated_at.max(now);
    }

    pub fn bump_on_chain_state_timestamp(&mut self, now: TimestampMs) {
        self.on_chain_state_or_result_last_changed_at =
            self.on_chain_state_or_result_last_changed_at.max(now);
        self.next_action_or_on_chain_state_or_result_last_changed_at =
            self.next_action_or_on_chain_state_or_result_last_changed_at.max(now);
        self.updated_at = self.updated_at.max(now);
    }
}

// ============================================================================
// RegistryRequest (§3, §4.7)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    pub contact_email: Option<String>,
    pub contact_other: Option<String>,
    pub organization: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Legal {
    pub privacy_policy: Option<String>,
    pub terms: Option<String>,
    pub other: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRequest {
    pub id: Uuid,
    pub state: RegistrationState,
    /// null until confirmed (§3, §4.7): `policyId ∥ assetName`.
    pub agent_identifier: Option<String>,
    pub pricing: Pricing,
    pub name: String,
    pub api_base_url: String,
    pub author: Author,
    pub legal: Option<Legal>,
    pub tags: Vec<String>,
    pub capability: Option<Json>,
    pub example_output: Option<Json>,
    pub image: Option<String>,
    pub smart_contract_wallet_id: Uuid,
    pub payment_source_id: Uuid,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
    pub next_action_last_changed_at: TimestampMs,
}
