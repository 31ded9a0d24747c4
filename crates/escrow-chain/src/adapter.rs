//! The `ChainAdapter` contract (§1, §6): the Cardano node / chain-index
//! collaborator. Everything here is read-only or submit-only from this
//! system's point of view — funds movement itself is computed by the
//! adapter's implementation, never recomputed from raw UTXOs by us
//! (§1 Non-goals).

use crate::error::ChainError;
use async_trait::async_trait;
use escrow_core::model::{Network, TransactionStatus};
use escrow_core::money::{Lovelace, UnitValue};
use escrow_core::state::OnChainState;
use escrow_core::time::TimestampMs;
use serde_json::Value as Json;
use uuid::Uuid;

/// The wallet currently holding a given asset unit, as read off the
/// chain index, plus its raw on-chain metadata datum (still in
/// chunked-or-atomic shape; §9's `agent_metadata` module resolves it).
#[derive(Debug, Clone)]
pub struct AssetHolder {
    pub wallet_address: String,
    /// Payment key hash, hex (28 bytes = 56 hex chars).
    pub vkey: String,
    pub metadata: Option<Json>,
}

/// One transaction the Reconciler observed touching a tracked smart
/// contract address (§4.4 step 2-3).
#[derive(Debug, Clone)]
pub struct ObservedTransaction {
    pub tx_hash: String,
    /// The blockchain identifier embedded in the on-chain datum this
    /// transaction moved, used to locate the matching Payment/Purchase
    /// (§4.4 step 3).
    pub blockchain_identifier: String,
    pub new_on_chain_state: OnChainState,
    pub block_height: u64,
    pub block_time: TimestampMs,
    pub confirmations: u32,
    pub fees: Lovelace,
    pub collateral_return_lovelace: Option<Lovelace>,
    /// Outputs relevant to computing `WithdrawnForSeller`/
    /// `WithdrawnForBuyer` once the observed state is terminal (§4.4
    /// step 4).
    pub seller_outputs: Vec<UnitValue>,
    pub buyer_outputs: Vec<UnitValue>,
}

/// The on-chain action the Action Dispatcher submits for one entity's
/// `*Requested` `NextAction` (§4.5). One variant per distinct chain
/// operation named across §4.3/§4.5/§4.7; the dispatcher maps
/// `(entity kind, NextAction variant)` to exactly one of these.
#[derive(Debug, Clone)]
pub enum ChainAction {
    LockFunds {
        payment_id: Uuid,
        blockchain_identifier: String,
    },
    AuthorizeRefund {
        payment_id: Uuid,
        blockchain_identifier: String,
    },
    SubmitResult {
        payment_id: Uuid,
        blockchain_identifier: String,
        result_hash: String,
    },
    SetRefundRequested {
        purchase_id: Uuid,
        blockchain_identifier: String,
    },
    UnsetRefundRequested {
        purchase_id: Uuid,
        blockchain_identifier: String,
    },
    MintRegistrationNft {
        registry_request_id: Uuid,
        metadata: Json,
    },
    BurnRegistrationNft {
        registry_request_id: Uuid,
        agent_identifier: String,
    },
}

/// What a successful submit returns: enough to open a new `Pending`
/// `Transaction` row (§4.5 "attach the new Transaction as
/// `CurrentTransaction` with status `Pending`").
#[derive(Debug, Clone)]
pub struct SubmittedTransaction {
    pub tx_hash: String,
    pub fees: Lovelace,
    pub status: TransactionStatus,
}

#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Resolve the current holder of `asset_unit` (`policyId ++
    /// assetNameHex`) and its on-chain metadata datum, used by
    /// CreatePayment/CreatePurchase's asset-holder resolution step
    /// (§4.3) and by the registration confirmation step (§4.7).
    async fn find_asset_holder(&self, network: Network, asset_unit: &str) -> Result<Option<AssetHolder>, ChainError>;

    /// Every transaction touching any of `addresses` committed at or
    /// after `since_ms`, up to `batch_size` entries (§4.4 step 2).
    async fn fetch_transactions_since(
        &self,
        network: Network,
        addresses: &[String],
        since_ms: TimestampMs,
        batch_size: u32,
    ) -> Result<Vec<ObservedTransaction>, ChainError>;

    /// Submit one dispatcher-driven action (§4.5). A per-call timeout is
    /// the caller's responsibility (§5 suggests 30s); this trait method
    /// itself is just the request/response shape.
    async fn submit_action(&self, network: Network, action: ChainAction) -> Result<SubmittedTransaction, ChainError>;
}
