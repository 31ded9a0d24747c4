//! Wiring for the orchestrator's external collaborators.
//!
//! `escrow-api` and `escrow-cli` construct one `OrchestratorDeps` at
//! startup and share it (cheaply, via `Arc`) across every request
//! handler and background task — mirroring the teacher's
//! `Controller { config }` shape but generalized to the set of
//! collaborators this system actually needs (§1, §5).

use escrow_chain::{ChainAdapter, Signer};
use escrow_core::time::Clock;
use escrow_store::Store;
use std::sync::Arc;

#[derive(Clone)]
pub struct OrchestratorDeps {
    pub store: Arc<dyn Store>,
    pub chain: Arc<dyn ChainAdapter>,
    pub signer: Arc<dyn Signer>,
    pub clock: Arc<dyn Clock>,
}

impl OrchestratorDeps {
    pub fn new(store: Arc<dyn Store>, chain: Arc<dyn ChainAdapter>, signer: Arc<dyn Signer>, clock: Arc<dyn Clock>) -> Self {
        Self { store, chain, signer, clock }
    }

    pub fn now(&self) -> escrow_core::time::TimestampMs {
        self.clock.now_ms()
    }
}
