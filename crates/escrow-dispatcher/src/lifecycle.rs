//! The Action Dispatcher's outer loop: at configurable cadence, drain
//! every claimable payment and purchase until the queue runs dry, then
//! sleep (§4.5, §5).

use crate::attempts::AttemptTracker;
use crate::dispatch::{dispatch_one_payment, dispatch_one_purchase};
use escrow_chain::ChainAdapter;
use escrow_core::time::Clock;
use escrow_store::Store;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum DispatcherLifecycle {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy)]
pub struct DispatcherConfig {
    pub interval_ms: u64,
    pub lease_duration_ms: i64,
    /// Upper bound on claims per cycle. A transient failure doesn't hold
    /// its lease across retries (the in-memory attempt counter is the
    /// only throttle we have without a lease-extension store method), so
    /// this cap keeps one persistently-failing entity from spinning the
    /// whole cycle instead of leaving room for the rest of the queue.
    pub max_claims_per_cycle: u32,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            interval_ms: 10_000,
            lease_duration_ms: 120_000,
            max_claims_per_cycle: 200,
        }
    }
}

pub struct Dispatcher {
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainAdapter>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
    attempts: AttemptTracker,
    cancel: CancellationToken,
}

impl Dispatcher {
    pub fn new(store: Arc<dyn Store>, chain: Arc<dyn ChainAdapter>, clock: Arc<dyn Clock>, config: DispatcherConfig) -> Self {
        Self {
            store,
            chain,
            clock,
            config,
            attempts: AttemptTracker::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drains the dispatch queue once: keeps claiming and submitting
    /// until both `claim_payment_for_dispatch` and
    /// `claim_purchase_for_dispatch` come back empty. Returns the number
    /// of entities processed.
    pub async fn drain_once(&self) -> u64 {
        let mut processed = 0u64;
        for _ in 0..self.config.max_claims_per_cycle {
            let payment_done = dispatch_one_payment(&self.store, &self.chain, &self.clock, &self.attempts, self.config.lease_duration_ms).await;
            let purchase_done = dispatch_one_purchase(&self.store, &self.chain, &self.clock, &self.attempts, self.config.lease_duration_ms).await;
            if payment_done {
                processed += 1;
            }
            if purchase_done {
                processed += 1;
            }
            if !payment_done && !purchase_done {
                break;
            }
        }
        processed
    }

    pub async fn run_forever(&self) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(self.config.interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("dispatcher loop received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let processed = self.drain_once().await;
                    if processed > 0 {
                        tracing::debug!(processed, "dispatcher cycle complete");
                    }
                }
            }
        }
    }

    pub fn lifecycle(&self) -> DispatcherLifecycle {
        if self.cancel.is_cancelled() {
            DispatcherLifecycle::Stopped
        } else {
            DispatcherLifecycle::Running
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}
