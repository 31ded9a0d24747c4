//! The registry dispatcher's outer loop — structurally identical to
//! `escrow_dispatcher::Dispatcher`, kept separate because it drains a
//! different claim queue (`RegistryRequest`, §4.7) with its own terminal
//! states.

use crate::dispatch::{dispatch_one_registry_request, RegistryAttempts};
use escrow_chain::ChainAdapter;
use escrow_core::time::Clock;
use escrow_store::Store;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum RegistryLifecycle {
    Stopped,
    Running,
}

#[derive(Debug, Clone, Copy)]
pub struct RegistryDispatcherConfig {
    pub interval_ms: u64,
    pub lease_duration_ms: i64,
    /// See `escrow_dispatcher::DispatcherConfig::max_claims_per_cycle` —
    /// same reasoning, same fix.
    pub max_claims_per_cycle: u32,
}

impl Default for RegistryDispatcherConfig {
    fn default() -> Self {
        Self {
            interval_ms: 15_000,
            lease_duration_ms: 120_000,
            max_claims_per_cycle: 200,
        }
    }
}

pub struct RegistryDispatcher {
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainAdapter>,
    clock: Arc<dyn Clock>,
    config: RegistryDispatcherConfig,
    attempts: RegistryAttempts,
    cancel: CancellationToken,
}

impl RegistryDispatcher {
    pub fn new(store: Arc<dyn Store>, chain: Arc<dyn ChainAdapter>, clock: Arc<dyn Clock>, config: RegistryDispatcherConfig) -> Self {
        Self {
            store,
            chain,
            clock,
            config,
            attempts: RegistryAttempts::new(),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn drain_once(&self) -> u64 {
        let mut processed = 0u64;
        for _ in 0..self.config.max_claims_per_cycle {
            if !dispatch_one_registry_request(&self.store, &self.chain, &self.clock, &self.attempts, self.config.lease_duration_ms).await {
                break;
            }
            processed += 1;
        }
        processed
    }

    pub async fn run_forever(&self) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(self.config.interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("registry dispatcher loop received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let processed = self.drain_once().await;
                    if processed > 0 {
                        tracing::debug!(processed, "registry dispatch cycle complete");
                    }
                }
            }
        }
    }

    pub fn lifecycle(&self) -> RegistryLifecycle {
        if self.cancel.is_cancelled() {
            RegistryLifecycle::Stopped
        } else {
            RegistryLifecycle::Running
        }
    }

    pub fn stop(&self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escrow_chain::MockChainAdapter;
    use escrow_core::time::FixedClock;
    use escrow_store::InMemoryStore;

    #[tokio::test]
    async fn drain_once_with_empty_queue_processes_nothing() {
        let dispatcher = RegistryDispatcher::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockChainAdapter::new()),
            Arc::new(FixedClock(1_000)),
            RegistryDispatcherConfig::default(),
        );
        assert_eq!(dispatcher.drain_once().await, 0);
    }
}
