//! The Reconciler's outer loop (§4.4 steps 1-6): wake up every
//! `interval_ms`, poll every non-deleted `PaymentSource` on both its
//! payment and purchase cursors, and keep running until asked to stop.

use crate::config::ReconcilerConfig;
use crate::reconcile::{reconcile_payments, reconcile_purchases};
use crate::stats::{ReconcilerStats, SourceCursors};
use escrow_chain::ChainAdapter;
use escrow_core::time::Clock;
use escrow_store::{ReconcilerCursorKind, Store};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Reports `{Stopped, Running}` the way §4.4 step 6 asks `/monitoring`
/// endpoints to expose reconciler health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ReconcilerLifecycle {
    Stopped,
    Running,
}

pub struct Reconciler {
    store: Arc<dyn Store>,
    chain: Arc<dyn ChainAdapter>,
    clock: Arc<dyn Clock>,
    config: ReconcilerConfig,
    tracked_entities: AtomicU64,
    cancel: CancellationToken,
}

impl Reconciler {
    pub fn new(store: Arc<dyn Store>, chain: Arc<dyn ChainAdapter>, clock: Arc<dyn Clock>, config: ReconcilerConfig) -> Self {
        Self {
            store,
            chain,
            clock,
            config,
            tracked_entities: AtomicU64::new(0),
            cancel: CancellationToken::new(),
        }
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Runs one full cycle over every active `PaymentSource` and returns
    /// the stats snapshot §4.4 step 6 specifies. Exposed separately from
    /// `run_forever` so tests and a manual "reconcile now" CLI command
    /// can trigger a single pass without spinning up the loop.
    pub async fn run_once(&self) -> ReconcilerStats {
        let sources = self.store.list_active_payment_sources().await.unwrap_or_default();
        let mut cursors = Vec::with_capacity(sources.len());

        for source in &sources {
            let addresses = [source.smart_contract_address.clone()];

            let payment_outcome = reconcile_payments(
                &self.store,
                &self.chain,
                &self.clock,
                source.network,
                source.id,
                &addresses,
                self.config.batch_size,
            )
            .await;
            let purchase_outcome = reconcile_purchases(
                &self.store,
                &self.chain,
                &self.clock,
                source.network,
                source.id,
                &addresses,
                self.config.batch_size,
            )
            .await;

            let payment_cursor = self
                .store
                .get_reconciler_cursor(source.id, ReconcilerCursorKind::Payment)
                .await
                .unwrap_or(None);
            let purchase_cursor = self
                .store
                .get_reconciler_cursor(source.id, ReconcilerCursorKind::Purchase)
                .await
                .unwrap_or(None);
            cursors.push(SourceCursors {
                payment_source_id: source.id,
                payment_cursor,
                purchase_cursor,
            });

            match payment_outcome {
                Ok(outcome) => {
                    self.tracked_entities.fetch_add(outcome.accepted + outcome.flagged, Ordering::Relaxed);
                    if outcome.unmatched > 0 {
                        tracing::warn!(payment_source_id = %source.id, unmatched = outcome.unmatched, "payment observations with no matching row");
                    }
                }
                Err(err) => tracing::error!(payment_source_id = %source.id, error = %err, "payment reconciliation cycle failed"),
            }
            match purchase_outcome {
                Ok(outcome) => {
                    self.tracked_entities.fetch_add(outcome.accepted + outcome.flagged, Ordering::Relaxed);
                    if outcome.unmatched > 0 {
                        tracing::warn!(payment_source_id = %source.id, unmatched = outcome.unmatched, "purchase observations with no matching row");
                    }
                }
                Err(err) => tracing::error!(payment_source_id = %source.id, error = %err, "purchase reconciliation cycle failed"),
            }
        }

        ReconcilerStats {
            tracked_entities: self.tracked_entities.load(Ordering::Relaxed),
            memory_usage: cursors.len(),
            cursors,
        }
    }

    pub fn stats_snapshot(&self, cursors: Vec<SourceCursors>) -> ReconcilerStats {
        ReconcilerStats {
            tracked_entities: self.tracked_entities.load(Ordering::Relaxed),
            memory_usage: cursors.len(),
            cursors,
        }
    }

    /// Runs `run_once` every `interval_ms` until `cancellation_token()` is
    /// cancelled, e.g. from the controller's shutdown signal handler.
    pub async fn run_forever(&self) {
        let mut ticker = tokio::time::interval(std::time::Duration::from_millis(self.config.interval_ms));
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::info!("reconciler loop received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    let stats = self.run_once().await;
                    tracing::debug!(tracked_entities = stats.tracked_entities, sources = stats.cursors.len(), "reconciler cycle complete");
                }
            }
        }
    }

    pub fn lifecycle(&self) -> ReconcilerLifecycle {
        if self.cancel.is_cancelled() {
            ReconcilerLifecycle::Stopped
        } else {
            ReconcilerLifecycle::Running
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
    async fn run_once_with_no_sources_returns_empty_stats() {
        let reconciler = Reconciler::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockChainAdapter::new()),
            Arc::new(FixedClock(1_000)),
            ReconcilerConfig::default(),
        );
        let stats = reconciler.run_once().await;
        assert_eq!(stats.tracked_entities, 0);
        assert!(stats.cursors.is_empty());
    }

    #[test]
    fn stop_flips_lifecycle_to_stopped() {
        let reconciler = Reconciler::new(
            Arc::new(InMemoryStore::new()),
            Arc::new(MockChainAdapter::new()),
            Arc::new(FixedClock(1_000)),
            ReconcilerConfig::default(),
        );
        assert_eq!(reconciler.lifecycle(), ReconcilerLifecycle::Running);
        reconciler.stop();
        assert_eq!(reconciler.lifecycle(), ReconcilerLifecycle::Stopped);
    }
}
