//! Shared wiring for every command: the same `Store`/`ChainAdapter`/
//! `Clock` triple `controller`'s `main` builds, minus the HTTP listener.

use escrow_chain::{ChainAdapter, MockChainAdapter};
use escrow_core::time::{Clock, SystemClock};
use escrow_store::{InMemoryStore, PgStore, Store};
use std::sync::Arc;

pub struct Env {
    pub store: Arc<dyn Store>,
    pub chain: Arc<dyn ChainAdapter>,
    pub clock: Arc<dyn Clock>,
}

impl Env {
    /// `database_url: None` runs against a fresh, empty `InMemoryStore` —
    /// useful for smoke-testing the CLI itself, but an operator pointing
    /// this at a real deployment always passes `--database-url`.
    pub async fn connect(database_url: Option<&str>) -> anyhow::Result<Self> {
        let store: Arc<dyn Store> = match database_url {
            Some(url) => {
                let pg = PgStore::connect(url, 5).await?;
                Arc::new(pg)
            }
            None => {
                tracing::warn!("no --database-url given; operating on an empty in-memory store");
                Arc::new(InMemoryStore::new())
            }
        };
        Ok(Self {
            store,
            // The CLI never submits a chain transaction on its own — it
            // only drives the same reconcile/dispatch code paths the
            // background loops use, against whatever `ChainAdapter` a
            // production build wires in. `MockChainAdapter` stands in
            // here since this crate has no real Cardano client of its
            // own (§1: the adapter is an external collaborator).
            chain: Arc::new(MockChainAdapter::new()),
            clock: Arc::new(SystemClock),
        })
    }
}
