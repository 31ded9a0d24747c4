//! Process entry point (§5 `[EXPANSION]` Task model). Wires one
//! `Store`, one `ChainAdapter`/`Signer` pair, and `chrono::Utc`-backed
//! `Clock` into an `OrchestratorDeps`, spawns the Chain Reconciler and
//! the two Action Dispatchers (payment/purchase, registry) as
//! cancellable `tokio::task`s, and serves `escrow-api`'s router over
//! `axum::serve` — the same `#[tokio::main]` + graceful-shutdown shape
//! the teacher's own `src/controller/src/main.rs` used for the TBC
//! listener.

mod config;

use anyhow::{Context, Result};
use config::ControllerConfig;
use escrow_api::auth::AllowAllValidator;
use escrow_api::AppState;
use escrow_chain::{ChainAdapter, MockChainAdapter, MockSigner, Signer};
use escrow_core::time::{Clock, SystemClock};
use escrow_dispatcher::Dispatcher;
use escrow_orchestrator::OrchestratorDeps;
use escrow_reconciler::Reconciler;
use escrow_registry::RegistryDispatcher;
use escrow_store::{InMemoryStore, PgStore, Store};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cfg = ControllerConfig::from_env();
    tracing::info!(listen_addr = %cfg.listen_addr, has_database = cfg.database_url.is_some(), "starting escrow orchestrator controller");

    let store: Arc<dyn Store> = match &cfg.database_url {
        Some(url) => {
            let pg = PgStore::connect(url, 10).await.context("connecting to Postgres")?;
            pg.migrate().await.context("running escrow-store migrations")?;
            Arc::new(pg)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; running against an in-process InMemoryStore (state does not survive a restart)");
            Arc::new(InMemoryStore::new())
        }
    };

    // ChainAdapter/Signer are external collaborators (§1, §6) with no
    // concrete production implementation specified here; a real
    // deployment swaps these two lines for its Cardano node / chain-index
    // client and wallet-signing service without touching anything else,
    // since every downstream crate depends only on the trait objects.
    let chain: Arc<dyn ChainAdapter> = Arc::new(MockChainAdapter::new());
    let signer: Arc<dyn Signer> = Arc::new(MockSigner::new());
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let deps = OrchestratorDeps::new(store.clone(), chain.clone(), signer, clock.clone());

    let reconciler = Arc::new(Reconciler::new(store.clone(), chain.clone(), clock.clone(), cfg.reconciler));
    let dispatcher = Arc::new(Dispatcher::new(store.clone(), chain.clone(), clock.clone(), cfg.dispatcher));
    let registry_dispatcher = Arc::new(RegistryDispatcher::new(store.clone(), chain.clone(), clock.clone(), cfg.registry_dispatcher));

    let reconciler_task = {
        let reconciler = reconciler.clone();
        tokio::spawn(async move { reconciler.run_forever().await })
    };
    let dispatcher_task = {
        let dispatcher = dispatcher.clone();
        tokio::spawn(async move { dispatcher.run_forever().await })
    };
    let registry_dispatcher_task = {
        let registry_dispatcher = registry_dispatcher.clone();
        tokio::spawn(async move { registry_dispatcher.run_forever().await })
    };

    let state = AppState {
        deps,
        reconciler: reconciler.clone(),
        dispatcher: dispatcher.clone(),
        registry_dispatcher: registry_dispatcher.clone(),
        api_keys: Arc::new(AllowAllValidator),
    };

    let addr: SocketAddr = cfg.listen_addr.parse().context("parsing listen_addr")?;
    let listener = TcpListener::bind(addr).await.context("binding listen_addr")?;
    tracing::info!(addr = %listener.local_addr()?, "controller listening");

    axum::serve(listener, escrow_api::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("axum server error")?;

    // §5: the Reconciler and Dispatcher "accept a shutdown signal and
    // finish their in-flight batch before exiting" — cancel and join
    // rather than aborting them out from under a commit.
    reconciler.stop();
    dispatcher.stop();
    registry_dispatcher.stop();
    let _ = tokio::join!(reconciler_task, dispatcher_task, registry_dispatcher_task);

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    tracing::info!("shutdown signal received");
}
