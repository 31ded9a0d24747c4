//! `escrow-cli monitor` — the operator-facing equivalent of
//! `GET /monitoring` and the `trigger-cycle`/`stop` routes (§6), run
//! directly against the store instead of over HTTP.

use super::env::Env;
use anyhow::Result;
use clap::{Args, Subcommand};
use escrow_dispatcher::{Dispatcher, DispatcherConfig};
use escrow_reconciler::{Reconciler, ReconcilerConfig};
use escrow_registry::{RegistryDispatcher, RegistryDispatcherConfig};
use std::time::Duration;
use tracing::info;

#[derive(Args)]
pub struct MonitorArgs {
    /// Postgres connection string; omit to run against a scratch
    /// in-memory store (nothing to reconcile or dispatch).
    #[arg(long)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: MonitorCommand,
}

#[derive(Subcommand)]
enum MonitorCommand {
    /// Run one reconciler cycle and print the resulting stats (§4.4 step 6).
    ReconcileOnce,
    /// Run one dispatcher drain pass and print how many entities it processed (§4.5).
    DispatchOnce,
    /// Run one registration-dispatcher drain pass (§4.7).
    DispatchRegistryOnce,
    /// Loop reconcile+dispatch+dispatch-registry every `--interval-secs`
    /// until interrupted, printing a status line per cycle — the CLI
    /// equivalent of running the background singletons attended.
    Watch {
        #[arg(long, default_value_t = 30)]
        interval_secs: u64,
    },
}

pub async fn handle_monitor(args: MonitorArgs) -> Result<()> {
    let env = Env::connect(args.database_url.as_deref()).await?;

    match args.command {
        MonitorCommand::ReconcileOnce => {
            let reconciler = Reconciler::new(env.store, env.chain, env.clock, ReconcilerConfig::default());
            let stats = reconciler.run_once().await;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        MonitorCommand::DispatchOnce => {
            let dispatcher = Dispatcher::new(env.store, env.chain, env.clock, DispatcherConfig::default());
            let processed = dispatcher.drain_once().await;
            println!("{{\"processed\": {processed}}}");
        }
        MonitorCommand::DispatchRegistryOnce => {
            let dispatcher = RegistryDispatcher::new(env.store, env.chain, env.clock, RegistryDispatcherConfig::default());
            let processed = dispatcher.drain_once().await;
            println!("{{\"processed\": {processed}}}");
        }
        MonitorCommand::Watch { interval_secs } => {
            info!(interval_secs, "watching reconciler + dispatcher + registry dispatcher");
            println!("Press Ctrl+C to stop");
            let reconciler = Reconciler::new(env.store.clone(), env.chain.clone(), env.clock.clone(), ReconcilerConfig::default());
            let dispatcher = Dispatcher::new(env.store.clone(), env.chain.clone(), env.clock.clone(), DispatcherConfig::default());
            let registry_dispatcher = RegistryDispatcher::new(env.store, env.chain, env.clock, RegistryDispatcherConfig::default());
            loop {
                let stats = reconciler.run_once().await;
                let dispatched = dispatcher.drain_once().await;
                let registry_dispatched = registry_dispatcher.drain_once().await;
                println!(
                    "tracked_entities={} dispatched={} registry_dispatched={}",
                    stats.tracked_entities, dispatched, registry_dispatched
                );
                tokio::time::sleep(Duration::from_secs(interval_secs)).await;
            }
        }
    }

    Ok(())
}
