//! The operator CLI (§2 component map, `[EXPANSION]`): one-shot and
//! watch-mode access to the `/monitoring/*` surface (§6) and read-only
//! payment lookups, without standing up the HTTP API.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::monitor::MonitorArgs;
use commands::payment::PaymentListArgs;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "escrow-cli", about = "Operator CLI for the escrow orchestrator")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reconciler / dispatcher / registry-dispatcher cycle control.
    Monitor(MonitorArgs),
    /// Payment listing.
    Payment {
        #[command(subcommand)]
        command: PaymentCommand,
    },
}

#[derive(Subcommand)]
enum PaymentCommand {
    List(PaymentListArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let cli = Cli::parse();
    match cli.command {
        Command::Monitor(args) => commands::monitor::handle_monitor(args).await,
        Command::Payment { command: PaymentCommand::List(args) } => commands::payment::handle_payment_list(args).await,
    }
}
