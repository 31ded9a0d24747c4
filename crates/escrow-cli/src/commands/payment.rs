//! `escrow-cli payment list` — the read-only operator equivalent of
//! `GET /payment` (§6), for scripting and incident response without
//! going through the HTTP surface.

use super::env::Env;
use anyhow::{bail, Result};
use clap::Args;
use escrow_core::model::Network;
use escrow_store::ListFilter;

#[derive(Args)]
pub struct PaymentListArgs {
    #[arg(long)]
    database_url: Option<String>,

    /// `mainnet` or `preprod`.
    #[arg(long)]
    network: String,

    #[arg(long)]
    smart_contract_address: Option<String>,

    #[arg(long, default_value_t = 20)]
    limit: u32,
}

fn parse_network(s: &str) -> Result<Network> {
    match s.to_ascii_lowercase().as_str() {
        "mainnet" => Ok(Network::Mainnet),
        "preprod" => Ok(Network::Preprod),
        other => bail!("unknown network '{other}', expected 'mainnet' or 'preprod'"),
    }
}

pub async fn handle_payment_list(args: PaymentListArgs) -> Result<()> {
    let env = Env::connect(args.database_url.as_deref()).await?;
    let network = parse_network(&args.network)?;

    let filter = ListFilter {
        network: Some(network),
        smart_contract_address: args.smart_contract_address,
        on_chain_state_category: None,
        search_query: None,
        include_history: false,
        cursor_id: None,
        limit: args.limit.min(100),
    };
    let payments = env.store.list_payments(&filter).await?;
    println!("{}", serde_json::to_string_pretty(&payments)?);
    Ok(())
}
