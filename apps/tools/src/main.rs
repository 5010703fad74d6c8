use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use alloy_primitives::Address;
use anyhow::{anyhow, bail, Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use client_core::{
    CreateEventForm, JsonRpcRegistry, MintPricePolicy, MintTicketForm, RefreshController,
    RegistryClient, TicketingClient, TxPhase,
};
use shared::domain::TicketId;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

const DEPLOYMENT_FILE: &str = "ignition/deployments/chain-31337/deployed_addresses.json";
const DEPLOYMENT_KEYS: [&str; 2] = ["EventTicketModule#EventTicket", "eventTicket"];

#[derive(Parser, Debug)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Exercise a freshly deployed registry on a local dev node end to end.
    CheckLocalNode {
        #[arg(long, env = "LOCAL_RPC_URL", default_value = "http://127.0.0.1:8545")]
        rpc_url: String,
        #[arg(long, default_value = DEPLOYMENT_FILE)]
        deployments: PathBuf,
    },
}

fn deployed_registry_address(path: &Path) -> Result<Address> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read deployment file {}", path.display()))?;
    let deployed: HashMap<String, String> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse deployment file {}", path.display()))?;
    let address = DEPLOYMENT_KEYS
        .iter()
        .find_map(|key| deployed.get(*key))
        .ok_or_else(|| anyhow!("no EventTicket address in {}", path.display()))?;
    Address::from_str(address).with_context(|| format!("invalid registry address {address}"))
}

fn settled(step: &str, outcome: TxPhase) -> Result<()> {
    match outcome {
        TxPhase::Succeeded { tx_hash, .. } => {
            println!("{step}: ok (tx {tx_hash})");
            Ok(())
        }
        TxPhase::Failed { message, .. } => bail!("{step} failed: {message}"),
        other => bail!("{step} ended in unexpected state {other:?}"),
    }
}

async fn check_local_node(rpc_url: &str, deployments: &Path) -> Result<()> {
    let address = deployed_registry_address(deployments)?;
    let rpc_url = Url::parse(rpc_url).with_context(|| format!("invalid rpc url {rpc_url}"))?;
    let registry = Arc::new(JsonRpcRegistry::new(rpc_url, address));

    let chain_id = registry.chain_id().await?;
    let account = registry
        .accounts()
        .await?
        .into_iter()
        .next()
        .context("node exposes no accounts")?;
    info!("tools: registry={address} chain={chain_id} account={account}");

    println!("Contract name: {}", registry.contract_name().await?);

    let client = TicketingClient::new(
        registry.clone(),
        Arc::new(RefreshController::new()),
        chain_id,
        MintPricePolicy::Resolve,
    );
    client.set_identity(Some(account)).await;

    let mut form = CreateEventForm {
        name: "Local Dev Day".into(),
        description: "Smoke test event".into(),
        venue: "Localhost".into(),
        date: (Utc::now() + Duration::days(1)).to_rfc3339(),
        total_tickets: "5".into(),
        price: "0.05".into(),
    };
    settled("create event", client.create_event(&mut form).await)?;
    println!("Total events: {}", registry.total_events().await?);

    client.events().await?;
    let mint = MintTicketForm {
        event_id: "1".into(),
        recipient: account.to_string(),
    };
    settled("mint ticket", client.mint_ticket(&mint).await)?;

    let owned: Vec<String> = registry
        .get_owner_tickets(account)
        .await?
        .into_iter()
        .map(|TicketId(id)| id.to_string())
        .collect();
    println!("Owned tickets: [{}]", owned.join(", "));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Command::CheckLocalNode {
            rpc_url,
            deployments,
        } => check_local_node(&rpc_url, &deployments).await,
    }
}
