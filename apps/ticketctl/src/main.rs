use std::{path::PathBuf, process::ExitCode, str::FromStr, time::Duration};

use alloy_primitives::Address;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    load_settings,
    views::{EventRow, SummaryView, TicketCard},
    CreateEventForm, MintTicketForm, TicketingClient, TxPhase, ValidatedSettings,
};
use shared::domain::EventSummary;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ticketctl", about = "Inspect and operate an on-chain event ticket registry")]
struct Cli {
    /// TOML settings file; defaults to ./ticketing.toml when present.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    #[arg(long, global = true)]
    rpc_url: Option<String>,
    #[arg(long, global = true)]
    registry_address: Option<String>,
    #[arg(long, global = true)]
    chain_id: Option<u64>,
    /// Account the node signs writes with; defaults to its first account.
    #[arg(long, global = true)]
    sender: Option<String>,
    /// Print listings as JSON.
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Summary,
    Events,
    Tickets {
        #[arg(long)]
        owner: Option<String>,
    },
    CreateEvent {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        venue: String,
        /// RFC 3339, `YYYY-MM-DDTHH:MM` (local time) or `YYYY-MM-DD`.
        #[arg(long)]
        date: String,
        #[arg(long)]
        supply: String,
        /// Ticket price in ETH, e.g. 0.05.
        #[arg(long)]
        price: String,
    },
    Mint {
        #[arg(long)]
        event_id: String,
        #[arg(long, default_value = "")]
        recipient: String,
    },
    Watch {
        #[arg(long, default_value_t = 15)]
        interval_secs: u64,
    },
}

fn resolve_settings(cli: &Cli) -> Result<ValidatedSettings> {
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(rpc_url) = &cli.rpc_url {
        settings.rpc_url = rpc_url.clone();
    }
    if let Some(address) = &cli.registry_address {
        settings.registry_address = Some(address.clone());
    }
    if let Some(chain_id) = cli.chain_id {
        settings.chain_id = chain_id;
    }
    if let Some(sender) = &cli.sender {
        settings.sender = Some(sender.clone());
    }
    Ok(settings.validate()?)
}

fn print_summary(summary: EventSummary) {
    let view = SummaryView::from(summary);
    println!("Active events   {}", view.summary.active_event_count);
    println!("Tickets sold    {}", view.sales_helper);
    println!("Upcoming        {}", view.schedule_helper);
}

fn print_event(row: &EventRow) {
    let event = &row.event;
    let date = event
        .starts_at()
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".into());
    let inactive = if row.is_inactive() { "  [inactive]" } else { "" };
    println!(
        "#{:<4} {}  @ {}  {}  {} ETH  {}/{} sold ({}%){inactive}",
        event.event_id.0,
        event.name,
        event.venue,
        date,
        row.price_text,
        event.tickets_sold,
        event.total_tickets,
        row.sold_pct,
    );
}

fn print_ticket(card: &TicketCard) {
    let bought = card
        .ticket
        .purchased_at()
        .map(|at| at.format("%Y-%m-%d %H:%M UTC").to_string())
        .unwrap_or_else(|| "-".into());
    println!(
        "ticket #{:<4} {} (event #{})  paid {} ETH on {}  {}",
        card.ticket.ticket_id.0,
        card.event_name,
        card.ticket.event_id,
        card.paid_text,
        bought,
        card.validity_label(),
    );
}

fn report(outcome: &TxPhase) -> ExitCode {
    match outcome {
        TxPhase::Succeeded {
            tx_hash,
            block_number,
            ..
        } => {
            if let Some(notice) = outcome.notice() {
                println!("{}", notice.label);
            }
            match block_number {
                Some(block) => println!("tx {tx_hash} in block {block}"),
                None => println!("tx {tx_hash}"),
            }
            ExitCode::SUCCESS
        }
        TxPhase::Failed { message, .. } => {
            eprintln!("{message}");
            ExitCode::FAILURE
        }
        other => {
            eprintln!("command ended in unexpected state {other:?}");
            ExitCode::FAILURE
        }
    }
}

async fn watch(client: &TicketingClient, interval: Duration) -> Result<()> {
    let mut ticker = tokio::time::interval(interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let token = client.refresh();
                match client.summary().await {
                    Ok(summary) => {
                        println!("--- refresh {token}");
                        print_summary(summary);
                    }
                    Err(err) => eprintln!("refresh {token} failed: {err}"),
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for ctrl-c")?;
                info!("ticketctl: watch stopped");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let settings = resolve_settings(&cli)?;
    let client = TicketingClient::connect(&settings).await?;

    match cli.command {
        Command::Summary => {
            let summary = client.summary().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                print_summary(summary);
            }
        }
        Command::Events => {
            let events = client.events().await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(events.as_ref())?);
            } else if events.is_empty() {
                println!("No events yet.");
            } else {
                for event in events.iter() {
                    print_event(&EventRow::new(event));
                }
            }
        }
        Command::Tickets { owner } => {
            let owner = owner
                .as_deref()
                .map(Address::from_str)
                .transpose()
                .context("invalid --owner address")?;
            if owner.is_none() && client.identity().await.is_none() {
                eprintln!("No connected identity; pass --owner.");
                return Ok(ExitCode::FAILURE);
            }
            let events = client.events_or_cached().await;
            let tickets = client.owner_tickets(owner).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(tickets.as_ref())?);
            } else if tickets.is_empty() {
                println!("No tickets owned.");
            } else {
                for ticket in tickets.iter() {
                    print_ticket(&TicketCard::new(ticket, &events));
                }
            }
        }
        Command::CreateEvent {
            name,
            description,
            venue,
            date,
            supply,
            price,
        } => {
            let mut form = CreateEventForm {
                name,
                description,
                venue,
                date,
                total_tickets: supply,
                price,
            };
            return Ok(report(&client.create_event(&mut form).await));
        }
        Command::Mint {
            event_id,
            recipient,
        } => {
            let form = MintTicketForm {
                event_id,
                recipient,
            };
            if let Err(err) = client.events().await {
                warn!("ticketctl: could not warm the event list before minting: {err}");
            }
            return Ok(report(&client.mint_ticket(&form).await));
        }
        Command::Watch { interval_secs } => {
            watch(&client, Duration::from_secs(interval_secs.max(1))).await?;
        }
    }

    Ok(ExitCode::SUCCESS)
}
