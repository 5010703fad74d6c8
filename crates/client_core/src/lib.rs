use std::sync::Arc;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use shared::{
    domain::{Event, EventSummary, Ticket},
    error::RegistryError,
};
use tokio::sync::broadcast;
use tracing::{info, warn};

pub mod cache;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod refresh;
pub mod registry;
pub mod rpc;
pub mod summary;
pub mod views;

pub use config::{load_settings, MintPricePolicy, Settings, ValidatedSettings};
pub use coordinator::{
    CreateEventForm, MintTicketForm, Notice, NoticeTone, TransactionCoordinator, TxCommand,
    TxPhase,
};
pub use error::{CommandError, ConfigError, ValidationError};
pub use ledger::LedgerReader;
pub use refresh::RefreshController;
pub use registry::{MissingRegistry, RegistryClient};
pub use rpc::JsonRpcRegistry;
pub use summary::{summarize, summarize_now};

#[derive(Debug, Clone)]
pub enum ClientEvent {
    EventsUpdated {
        events: Arc<Vec<Event>>,
        summary: EventSummary,
    },
    TicketsUpdated {
        owner: Address,
        tickets: Arc<Vec<Ticket>>,
    },
    CommandSettled(TxPhase),
    RefreshRequested {
        token: u64,
    },
    Error(String),
}

/// Everything a front end needs: cached reads, derived summary, and the two write commands.
pub struct TicketingClient {
    registry: Arc<dyn RegistryClient>,
    refresh: Arc<RefreshController>,
    reader: Arc<LedgerReader>,
    coordinator: TransactionCoordinator,
    chain_id: u64,
    events: broadcast::Sender<ClientEvent>,
}

impl TicketingClient {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        refresh: Arc<RefreshController>,
        chain_id: u64,
        mint_price_policy: MintPricePolicy,
    ) -> Self {
        let reader = Arc::new(LedgerReader::new(
            Arc::clone(&registry),
            Arc::clone(&refresh),
            Some(chain_id),
        ));
        let coordinator = TransactionCoordinator::new(
            Arc::clone(&registry),
            Arc::clone(&reader),
            Arc::clone(&refresh),
            mint_price_policy,
        );
        let (events, _) = broadcast::channel(1024);
        Self {
            registry,
            refresh,
            reader,
            coordinator,
            chain_id,
            events,
        }
    }

    /// Builds a client from validated settings, checking the node's chain id and
    /// discovering the identity.
    pub async fn connect(settings: &ValidatedSettings) -> Result<Self> {
        let refresh = RefreshController::global();
        let Some(address) = settings.registry_address else {
            warn!("client: no registry address; reads return nothing and writes are refused");
            return Ok(Self::new(
                Arc::new(MissingRegistry),
                refresh,
                settings.chain_id,
                settings.mint_price_policy,
            ));
        };

        let mut registry = JsonRpcRegistry::new(settings.rpc_url.clone(), address)
            .with_poll_interval(settings.receipt_poll_interval);
        if let Some(sender) = settings.sender {
            registry = registry.with_sender(sender);
        }

        let actual = registry
            .chain_id()
            .await
            .with_context(|| format!("failed to reach rpc endpoint {}", settings.rpc_url))?;
        if actual != settings.chain_id {
            return Err(ConfigError::ChainMismatch {
                expected: settings.chain_id,
                actual,
            }
            .into());
        }

        let identity = match settings.sender {
            Some(sender) => Some(sender),
            None => match registry.accounts().await {
                Ok(accounts) => accounts.into_iter().next(),
                Err(err) => {
                    warn!("client: could not list node accounts, no identity: {err}");
                    None
                }
            },
        };
        info!(
            "client: connected rpc={} registry={address} chain={actual} identity={identity:?}",
            settings.rpc_url
        );

        let client = Self::new(
            Arc::new(registry),
            refresh,
            settings.chain_id,
            settings.mint_price_policy,
        );
        client.coordinator.set_identity(identity).await;
        Ok(client)
    }

    pub fn is_configured(&self) -> bool {
        self.registry.is_configured()
    }

    pub fn chain_id(&self) -> u64 {
        self.chain_id
    }

    pub fn reader(&self) -> &Arc<LedgerReader> {
        &self.reader
    }

    pub fn coordinator(&self) -> &TransactionCoordinator {
        &self.coordinator
    }

    pub fn refresh_controller(&self) -> &Arc<RefreshController> {
        &self.refresh
    }

    pub async fn identity(&self) -> Option<Address> {
        self.coordinator.identity().await
    }

    pub async fn set_identity(&self, identity: Option<Address>) {
        self.coordinator.set_identity(identity).await;
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<ClientEvent> {
        self.events.subscribe()
    }

    pub async fn events(&self) -> Result<Arc<Vec<Event>>, RegistryError> {
        match self.reader.list_events().await {
            Ok(events) => {
                let summary = summarize_now(&events);
                let _ = self.events.send(ClientEvent::EventsUpdated {
                    events: Arc::clone(&events),
                    summary,
                });
                Ok(events)
            }
            Err(err) => {
                let _ = self.events.send(ClientEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    /// Event list for labelling tickets; never fails and falls back to the last good listing.
    pub async fn events_or_cached(&self) -> Arc<Vec<Event>> {
        match self.events().await {
            Ok(events) => events,
            Err(err) => {
                warn!("client: event listing failed, using cached events: {err}");
                self.reader.cached_events().await.unwrap_or_default()
            }
        }
    }

    /// Tickets for `owner`, or for the connected identity when `owner` is `None`.
    pub async fn owner_tickets(
        &self,
        owner: Option<Address>,
    ) -> Result<Arc<Vec<Ticket>>, RegistryError> {
        let owner = match owner {
            Some(owner) => owner,
            None => match self.identity().await {
                Some(identity) => identity,
                None => return Ok(Arc::new(Vec::new())),
            },
        };

        match self.reader.list_owner_tickets(owner).await {
            Ok(tickets) => {
                let _ = self.events.send(ClientEvent::TicketsUpdated {
                    owner,
                    tickets: Arc::clone(&tickets),
                });
                Ok(tickets)
            }
            Err(err) => {
                let _ = self.events.send(ClientEvent::Error(err.to_string()));
                Err(err)
            }
        }
    }

    pub async fn summary(&self) -> Result<EventSummary, RegistryError> {
        let events = self.events().await?;
        Ok(summarize_now(&events))
    }

    pub async fn create_event(&self, form: &mut CreateEventForm) -> TxPhase {
        let outcome = self.coordinator.create_event(form).await;
        let _ = self.events.send(ClientEvent::CommandSettled(outcome.clone()));
        outcome
    }

    pub async fn mint_ticket(&self, form: &MintTicketForm) -> TxPhase {
        let outcome = self.coordinator.mint_ticket(form).await;
        let _ = self.events.send(ClientEvent::CommandSettled(outcome.clone()));
        outcome
    }

    /// Manual refresh: invalidates every cached read.
    pub fn refresh(&self) -> u64 {
        let token = self.refresh.bump();
        let _ = self.events.send(ClientEvent::RefreshRequested { token });
        token
    }
}

#[cfg(test)]
#[path = "tests/test_support.rs"]
mod test_support;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
