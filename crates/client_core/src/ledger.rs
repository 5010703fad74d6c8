use std::sync::Arc;

use alloy_primitives::Address;
use futures::future::try_join_all;
use shared::{
    domain::{Event, EventId, Ticket, TicketId},
    error::RegistryError,
};
use tracing::{debug, warn};

use crate::{
    cache::{Fetched, QueryCache, QueryKey, QueryKind, QuerySnapshot, SlotId},
    refresh::RefreshController,
    registry::RegistryClient,
};

/// Reads events and tickets from the registry through a keyed query cache.
pub struct LedgerReader {
    registry: Arc<dyn RegistryClient>,
    refresh: Arc<RefreshController>,
    chain_id: Option<u64>,
    events: QueryCache<Vec<Event>>,
    tickets: QueryCache<Vec<Ticket>>,
}

impl LedgerReader {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        refresh: Arc<RefreshController>,
        chain_id: Option<u64>,
    ) -> Self {
        Self {
            events: QueryCache::watching(refresh.subscribe()),
            tickets: QueryCache::watching(refresh.subscribe()),
            registry,
            refresh,
            chain_id,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.registry.is_configured()
    }

    pub fn events_key(&self) -> QueryKey {
        QueryKey::events(self.refresh.current(), self.chain_id)
    }

    pub fn owner_tickets_key(&self, owner: Address) -> QueryKey {
        QueryKey::owner_tickets(self.refresh.current(), self.chain_id, owner)
    }

    /// All populated events ordered by ascending id.
    pub async fn list_events(&self) -> Result<Arc<Vec<Event>>, RegistryError> {
        if !self.is_configured() {
            return Ok(Arc::new(Vec::new()));
        }

        loop {
            let key = self.events_key();
            let registry = Arc::clone(&self.registry);
            let fetched = self
                .events
                .fetch(key, move || async move { fetch_events(registry.as_ref()).await })
                .await
                .inspect_err(|err| warn!("ledger: event listing failed: {err}"))?;
            match fetched {
                Fetched::Fresh(events) | Fetched::Cached(events) => return Ok(events),
                Fetched::Superseded => continue,
            }
        }
    }

    /// Tickets held by `owner`, in the order the registry reports them.
    pub async fn list_owner_tickets(
        &self,
        owner: Address,
    ) -> Result<Arc<Vec<Ticket>>, RegistryError> {
        if !self.is_configured() {
            return Ok(Arc::new(Vec::new()));
        }

        loop {
            let key = self.owner_tickets_key(owner);
            let registry = Arc::clone(&self.registry);
            let fetched = self
                .tickets
                .fetch(key, move || async move {
                    fetch_owner_tickets(registry.as_ref(), owner).await
                })
                .await
                .inspect_err(|err| warn!("ledger: ticket listing failed owner={owner}: {err}"))?;
            match fetched {
                Fetched::Fresh(tickets) | Fetched::Cached(tickets) => return Ok(tickets),
                Fetched::Superseded => continue,
            }
        }
    }

    pub async fn get_event(&self, event_id: EventId) -> Result<Event, RegistryError> {
        self.registry.get_event(event_id).await
    }

    pub async fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, RegistryError> {
        self.registry.get_ticket(ticket_id).await
    }

    /// Most recently fetched event list, even if it has since gone stale or failed to refresh.
    pub async fn cached_events(&self) -> Option<Arc<Vec<Event>>> {
        self.events_snapshot().await.data
    }

    pub async fn events_snapshot(&self) -> QuerySnapshot<Vec<Event>> {
        self.events
            .snapshot(SlotId {
                kind: QueryKind::Events,
                owner: None,
            })
            .await
    }

    pub async fn tickets_snapshot(&self, owner: Address) -> QuerySnapshot<Vec<Ticket>> {
        self.tickets
            .snapshot(SlotId {
                kind: QueryKind::OwnerTickets,
                owner: Some(owner),
            })
            .await
    }
}

async fn fetch_events(registry: &dyn RegistryClient) -> Result<Vec<Event>, RegistryError> {
    let total = registry.total_events().await?;
    if total == 0 {
        return Ok(Vec::new());
    }

    debug!("ledger: fetching {total} events");
    let events = try_join_all((1..=total).map(|id| registry.get_event(EventId(id)))).await?;
    Ok(events
        .into_iter()
        .filter(|event| !event.event_id.is_sentinel())
        .collect())
}

async fn fetch_owner_tickets(
    registry: &dyn RegistryClient,
    owner: Address,
) -> Result<Vec<Ticket>, RegistryError> {
    let ticket_ids = registry.get_owner_tickets(owner).await?;
    if ticket_ids.is_empty() {
        return Ok(Vec::new());
    }

    debug!("ledger: fetching {} tickets owner={owner}", ticket_ids.len());
    try_join_all(ticket_ids.into_iter().map(|id| registry.get_ticket(id))).await
}

#[cfg(test)]
#[path = "tests/ledger_tests.rs"]
mod tests;
