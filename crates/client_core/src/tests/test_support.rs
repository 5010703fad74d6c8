use std::{collections::HashMap, sync::Mutex};

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use shared::{
    domain::{Event, EventId, Ticket, TicketId},
    error::RegistryError,
};
use tokio::sync::oneshot;

use crate::registry::{
    CreateEventCall, MintTicketCall, PendingTransaction, RegistryClient, TransactionReceipt,
};

pub(crate) fn creator() -> Address {
    Address::repeat_byte(0x11)
}

pub(crate) fn sample_event(id: u64, price: U256) -> Event {
    Event {
        event_id: EventId(id),
        name: format!("Event {id}"),
        description: "fixture".into(),
        event_date: 1_900_000_000 + id,
        venue: "Hall".into(),
        creator: creator(),
        total_tickets: 10,
        tickets_sold: 0,
        price,
        is_active: true,
    }
}

fn sentinel_event() -> Event {
    Event {
        event_id: EventId::NOT_FOUND,
        name: String::new(),
        description: String::new(),
        event_date: 0,
        venue: String::new(),
        creator: Address::ZERO,
        total_tickets: 0,
        tickets_sold: 0,
        price: U256::ZERO,
        is_active: false,
    }
}

fn sentinel_ticket() -> Ticket {
    Ticket {
        ticket_id: TicketId(0),
        event_id: EventId::NOT_FOUND,
        owner: Address::ZERO,
        purchase_price: U256::ZERO,
        purchase_time: 0,
        is_valid: false,
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CallCounts {
    pub total_events: u32,
    pub get_event: u32,
    pub get_owner_tickets: u32,
    pub get_ticket: u32,
    pub create_event: u32,
    pub mint_ticket: u32,
    pub wait_for_inclusion: u32,
}

impl CallCounts {
    pub fn writes(&self) -> u32 {
        self.create_event + self.mint_ticket
    }
}

enum PendingWrite {
    Create(CreateEventCall),
    Mint(MintTicketCall),
}

struct Stall {
    entered: oneshot::Sender<u64>,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
struct FakeState {
    events: Vec<Event>,
    tickets: Vec<Ticket>,
    pending: HashMap<B256, PendingWrite>,
    next_tx: u64,
    calls: CallCounts,
    minted: Vec<MintTicketCall>,
    fail_reads: Option<RegistryError>,
    fail_event: Option<EventId>,
    fail_submit: Option<RegistryError>,
    fail_inclusion: Option<RegistryError>,
    stall_total_events: Option<Stall>,
    stall_submit: Option<Stall>,
}

/// In-memory registry that applies writes when their inclusion is awaited.
pub(crate) struct FakeRegistry {
    configured: bool,
    account: Address,
    state: Mutex<FakeState>,
}

impl FakeRegistry {
    pub fn new() -> Self {
        Self {
            configured: true,
            account: creator(),
            state: Mutex::new(FakeState::default()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::new()
        }
    }

    pub fn with_events(events: Vec<Event>) -> Self {
        let registry = Self::new();
        registry.state().events = events;
        registry
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().expect("fake registry state poisoned")
    }

    pub fn push_event(&self, event: Event) {
        self.state().events.push(event);
    }

    /// Occupies the next id with the record the registry returns for missing events.
    pub fn push_sentinel(&self) {
        self.state().events.push(sentinel_event());
    }

    pub fn push_ticket(&self, owner: Address, event_id: EventId, price: U256) -> TicketId {
        let mut state = self.state();
        let ticket_id = TicketId(state.tickets.len() as u64 + 1);
        state.tickets.push(Ticket {
            ticket_id,
            event_id,
            owner,
            purchase_price: price,
            purchase_time: 1_700_000_000,
            is_valid: true,
        });
        ticket_id
    }

    pub fn calls(&self) -> CallCounts {
        self.state().calls
    }

    pub fn minted(&self) -> Vec<MintTicketCall> {
        self.state().minted.clone()
    }

    pub fn events(&self) -> Vec<Event> {
        self.state().events.clone()
    }

    pub fn fail_reads(&self, err: Option<RegistryError>) {
        self.state().fail_reads = err;
    }

    pub fn fail_event(&self, event_id: Option<EventId>) {
        self.state().fail_event = event_id;
    }

    pub fn fail_submit(&self, err: Option<RegistryError>) {
        self.state().fail_submit = err;
    }

    pub fn fail_inclusion(&self, err: Option<RegistryError>) {
        self.state().fail_inclusion = err;
    }

    /// Holds the next `total_events` call until released; reports the count it captured on entry.
    pub fn stall_total_events(&self) -> (oneshot::Receiver<u64>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.state().stall_total_events = Some(Stall {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    /// Holds the next write submission until released.
    pub fn stall_submit(&self) -> (oneshot::Receiver<u64>, oneshot::Sender<()>) {
        let (entered_tx, entered_rx) = oneshot::channel();
        let (release_tx, release_rx) = oneshot::channel();
        self.state().stall_submit = Some(Stall {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    fn read_failure(&self) -> Result<(), RegistryError> {
        match self.state().fail_reads.clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn submit(&self, write: PendingWrite) -> Result<PendingTransaction, RegistryError> {
        let stall = self.state().stall_submit.take();
        if let Some(stall) = stall {
            let _ = stall.entered.send(0);
            let _ = stall.release.await;
        }

        let mut state = self.state();
        if let Some(err) = state.fail_submit.clone() {
            return Err(err);
        }
        state.next_tx += 1;
        let tx_hash = B256::left_padding_from(&state.next_tx.to_be_bytes());
        state.pending.insert(tx_hash, write);
        Ok(PendingTransaction { tx_hash })
    }
}

fn apply(
    state: &mut FakeState,
    write: PendingWrite,
    account: Address,
) -> Result<(), RegistryError> {
    match write {
        PendingWrite::Create(call) => {
            let event_id = EventId(state.events.len() as u64 + 1);
            state.events.push(Event {
                event_id,
                name: call.name,
                description: call.description,
                event_date: call.event_date,
                venue: call.venue,
                creator: account,
                total_tickets: call.total_tickets,
                tickets_sold: 0,
                price: call.price,
                is_active: true,
            });
            Ok(())
        }
        PendingWrite::Mint(call) => {
            let index = usize::try_from(call.event_id.0.saturating_sub(1)).unwrap_or(usize::MAX);
            let event = state
                .events
                .get_mut(index)
                .filter(|event| !event.event_id.is_sentinel())
                .ok_or_else(|| RegistryError::Reverted(Some("Event does not exist".into())))?;
            if call.payment != event.price {
                return Err(RegistryError::Reverted(Some("Incorrect payment".into())));
            }
            if event.tickets_sold >= event.total_tickets {
                return Err(RegistryError::Reverted(Some("Sold out".into())));
            }
            event.tickets_sold += 1;
            let ticket_id = TicketId(state.tickets.len() as u64 + 1);
            state.tickets.push(Ticket {
                ticket_id,
                event_id: call.event_id,
                owner: call.recipient,
                purchase_price: call.payment,
                purchase_time: 1_700_000_000,
                is_valid: true,
            });
            state.minted.push(call);
            Ok(())
        }
    }
}

#[async_trait]
impl RegistryClient for FakeRegistry {
    fn is_configured(&self) -> bool {
        self.configured
    }

    async fn chain_id(&self) -> Result<u64, RegistryError> {
        Ok(31337)
    }

    async fn accounts(&self) -> Result<Vec<Address>, RegistryError> {
        Ok(vec![self.account])
    }

    async fn total_events(&self) -> Result<u64, RegistryError> {
        let (count, stall) = {
            let mut state = self.state();
            state.calls.total_events += 1;
            (state.events.len() as u64, state.stall_total_events.take())
        };
        self.read_failure()?;
        if let Some(stall) = stall {
            let _ = stall.entered.send(count);
            let _ = stall.release.await;
        }
        Ok(count)
    }

    async fn get_event(&self, event_id: EventId) -> Result<Event, RegistryError> {
        let mut state = self.state();
        state.calls.get_event += 1;
        if let Some(err) = state.fail_reads.clone() {
            return Err(err);
        }
        if state.fail_event == Some(event_id) {
            return Err(RegistryError::transport(format!("getEvent({event_id}) timed out")));
        }
        let index = usize::try_from(event_id.0.saturating_sub(1)).unwrap_or(usize::MAX);
        Ok(match state.events.get(index) {
            Some(event) if event_id.0 > 0 => event.clone(),
            _ => sentinel_event(),
        })
    }

    async fn get_owner_tickets(&self, owner: Address) -> Result<Vec<TicketId>, RegistryError> {
        let mut state = self.state();
        state.calls.get_owner_tickets += 1;
        if let Some(err) = state.fail_reads.clone() {
            return Err(err);
        }
        Ok(state
            .tickets
            .iter()
            .filter(|ticket| ticket.owner == owner)
            .map(|ticket| ticket.ticket_id)
            .collect())
    }

    async fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, RegistryError> {
        let mut state = self.state();
        state.calls.get_ticket += 1;
        if let Some(err) = state.fail_reads.clone() {
            return Err(err);
        }
        let index = usize::try_from(ticket_id.0.saturating_sub(1)).unwrap_or(usize::MAX);
        Ok(match state.tickets.get(index) {
            Some(ticket) if ticket_id.0 > 0 => ticket.clone(),
            _ => sentinel_ticket(),
        })
    }

    async fn create_event(
        &self,
        call: CreateEventCall,
    ) -> Result<PendingTransaction, RegistryError> {
        self.state().calls.create_event += 1;
        self.submit(PendingWrite::Create(call)).await
    }

    async fn mint_ticket(&self, call: MintTicketCall) -> Result<PendingTransaction, RegistryError> {
        self.state().calls.mint_ticket += 1;
        self.submit(PendingWrite::Mint(call)).await
    }

    async fn wait_for_inclusion(
        &self,
        pending: &PendingTransaction,
    ) -> Result<TransactionReceipt, RegistryError> {
        let mut state = self.state();
        state.calls.wait_for_inclusion += 1;
        if let Some(err) = state.fail_inclusion.clone() {
            state.pending.remove(&pending.tx_hash);
            return Err(err);
        }
        let write = state
            .pending
            .remove(&pending.tx_hash)
            .ok_or_else(|| RegistryError::transport("unknown transaction"))?;
        apply(&mut state, write, self.account)?;
        Ok(TransactionReceipt {
            tx_hash: pending.tx_hash,
            block_number: Some(state.next_tx),
        })
    }
}
