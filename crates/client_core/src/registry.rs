use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use shared::{
    domain::{Event, EventId, Ticket, TicketId},
    error::RegistryError,
};

pub type TxHash = B256;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PendingTransaction {
    pub tx_hash: TxHash,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub tx_hash: TxHash,
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateEventCall {
    pub name: String,
    pub description: String,
    pub event_date: u64,
    pub venue: String,
    pub total_tickets: u64,
    pub price: U256,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MintTicketCall {
    pub event_id: EventId,
    pub recipient: Address,
    pub payment: U256,
}

/// Read and write surface of the ticket registry contract.
///
/// Write calls return as soon as the transaction is accepted for broadcast;
/// `wait_for_inclusion` resolves once it is mined and fails with
/// [`RegistryError::Reverted`] when the registry refused it.
#[async_trait]
pub trait RegistryClient: Send + Sync {
    fn is_configured(&self) -> bool {
        true
    }

    async fn chain_id(&self) -> Result<u64, RegistryError>;
    async fn accounts(&self) -> Result<Vec<Address>, RegistryError>;
    async fn total_events(&self) -> Result<u64, RegistryError>;
    async fn get_event(&self, event_id: EventId) -> Result<Event, RegistryError>;
    async fn get_owner_tickets(&self, owner: Address) -> Result<Vec<TicketId>, RegistryError>;
    async fn get_ticket(&self, ticket_id: TicketId) -> Result<Ticket, RegistryError>;
    async fn create_event(&self, call: CreateEventCall)
        -> Result<PendingTransaction, RegistryError>;
    async fn mint_ticket(&self, call: MintTicketCall) -> Result<PendingTransaction, RegistryError>;
    async fn wait_for_inclusion(
        &self,
        pending: &PendingTransaction,
    ) -> Result<TransactionReceipt, RegistryError>;
}

/// Stand-in used when no registry address is configured.
pub struct MissingRegistry;

#[async_trait]
impl RegistryClient for MissingRegistry {
    fn is_configured(&self) -> bool {
        false
    }

    async fn chain_id(&self) -> Result<u64, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn accounts(&self) -> Result<Vec<Address>, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn total_events(&self) -> Result<u64, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn get_event(&self, _event_id: EventId) -> Result<Event, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn get_owner_tickets(&self, _owner: Address) -> Result<Vec<TicketId>, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn get_ticket(&self, _ticket_id: TicketId) -> Result<Ticket, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn create_event(
        &self,
        _call: CreateEventCall,
    ) -> Result<PendingTransaction, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn mint_ticket(
        &self,
        _call: MintTicketCall,
    ) -> Result<PendingTransaction, RegistryError> {
        Err(RegistryError::NotConfigured)
    }

    async fn wait_for_inclusion(
        &self,
        _pending: &PendingTransaction,
    ) -> Result<TransactionReceipt, RegistryError> {
        Err(RegistryError::NotConfigured)
    }
}
