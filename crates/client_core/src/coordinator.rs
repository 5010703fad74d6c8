use std::{str::FromStr, sync::Arc};

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone};
use shared::{amount::parse_ether_amount, domain::EventId, error::RegistryError};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::{
    config::MintPricePolicy,
    error::{CommandError, ValidationError},
    ledger::LedgerReader,
    refresh::RefreshController,
    registry::{CreateEventCall, MintTicketCall, RegistryClient, TxHash},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxCommand {
    CreateEvent,
    MintTicket,
}

impl TxCommand {
    pub fn fallback_message(self) -> &'static str {
        match self {
            Self::CreateEvent => "Failed to submit transaction.",
            Self::MintTicket => "Mint transaction failed.",
        }
    }

    pub fn success_message(self) -> &'static str {
        match self {
            Self::CreateEvent => "Event created on-chain.",
            Self::MintTicket => "Ticket minted successfully.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeTone {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub label: String,
    pub tone: NoticeTone,
}

/// Lifecycle of the single outstanding write a coordinator may hold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxPhase {
    Idle,
    Validating {
        command: TxCommand,
    },
    Submitting {
        command: TxCommand,
    },
    Confirming {
        command: TxCommand,
        tx_hash: TxHash,
    },
    Succeeded {
        command: TxCommand,
        tx_hash: TxHash,
        block_number: Option<u64>,
    },
    Failed {
        command: TxCommand,
        error: CommandError,
        message: String,
    },
}

impl TxPhase {
    fn failed(command: TxCommand, error: CommandError) -> Self {
        let message = error.user_message(command.fallback_message());
        Self::Failed {
            command,
            error,
            message,
        }
    }

    pub fn command(&self) -> Option<TxCommand> {
        match self {
            Self::Idle => None,
            Self::Validating { command }
            | Self::Submitting { command }
            | Self::Confirming { command, .. }
            | Self::Succeeded { command, .. }
            | Self::Failed { command, .. } => Some(*command),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        matches!(
            self,
            Self::Validating { .. } | Self::Submitting { .. } | Self::Confirming { .. }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded { .. } | Self::Failed { .. })
    }

    pub fn notice(&self) -> Option<Notice> {
        match self {
            Self::Succeeded { command, .. } => Some(Notice {
                label: command.success_message().to_string(),
                tone: NoticeTone::Success,
            }),
            Self::Failed { message, .. } => Some(Notice {
                label: message.clone(),
                tone: NoticeTone::Error,
            }),
            Self::Idle
            | Self::Validating { .. }
            | Self::Submitting { .. }
            | Self::Confirming { .. } => None,
        }
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: &TxPhase) -> bool {
        use TxPhase::*;

        let same_command = self.command() == next.command();
        match (self, next) {
            (Idle | Succeeded { .. } | Failed { .. }, Validating { .. }) => true,
            (Succeeded { .. } | Failed { .. }, Idle) => true,
            (Validating { .. }, Submitting { .. } | Failed { .. }) => same_command,
            (Submitting { .. }, Confirming { .. } | Failed { .. }) => same_command,
            (Confirming { .. }, Succeeded { .. } | Failed { .. }) => same_command,
            (Idle, _)
            | (Validating { .. }, _)
            | (Submitting { .. }, _)
            | (Confirming { .. }, _)
            | (Succeeded { .. }, _)
            | (Failed { .. }, _) => false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateEventForm {
    pub name: String,
    pub description: String,
    pub venue: String,
    pub date: String,
    pub total_tickets: String,
    pub price: String,
}

impl CreateEventForm {
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MintTicketForm {
    pub event_id: String,
    pub recipient: String,
}

/// Accepts RFC 3339, `datetime-local` style values (local time) and bare dates (UTC midnight).
pub fn parse_event_date(input: &str) -> Option<i64> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Some(parsed.timestamp());
    }
    for format in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Local
                .from_local_datetime(&naive)
                .earliest()
                .map(|local| local.timestamp());
        }
    }
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|midnight| midnight.and_utc().timestamp())
}

pub fn validate_create_event(form: &CreateEventForm) -> Result<CreateEventCall, ValidationError> {
    if form.name.trim().is_empty() {
        return Err(ValidationError::MissingNameOrDate);
    }
    let event_date = parse_event_date(&form.date)
        .filter(|timestamp| *timestamp > 0)
        .and_then(|timestamp| u64::try_from(timestamp).ok())
        .ok_or(ValidationError::MissingNameOrDate)?;

    let total_tickets = form
        .total_tickets
        .trim()
        .parse::<u64>()
        .ok()
        .filter(|supply| *supply > 0)
        .ok_or(ValidationError::InvalidTicketSupply)?;

    let price = parse_ether_amount(&form.price).map_err(|_| ValidationError::InvalidPrice)?;

    Ok(CreateEventCall {
        name: form.name.clone(),
        description: form.description.clone(),
        event_date,
        venue: form.venue.clone(),
        total_tickets,
        price,
    })
}

pub fn parse_event_selection(input: &str) -> Result<EventId, ValidationError> {
    input
        .trim()
        .parse::<u64>()
        .ok()
        .map(EventId)
        .filter(|event_id| !event_id.is_sentinel())
        .ok_or(ValidationError::MissingEvent)
}

pub fn resolve_recipient(
    input: &str,
    connected: Option<Address>,
) -> Result<Address, ValidationError> {
    let input = input.trim();
    if input.is_empty() {
        return connected.ok_or(ValidationError::MissingRecipient);
    }
    Address::from_str(input).map_err(|_| ValidationError::InvalidRecipient)
}

/// Validates and submits registry writes, waits for inclusion and bumps the refresh token.
///
/// Commands never return an error: the outcome is the terminal [`TxPhase`].
/// Invoking a command while another is still in flight yields a `Busy`
/// failure without touching the in-flight state.
pub struct TransactionCoordinator {
    registry: Arc<dyn RegistryClient>,
    reader: Arc<LedgerReader>,
    refresh: Arc<RefreshController>,
    mint_price_policy: MintPricePolicy,
    identity: RwLock<Option<Address>>,
    phase: Mutex<TxPhase>,
}

impl TransactionCoordinator {
    pub fn new(
        registry: Arc<dyn RegistryClient>,
        reader: Arc<LedgerReader>,
        refresh: Arc<RefreshController>,
        mint_price_policy: MintPricePolicy,
    ) -> Self {
        Self {
            registry,
            reader,
            refresh,
            mint_price_policy,
            identity: RwLock::new(None),
            phase: Mutex::new(TxPhase::Idle),
        }
    }

    pub async fn phase(&self) -> TxPhase {
        self.phase.lock().await.clone()
    }

    pub async fn identity(&self) -> Option<Address> {
        *self.identity.read().await
    }

    pub async fn set_identity(&self, identity: Option<Address>) {
        *self.identity.write().await = identity;
    }

    /// Returns a settled coordinator to `Idle`; in-flight phases are left alone.
    pub async fn reset(&self) {
        let mut phase = self.phase.lock().await;
        if phase.can_transition_to(&TxPhase::Idle) {
            *phase = TxPhase::Idle;
        }
    }

    pub async fn create_event(&self, form: &mut CreateEventForm) -> TxPhase {
        let command = TxCommand::CreateEvent;
        if let Err(rejected) = self.begin(command).await {
            return rejected;
        }

        let call = match validate_create_event(form) {
            Ok(call) => call,
            Err(err) => return self.fail(command, err.into()).await,
        };
        if !self.registry.is_configured() {
            return self.fail(command, RegistryError::NotConfigured.into()).await;
        }

        self.advance(TxPhase::Submitting { command }).await;
        let pending = match self.registry.create_event(call).await {
            Ok(pending) => pending,
            Err(err) => return self.fail(command, err.into()).await,
        };

        self.advance(TxPhase::Confirming {
            command,
            tx_hash: pending.tx_hash,
        })
        .await;
        let receipt = match self.registry.wait_for_inclusion(&pending).await {
            Ok(receipt) => receipt,
            Err(err) => return self.fail(command, err.into()).await,
        };

        form.clear();
        self.refresh.bump();
        self.advance(TxPhase::Succeeded {
            command,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
        })
        .await
    }

    pub async fn mint_ticket(&self, form: &MintTicketForm) -> TxPhase {
        let command = TxCommand::MintTicket;
        if let Err(rejected) = self.begin(command).await {
            return rejected;
        }

        let event_id = match parse_event_selection(&form.event_id) {
            Ok(event_id) => event_id,
            Err(err) => return self.fail(command, err.into()).await,
        };
        let recipient = match resolve_recipient(&form.recipient, self.identity().await) {
            Ok(recipient) => recipient,
            Err(err) => return self.fail(command, err.into()).await,
        };
        if !self.registry.is_configured() {
            return self.fail(command, RegistryError::NotConfigured.into()).await;
        }
        let payment = match self.resolve_price(event_id).await {
            Ok(payment) => payment,
            Err(err) => return self.fail(command, err).await,
        };

        self.advance(TxPhase::Submitting { command }).await;
        let pending = match self
            .registry
            .mint_ticket(MintTicketCall {
                event_id,
                recipient,
                payment,
            })
            .await
        {
            Ok(pending) => pending,
            Err(err) => return self.fail(command, err.into()).await,
        };

        self.advance(TxPhase::Confirming {
            command,
            tx_hash: pending.tx_hash,
        })
        .await;
        let receipt = match self.registry.wait_for_inclusion(&pending).await {
            Ok(receipt) => receipt,
            Err(err) => return self.fail(command, err.into()).await,
        };

        self.refresh.bump();
        self.advance(TxPhase::Succeeded {
            command,
            tx_hash: receipt.tx_hash,
            block_number: receipt.block_number,
        })
        .await
    }

    async fn resolve_price(&self, event_id: EventId) -> Result<U256, CommandError> {
        if let Some(events) = self.reader.cached_events().await {
            if let Some(event) = events.iter().find(|event| event.event_id == event_id) {
                return Ok(event.price);
            }
        }

        match self.mint_price_policy {
            MintPricePolicy::ZeroFallback => {
                warn!("coordinator: event={event_id} not in cached list, attaching zero payment");
                Ok(U256::ZERO)
            }
            MintPricePolicy::Resolve => {
                debug!("coordinator: event={event_id} not in cached list, reading it directly");
                let event = self.reader.get_event(event_id).await?;
                if event.event_id.is_sentinel() {
                    return Err(ValidationError::UnknownEvent.into());
                }
                Ok(event.price)
            }
        }
    }

    async fn begin(&self, command: TxCommand) -> Result<(), TxPhase> {
        let next = TxPhase::Validating { command };
        let mut phase = self.phase.lock().await;
        if !phase.can_transition_to(&next) {
            warn!(
                "coordinator: rejecting {command:?} while {:?} is in flight",
                phase.command()
            );
            return Err(TxPhase::failed(command, CommandError::Busy));
        }
        *phase = next;
        debug!("coordinator: {command:?} validating");
        Ok(())
    }

    async fn advance(&self, next: TxPhase) -> TxPhase {
        let mut phase = self.phase.lock().await;
        if !phase.can_transition_to(&next) {
            warn!("coordinator: refusing illegal transition {:?} -> {next:?}", *phase);
            return phase.clone();
        }
        match &next {
            TxPhase::Confirming { command, tx_hash } => {
                info!("coordinator: {command:?} awaiting inclusion tx={tx_hash}")
            }
            TxPhase::Succeeded {
                command, tx_hash, ..
            } => info!("coordinator: {command:?} succeeded tx={tx_hash}"),
            TxPhase::Failed {
                command, message, ..
            } => warn!("coordinator: {command:?} failed: {message}"),
            TxPhase::Idle | TxPhase::Validating { .. } | TxPhase::Submitting { .. } => {
                debug!("coordinator: -> {next:?}")
            }
        }
        *phase = next.clone();
        next
    }

    async fn fail(&self, command: TxCommand, error: CommandError) -> TxPhase {
        self.advance(TxPhase::failed(command, error)).await
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
