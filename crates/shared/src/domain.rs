use std::fmt;

use alloy_primitives::{Address, U256};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(EventId);
id_newtype!(TicketId);

impl EventId {
    /// Id the registry returns for slots that were never populated.
    pub const NOT_FOUND: EventId = EventId(0);

    pub fn is_sentinel(self) -> bool {
        self == Self::NOT_FOUND
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub event_id: EventId,
    pub name: String,
    pub description: String,
    pub event_date: u64,
    pub venue: String,
    pub creator: Address,
    pub total_tickets: u64,
    pub tickets_sold: u64,
    pub price: U256,
    pub is_active: bool,
}

impl Event {
    pub fn starts_at(&self) -> Option<DateTime<Utc>> {
        unix_to_datetime(self.event_date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticket {
    pub ticket_id: TicketId,
    pub event_id: EventId,
    pub owner: Address,
    pub purchase_price: U256,
    pub purchase_time: u64,
    pub is_valid: bool,
}

impl Ticket {
    pub fn purchased_at(&self) -> Option<DateTime<Utc>> {
        unix_to_datetime(self.purchase_time)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSummary {
    pub active_event_count: usize,
    pub total_ticket_capacity: u64,
    pub tickets_sold_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_upcoming_event_date: Option<u64>,
}

impl EventSummary {
    pub fn next_upcoming_at(&self) -> Option<DateTime<Utc>> {
        self.next_upcoming_event_date.and_then(unix_to_datetime)
    }
}

pub fn unix_to_datetime(seconds: u64) -> Option<DateTime<Utc>> {
    let seconds = i64::try_from(seconds).ok()?;
    Utc.timestamp_opt(seconds, 0).single()
}
