use alloy_primitives::U256;
use alloy_sol_types::sol;

use crate::{
    domain::{Event, EventId, Ticket, TicketId},
    error::RegistryError,
};

sol! {
    #[derive(Debug, PartialEq, Eq)]
    struct EventData {
        uint256 eventId;
        string name;
        string description;
        uint256 eventDate;
        string venue;
        address creator;
        uint256 totalTickets;
        uint256 ticketsSold;
        uint256 price;
        bool isActive;
    }

    #[derive(Debug, PartialEq, Eq)]
    struct TicketData {
        uint256 ticketId;
        uint256 eventId;
        address owner;
        uint256 purchasePrice;
        uint256 purchaseTime;
        bool isValid;
    }

    interface IEventTicket {
        function name() external view returns (string memory);
        function totalEvents() external view returns (uint256);
        function getEvent(uint256 eventId) external view returns (EventData memory);
        function getOwnerTickets(address owner) external view returns (uint256[] memory);
        function getTicket(uint256 ticketId) external view returns (TicketData memory);
        function createEvent(
            string name,
            string description,
            uint256 eventDate,
            string venue,
            uint256 totalTickets,
            uint256 price
        ) external returns (uint256);
        function mintTicket(uint256 eventId, address to) external payable returns (uint256);
    }
}

pub fn u256_to_u64(value: U256, field: &'static str) -> Result<u64, RegistryError> {
    u64::try_from(value)
        .map_err(|_| RegistryError::decode(format!("{field} does not fit in 64 bits: {value}")))
}

impl TryFrom<EventData> for Event {
    type Error = RegistryError;

    fn try_from(data: EventData) -> Result<Self, Self::Error> {
        Ok(Self {
            event_id: EventId(u256_to_u64(data.eventId, "eventId")?),
            name: data.name,
            description: data.description,
            event_date: u256_to_u64(data.eventDate, "eventDate")?,
            venue: data.venue,
            creator: data.creator,
            total_tickets: u256_to_u64(data.totalTickets, "totalTickets")?,
            tickets_sold: u256_to_u64(data.ticketsSold, "ticketsSold")?,
            price: data.price,
            is_active: data.isActive,
        })
    }
}

impl From<&Event> for EventData {
    fn from(event: &Event) -> Self {
        Self {
            eventId: U256::from(event.event_id.0),
            name: event.name.clone(),
            description: event.description.clone(),
            eventDate: U256::from(event.event_date),
            venue: event.venue.clone(),
            creator: event.creator,
            totalTickets: U256::from(event.total_tickets),
            ticketsSold: U256::from(event.tickets_sold),
            price: event.price,
            isActive: event.is_active,
        }
    }
}

impl TryFrom<TicketData> for Ticket {
    type Error = RegistryError;

    fn try_from(data: TicketData) -> Result<Self, Self::Error> {
        Ok(Self {
            ticket_id: TicketId(u256_to_u64(data.ticketId, "ticketId")?),
            event_id: EventId(u256_to_u64(data.eventId, "eventId")?),
            owner: data.owner,
            purchase_price: data.purchasePrice,
            purchase_time: u256_to_u64(data.purchaseTime, "purchaseTime")?,
            is_valid: data.isValid,
        })
    }
}

impl From<&Ticket> for TicketData {
    fn from(ticket: &Ticket) -> Self {
        Self {
            ticketId: U256::from(ticket.ticket_id.0),
            eventId: U256::from(ticket.event_id.0),
            owner: ticket.owner,
            purchasePrice: ticket.purchase_price,
            purchaseTime: U256::from(ticket.purchase_time),
            isValid: ticket.is_valid,
        }
    }
}
