use shared::{
    amount::format_ether_amount,
    domain::{Event, EventSummary, Ticket},
};

pub const UNKNOWN_EVENT_NAME: &str = "Event";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventRow {
    pub event: Event,
    pub sold_pct: u8,
    pub price_text: String,
}

impl EventRow {
    pub fn new(event: &Event) -> Self {
        Self {
            sold_pct: sold_percentage(event.tickets_sold, event.total_tickets),
            price_text: format_ether_amount(event.price),
            event: event.clone(),
        }
    }

    pub fn is_inactive(&self) -> bool {
        !self.event.is_active
    }
}

fn sold_percentage(sold: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let pct = (u128::from(sold) * 100 + u128::from(total) / 2) / u128::from(total);
    u8::try_from(pct.min(100)).unwrap_or(100)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TicketCard {
    pub ticket: Ticket,
    pub event_name: String,
    pub paid_text: String,
}

impl TicketCard {
    /// Builds the card from whatever event list is current; unknown events get a generic name.
    pub fn new(ticket: &Ticket, events: &[Event]) -> Self {
        let event_name = events
            .iter()
            .find(|event| event.event_id == ticket.event_id)
            .map(|event| event.name.clone())
            .unwrap_or_else(|| UNKNOWN_EVENT_NAME.to_string());
        Self {
            ticket: ticket.clone(),
            event_name,
            paid_text: format_ether_amount(ticket.purchase_price),
        }
    }

    pub fn validity_label(&self) -> &'static str {
        if self.ticket.is_valid {
            "valid"
        } else {
            "invalid"
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummaryView {
    pub summary: EventSummary,
    pub schedule_helper: String,
    pub sales_helper: String,
}

impl From<EventSummary> for SummaryView {
    fn from(summary: EventSummary) -> Self {
        let schedule_helper = match summary.next_upcoming_at() {
            Some(next) => format!("Next: {}", next.format("%Y-%m-%d")),
            None => "No scheduled dates".to_string(),
        };
        let sales_helper = format!(
            "{}/{} sold",
            summary.tickets_sold_count, summary.total_ticket_capacity
        );
        Self {
            summary,
            schedule_helper,
            sales_helper,
        }
    }
}
