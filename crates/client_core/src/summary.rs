use chrono::{DateTime, Utc};
use shared::domain::{Event, EventSummary};

/// Derives dashboard metrics from an event list. Inactive events only count towards listings.
pub fn summarize(events: &[Event], now: DateTime<Utc>) -> EventSummary {
    let now = u64::try_from(now.timestamp()).unwrap_or(0);
    let active = events.iter().filter(|event| event.is_active);

    let mut summary = EventSummary::default();
    for event in active {
        summary.active_event_count += 1;
        summary.total_ticket_capacity = summary
            .total_ticket_capacity
            .saturating_add(event.total_tickets);
        summary.tickets_sold_count = summary.tickets_sold_count.saturating_add(event.tickets_sold);
        if event.event_date > now {
            summary.next_upcoming_event_date = Some(
                summary
                    .next_upcoming_event_date
                    .map_or(event.event_date, |next| next.min(event.event_date)),
            );
        }
    }
    summary
}

pub fn summarize_now(events: &[Event]) -> EventSummary {
    summarize(events, Utc::now())
}
