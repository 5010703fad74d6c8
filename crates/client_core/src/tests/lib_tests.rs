use std::time::Duration;

use super::*;
use alloy_primitives::U256;
use axum::{routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use url::Url;

use crate::test_support::{creator, sample_event, FakeRegistry};

fn client_with(registry: Arc<FakeRegistry>) -> TicketingClient {
    TicketingClient::new(
        registry,
        Arc::new(RefreshController::new()),
        31337,
        MintPricePolicy::Resolve,
    )
}

fn settings(rpc_url: Url, registry_address: Option<Address>) -> ValidatedSettings {
    ValidatedSettings {
        rpc_url,
        registry_address,
        chain_id: 31337,
        sender: None,
        receipt_poll_interval: Duration::from_millis(10),
        mint_price_policy: MintPricePolicy::Resolve,
    }
}

async fn spawn_chain_id_node(chain_id: u64) -> Url {
    spawn_node(chain_id, true).await
}

async fn spawn_node(chain_id: u64, expose_accounts: bool) -> Url {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("local addr");
    let app = Router::new().route(
        "/",
        post(move |Json(request): Json<Value>| async move {
            let id = request["id"].clone();
            let result = match request["method"].as_str() {
                Some("eth_chainId") => json!(format!("0x{chain_id:x}")),
                Some("eth_accounts") if expose_accounts => json!([Address::repeat_byte(0x0a)]),
                Some("eth_accounts") => {
                    let error = json!({ "code": -32601, "message": "method not found" });
                    return Json(json!({ "jsonrpc": "2.0", "id": id, "error": error }));
                }
                _ => Value::Null,
            };
            Json(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
        }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Url::parse(&format!("http://{addr}/")).expect("node url")
}

#[tokio::test]
async fn listing_events_publishes_summary() {
    let registry = Arc::new(FakeRegistry::with_events(vec![
        sample_event(1, U256::from(1)),
        sample_event(2, U256::from(2)),
    ]));
    let client = client_with(registry);
    let mut updates = client.subscribe_events();

    let events = client.events().await.expect("events");
    assert_eq!(events.len(), 2);

    match updates.recv().await.expect("update") {
        ClientEvent::EventsUpdated { events, summary } => {
            assert_eq!(events.len(), 2);
            assert_eq!(summary.active_event_count, 2);
            assert_eq!(summary.total_ticket_capacity, 20);
        }
        other => panic!("unexpected update: {other:?}"),
    }

    let summary = client.summary().await.expect("summary");
    assert_eq!(summary.tickets_sold_count, 0);
    assert_eq!(summary.next_upcoming_event_date, Some(1_900_000_001));
}

#[tokio::test]
async fn owner_tickets_default_to_connected_identity() {
    let registry = Arc::new(FakeRegistry::with_events(vec![sample_event(1, U256::ZERO)]));
    let holder = Address::repeat_byte(0x42);
    registry.push_ticket(holder, shared::domain::EventId(1), U256::ZERO);
    let client = client_with(Arc::clone(&registry));

    let none = client.owner_tickets(None).await.expect("no identity");
    assert!(none.is_empty());
    assert_eq!(registry.calls().get_owner_tickets, 0);

    client.set_identity(Some(holder)).await;
    let tickets = client.owner_tickets(None).await.expect("tickets");
    assert_eq!(tickets.len(), 1);
    assert_eq!(tickets[0].owner, holder);
}

#[tokio::test]
async fn settled_commands_and_refreshes_are_published() {
    let registry = Arc::new(FakeRegistry::new());
    let client = client_with(registry);
    let mut updates = client.subscribe_events();

    let mut form = CreateEventForm {
        name: "Meetup".into(),
        description: String::new(),
        venue: "Cafe".into(),
        date: "2031-05-01".into(),
        total_tickets: "3".into(),
        price: "0".into(),
    };
    let outcome = client.create_event(&mut form).await;
    assert!(matches!(outcome, TxPhase::Succeeded { .. }), "{outcome:?}");
    assert_eq!(client.refresh_controller().current(), 1);

    match updates.recv().await.expect("settled") {
        ClientEvent::CommandSettled(phase) => assert_eq!(phase, outcome),
        other => panic!("unexpected update: {other:?}"),
    }

    assert_eq!(client.refresh(), 2);
    match updates.recv().await.expect("refresh") {
        ClientEvent::RefreshRequested { token } => assert_eq!(token, 2),
        other => panic!("unexpected update: {other:?}"),
    }

    let minted = client
        .mint_ticket(&MintTicketForm {
            event_id: "1".into(),
            recipient: creator().to_string(),
        })
        .await;
    assert!(matches!(minted, TxPhase::Succeeded { .. }), "{minted:?}");
}

#[tokio::test]
async fn read_failures_are_published_as_errors() {
    let registry = Arc::new(FakeRegistry::new());
    registry.fail_reads(Some(RegistryError::transport("connection refused")));
    let client = client_with(registry);
    let mut updates = client.subscribe_events();

    client.events().await.expect_err("must fail");
    match updates.recv().await.expect("error") {
        ClientEvent::Error(message) => assert!(message.contains("connection refused")),
        other => panic!("unexpected update: {other:?}"),
    }
}

#[tokio::test]
async fn ticket_labels_survive_a_failed_event_listing() {
    let registry = Arc::new(FakeRegistry::with_events(vec![sample_event(1, U256::ZERO)]));
    let holder = Address::repeat_byte(0x42);
    registry.push_ticket(holder, shared::domain::EventId(1), U256::ZERO);
    let client = client_with(Arc::clone(&registry));

    assert_eq!(client.events_or_cached().await.len(), 1);

    client.refresh();
    registry.fail_event(Some(shared::domain::EventId(1)));
    let events = client.events_or_cached().await;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].name, sample_event(1, U256::ZERO).name);

    let tickets = client.owner_tickets(Some(holder)).await.expect("tickets");
    assert_eq!(tickets.len(), 1);
}

#[tokio::test]
async fn ticket_labels_fall_back_to_empty_without_any_listing() {
    let registry = Arc::new(FakeRegistry::new());
    registry.fail_reads(Some(RegistryError::transport("connection refused")));
    let client = client_with(registry);

    assert!(client.events_or_cached().await.is_empty());
}

#[tokio::test]
async fn connect_without_registry_address_is_read_only_empty() {
    let url = Url::parse("http://127.0.0.1:9/").expect("url");
    let client = TicketingClient::connect(&settings(url, None))
        .await
        .expect("connect");

    assert!(!client.is_configured());
    assert!(client.events().await.expect("events").is_empty());

    let mut form = CreateEventForm {
        name: "Meetup".into(),
        date: "2031-05-01".into(),
        total_tickets: "3".into(),
        price: "0.1".into(),
        ..CreateEventForm::default()
    };
    let outcome = client.create_event(&mut form).await;
    assert!(
        matches!(
            &outcome,
            TxPhase::Failed {
                error: CommandError::Registry(RegistryError::NotConfigured),
                ..
            }
        ),
        "{outcome:?}"
    );
}

#[tokio::test]
async fn connect_discovers_identity_from_node_accounts() {
    let url = spawn_chain_id_node(31337).await;
    let client = TicketingClient::connect(&settings(url, Some(Address::repeat_byte(0xe7))))
        .await
        .expect("connect");

    assert!(client.is_configured());
    assert_eq!(client.chain_id(), 31337);
    assert_eq!(client.identity().await, Some(Address::repeat_byte(0x0a)));
}

#[tokio::test]
async fn connect_without_node_accounts_has_no_identity() {
    let url = spawn_node(31337, false).await;
    let client = TicketingClient::connect(&settings(url, Some(Address::repeat_byte(0xe7))))
        .await
        .expect("connect");

    assert!(client.is_configured());
    assert_eq!(client.identity().await, None);
}

#[tokio::test]
async fn connect_refuses_chain_id_mismatch() {
    let url = spawn_chain_id_node(1).await;
    let err = TicketingClient::connect(&settings(url, Some(Address::repeat_byte(0xe7))))
        .await
        .err()
        .expect("mismatch must fail");

    match err.downcast_ref::<ConfigError>() {
        Some(ConfigError::ChainMismatch { expected, actual }) => {
            assert_eq!(*expected, 31337);
            assert_eq!(*actual, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}
