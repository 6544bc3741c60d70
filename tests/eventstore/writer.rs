use serde::Serialize;
use sourced_streams::{
    CancellationToken, Client, Error, ErrorKind, Event, ExpectedVersion, HttpTransport, ReadCount,
};

use crate::support::{client, start_server, test_config, FakeStore, ADMIN_AUTH};

#[derive(Serialize)]
struct OrderPlaced {
    total: u32,
}

#[tokio::test]
async fn batch_is_written_in_version_order() {
    let fake = FakeStore::new();
    let client = client(&fake).await;

    let first = Event::new("First", r#"{"step":0}"#).with_version(0);
    let second = Event::new("Second", r#"{"step":1}"#).with_version(1);

    client
        .writer("orders")
        .write(
            &CancellationToken::new(),
            ExpectedVersion::NoStream,
            &[second.clone(), first.clone()],
        )
        .await
        .unwrap();

    let stored = fake.events("orders");
    assert_eq!(stored.len(), 2);
    assert_eq!(stored[0]["eventType"], "First");
    assert_eq!(stored[0]["eventId"], first.id().to_string());
    assert_eq!(stored[1]["eventType"], "Second");

    let seen = &fake.seen()[0];
    assert_eq!(seen.header("es-expectedversion"), Some("-1"));
    assert_eq!(
        seen.header("content-type"),
        Some("application/vnd.eventstore.events+json")
    );
}

#[tokio::test]
async fn written_events_read_back_verbatim() {
    let fake = FakeStore::new();
    let client = client(&fake).await;
    let cancel = CancellationToken::new();

    let events = [
        Event::json("OrderPlaced", &OrderPlaced { total: 5 }).unwrap(),
        Event::new("Note", "plain text").binary().with_version(1),
    ];
    client
        .writer("orders")
        .write(&cancel, ExpectedVersion::Any, &events)
        .await
        .unwrap();

    let read = client
        .read_forwards(&cancel, "orders", 0, ReadCount::All)
        .await
        .unwrap();
    assert_eq!(read.len(), 2);
    assert_eq!(read[0].data_str(), Some(r#"{"total":5}"#));
    assert!(read[0].is_json());
    assert_eq!(read[1].data(), b"plain text");
    assert!(!read[1].is_json());
}

#[tokio::test]
async fn stale_expected_version_is_a_conflict() {
    let fake = FakeStore::new();
    fake.seed("orders", 3);
    let client = client(&fake).await;

    let err = client
        .writer("orders")
        .write(
            &CancellationToken::new(),
            ExpectedVersion::Exact(0),
            &[Event::new("Late", "{}").with_version(1)],
        )
        .await
        .unwrap_err();

    assert_eq!(
        err,
        Error::ConcurrencyConflict {
            stream: "orders".into(),
            expected: 0,
            current: Some(2),
            status: 400,
        }
    );
    assert_eq!(fake.events("orders").len(), 3);
}

#[tokio::test]
async fn continuing_a_stream_with_its_last_version() {
    let fake = FakeStore::new();
    fake.seed("orders", 2);
    let client = client(&fake).await;

    client
        .writer("orders")
        .write(
            &CancellationToken::new(),
            ExpectedVersion::Exact(1),
            &[Event::new("Next", "{}").with_version(2)],
        )
        .await
        .unwrap();
    assert_eq!(fake.events("orders")[2]["eventNumber"], 2);
}

#[tokio::test]
async fn empty_batch_never_reaches_the_server() {
    let fake = FakeStore::new();
    let client = client(&fake).await;

    let err = client
        .writer("orders")
        .write(&CancellationToken::new(), ExpectedVersion::Any, &[])
        .await
        .unwrap_err();
    assert_eq!(err, Error::EmptyBatch);
    assert!(fake.seen().is_empty());
}

#[tokio::test]
async fn credentials_are_sent_as_basic_auth() {
    let fake = FakeStore::new().with_auth();
    let base = start_server(fake.clone()).await;
    let cancel = CancellationToken::new();
    let event = [Event::new("Created", "{}")];

    let anonymous = Client::new(HttpTransport::new(base.clone())).with_config(test_config());
    let err = anonymous
        .writer("orders")
        .write(&cancel, ExpectedVersion::Any, &event)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unauthorized);

    let admin = Client::new(HttpTransport::new(base).with_basic_auth("admin", "changeit"))
        .with_config(test_config());
    admin
        .writer("orders")
        .write(&cancel, ExpectedVersion::Any, &event)
        .await
        .unwrap();
    assert_eq!(fake.seen()[1].header("authorization"), Some(ADMIN_AUTH));
}

#[tokio::test]
async fn reserved_characters_stay_inside_the_stream_segment() {
    let fake = FakeStore::new();
    fake.seed("orders", 1);
    let client = client(&fake).await;
    let cancel = CancellationToken::new();

    client
        .writer("orders#eu?x/y")
        .write(&cancel, ExpectedVersion::NoStream, &[Event::new("Created", "{}")])
        .await
        .unwrap();
    assert_eq!(fake.events("orders#eu?x/y").len(), 1);
    assert_eq!(fake.events("orders").len(), 1);
    assert_eq!(fake.seen()[0].path, "/streams/orders%23eu%3Fx%2Fy");

    let read = client
        .read_forwards(&cancel, "orders#eu?x/y", 0, ReadCount::All)
        .await
        .unwrap();
    assert_eq!(read.len(), 1);
    assert_eq!(read[0].stream(), "orders#eu?x/y");
    assert_eq!(read[0].event_type(), "Created");
}

#[tokio::test]
async fn oversized_expected_version_never_reaches_the_server() {
    let fake = FakeStore::new();
    let client = client(&fake).await;

    let err = client
        .writer("orders")
        .write(
            &CancellationToken::new(),
            ExpectedVersion::Exact(u64::MAX),
            &[Event::new("Created", "{}")],
        )
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    assert!(fake.seen().is_empty());
}
