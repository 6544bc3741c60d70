use sourced_streams::{CancellationToken, Error, ErrorKind, Event, ReadCount};

use crate::support::{client, FakeStore};

fn versions(events: &[Event]) -> Vec<u64> {
    events.iter().map(|e| e.version()).collect()
}

#[tokio::test]
async fn exact_forward_read_spans_pages_in_order() {
    let fake = FakeStore::new();
    fake.seed("orders", 5);
    let client = client(&fake).await;

    let events = client
        .read_forwards(&CancellationToken::new(), "orders", 0, ReadCount::Exact(5))
        .await
        .unwrap();

    assert_eq!(versions(&events), vec![0, 1, 2, 3, 4]);
    assert_eq!(
        fake.seen_paths(),
        vec![
            "/streams/orders/0/forward/2",
            "/streams/orders/2/forward/2",
            "/streams/orders/4/forward/1",
        ]
    );
    assert!(events.iter().all(|e| e.stream() == "orders"));
    assert_eq!(events[3].data_str(), Some(r#"{"n":3}"#));
}

#[tokio::test]
async fn read_all_forwards_stops_at_head_of_stream() {
    let fake = FakeStore::new();
    fake.seed("orders", 3);
    let client = client(&fake).await;

    let events = client
        .read_forwards(&CancellationToken::new(), "orders", 1, ReadCount::All)
        .await
        .unwrap();

    assert_eq!(versions(&events), vec![1, 2]);
    assert_eq!(fake.seen_paths(), vec!["/streams/orders/1/forward/2"]);
}

#[tokio::test]
async fn short_stream_fails_an_exact_read() {
    let fake = FakeStore::new();
    fake.seed("orders", 3);
    let client = client(&fake).await;

    let err = client
        .read_forwards(&CancellationToken::new(), "orders", 0, ReadCount::Exact(10))
        .await
        .unwrap_err();
    assert_eq!(
        err,
        Error::EndOfStream {
            requested: 10,
            read: 3
        }
    );
}

#[tokio::test]
async fn backward_read_returns_ascending() {
    let fake = FakeStore::new();
    fake.seed("orders", 6);
    let client = client(&fake).await;

    let events = client
        .read_backwards(&CancellationToken::new(), "orders", 4, ReadCount::Exact(3))
        .await
        .unwrap();

    assert_eq!(versions(&events), vec![2, 3, 4]);
    assert_eq!(
        fake.seen_paths(),
        vec!["/streams/orders/4/backward/2", "/streams/orders/2/backward/1"]
    );
}

#[tokio::test]
async fn backward_read_all_reaches_version_zero() {
    let fake = FakeStore::new();
    fake.seed("orders", 5);
    let client = client(&fake).await;

    let events = client
        .read_backwards(&CancellationToken::new(), "orders", 4, ReadCount::All)
        .await
        .unwrap();
    assert_eq!(versions(&events), vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn backward_read_from_past_the_end() {
    let fake = FakeStore::new();
    fake.seed("orders", 5);
    let client = client(&fake).await;

    let events = client
        .read_backwards(&CancellationToken::new(), "orders", 9, ReadCount::All)
        .await
        .unwrap();
    assert_eq!(versions(&events), vec![0, 1, 2, 3, 4]);
    assert_eq!(
        fake.seen_paths(),
        vec![
            "/streams/orders/9/backward/2",
            "/streams/orders/2/backward/2",
            "/streams/orders/0/backward/1",
        ]
    );
}

#[tokio::test]
async fn missing_stream_is_not_found() {
    let fake = FakeStore::new();
    let client = client(&fake).await;

    let err = client
        .read_forwards(&CancellationToken::new(), "nope", 0, ReadCount::All)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StreamNotFound);
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn read_event_by_version() {
    let fake = FakeStore::new();
    fake.seed("orders", 3);
    let client = client(&fake).await;
    let cancel = CancellationToken::new();

    let event = client.read_event(&cancel, "orders", 1).await.unwrap().unwrap();
    assert_eq!(event.version(), 1);
    assert_eq!(event.event_type(), "Seeded");
    assert!(client.read_event(&cancel, "orders", 7).await.unwrap().is_none());
}

#[tokio::test]
async fn reads_send_embed_body_and_accept() {
    let fake = FakeStore::new();
    fake.seed("orders", 1);
    let client = client(&fake).await;

    client
        .read_forwards(&CancellationToken::new(), "orders", 0, ReadCount::Exact(1))
        .await
        .unwrap();

    let seen = &fake.seen()[0];
    assert_eq!(seen.query.as_deref(), Some("embed=body"));
    assert_eq!(
        seen.header("accept"),
        Some("application/vnd.eventstore.atom+json")
    );
}
