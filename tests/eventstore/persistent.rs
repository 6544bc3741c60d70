use std::time::Duration;

use serde_json::json;
use sourced_streams::{
    CancellationToken, ConsumerStrategy, ErrorKind, MessageStream, NackAction,
    SubscriptionSettings,
};

use crate::support::{client, uuid, FakeStore};

async fn next_event(
    messages: &mut MessageStream,
) -> (sourced_streams::Event, sourced_streams::Acknowledger) {
    let message = tokio::time::timeout(Duration::from_secs(5), messages.next())
        .await
        .expect("no message within 5s")
        .expect("subscription ended");
    let (event, ack) = message.into_event().unwrap();
    (event, ack.expect("persistent deliveries carry an acknowledger"))
}

#[tokio::test]
async fn create_fetch_and_ack() {
    let fake = FakeStore::new();
    fake.seed("orders", 3);
    let client = client(&fake).await;
    let cancel = CancellationToken::new();

    let settings = SubscriptionSettings::new()
        .start_from(0)
        .max_retry_count(3)
        .consumer_strategy(ConsumerStrategy::RoundRobin);
    let subscription = client
        .create_persistent_subscription(&cancel, "orders", "billing", &settings)
        .await
        .unwrap();
    assert_eq!(
        fake.group_settings("orders", "billing"),
        Some(json!({
            "startFrom": 0,
            "maxRetryCount": 3,
            "namedConsumerStrategy": "RoundRobin",
        }))
    );

    let mut messages = subscription.subscribe(&cancel);
    let mut versions = Vec::new();
    for _ in 0..3 {
        let (event, ack) = next_event(&mut messages).await;
        assert_eq!(ack.event_id(), event.id());
        versions.push(event.version());
        ack.ack(&cancel).await.unwrap();
    }
    cancel.cancel();
    assert_eq!(versions, vec![0, 1, 2]);

    let acked: Vec<String> = fake.settled().into_iter().map(|(_, id)| id).collect();
    assert_eq!(acked, vec![uuid(0), uuid(1), uuid(2)]);
    assert!(fake
        .seen_paths()
        .contains(&format!("/subscriptions/orders/billing/ack/{}", uuid(1))));

    let fetch = fake
        .seen()
        .into_iter()
        .find(|s| s.path == "/subscriptions/orders/billing/2")
        .unwrap();
    assert_eq!(fetch.method, axum::http::Method::GET);
    assert_eq!(fetch.query.as_deref(), Some("embed=body"));
    assert_eq!(
        fetch.header("accept"),
        Some("application/vnd.eventstore.competingatom+json")
    );
    assert_eq!(fetch.header("es-longpoll"), Some("1"));
}

#[tokio::test]
async fn nack_sends_the_action() {
    let fake = FakeStore::new();
    fake.seed("orders", 1);
    let client = client(&fake).await;
    let cancel = CancellationToken::new();

    let subscription = client
        .create_persistent_subscription(&cancel, "orders", "billing", &SubscriptionSettings::default())
        .await
        .unwrap();
    let mut messages = subscription.subscribe(&cancel);
    let (_, ack) = next_event(&mut messages).await;
    ack.nack(&cancel, NackAction::Park).await.unwrap();
    cancel.cancel();

    assert_eq!(
        fake.settled(),
        vec![("nack:park".to_string(), uuid(0))]
    );
}

#[tokio::test]
async fn update_replaces_settings() {
    let fake = FakeStore::new();
    let client = client(&fake).await;
    let cancel = CancellationToken::new();

    let subscription = client
        .create_persistent_subscription(&cancel, "orders", "billing", &SubscriptionSettings::default())
        .await
        .unwrap();
    assert_eq!(fake.group_settings("orders", "billing"), Some(json!({})));

    subscription
        .update(&cancel, &SubscriptionSettings::new().buffer_size(50))
        .await
        .unwrap();
    assert_eq!(
        fake.group_settings("orders", "billing"),
        Some(json!({ "bufferSize": 50 }))
    );
}

#[tokio::test]
async fn creating_an_existing_group_fails() {
    let fake = FakeStore::new();
    let client = client(&fake).await;
    let cancel = CancellationToken::new();
    let settings = SubscriptionSettings::default();

    client
        .create_persistent_subscription(&cancel, "orders", "billing", &settings)
        .await
        .unwrap();
    let err = client
        .create_persistent_subscription(&cancel, "orders", "billing", &settings)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UnexpectedStatus);
    assert_eq!(err.status(), Some(409));
}

#[tokio::test]
async fn updating_an_unknown_group_is_not_found() {
    let fake = FakeStore::new();
    let client = client(&fake).await;

    let err = client
        .persistent_subscription("orders", "ghost")
        .update(&CancellationToken::new(), &SubscriptionSettings::default())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::StreamNotFound);
}

#[tokio::test]
async fn competing_consumers_split_the_stream() {
    let fake = FakeStore::new();
    fake.seed("orders", 4);
    let client = client(&fake).await;
    let cancel = CancellationToken::new();

    client
        .create_persistent_subscription(&cancel, "orders", "billing", &SubscriptionSettings::default())
        .await
        .unwrap();
    let first = client.persistent_subscription("orders", "billing");
    let second = client.persistent_subscription("orders", "billing");
    let mut a = first.subscribe(&cancel);
    let mut b = second.subscribe(&cancel);

    // Both consumers share the server-side cursor; together they see every
    // event exactly once.
    let mut versions = Vec::new();
    while versions.len() < 4 {
        let (event, ack) = tokio::select! {
            pair = next_event(&mut a) => pair,
            pair = next_event(&mut b) => pair,
        };
        ack.ack(&cancel).await.unwrap();
        versions.push(event.version());
    }
    cancel.cancel();

    versions.sort();
    assert_eq!(versions, vec![0, 1, 2, 3]);
}

#[tokio::test]
async fn reserved_characters_stay_inside_the_group_segment() {
    let fake = FakeStore::new();
    fake.seed("orders#eu", 1);
    let client = client(&fake).await;
    let cancel = CancellationToken::new();

    let subscription = client
        .create_persistent_subscription(&cancel, "orders#eu", "bill/ing", &SubscriptionSettings::default())
        .await
        .unwrap();
    assert_eq!(fake.group_settings("orders#eu", "bill/ing"), Some(json!({})));

    let mut messages = subscription.subscribe(&cancel);
    let (event, ack) = next_event(&mut messages).await;
    assert_eq!(event.stream(), "orders#eu");
    ack.ack(&cancel).await.unwrap();
    cancel.cancel();
    assert_eq!(fake.settled(), vec![("ack".to_string(), uuid(0))]);
}
