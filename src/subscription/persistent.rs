use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{deliver, idle, Acknowledger, MessageStream, StreamMessage};
use crate::client::{cancellable, fetch_page};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::transport::{
    segment, Request, Transport, ACCEPT_COMPETING, CONTENT_TYPE_JSON, HEADER_LONG_POLL,
};

/// How the server spreads events across the members of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConsumerStrategy {
    RoundRobin,
    DispatchToSingle,
    Pinned,
}

/// Server-side settings of a persistent subscription group.
///
/// Every field is optional; unset fields are left to the server's defaults
/// and omitted from the request, so `SubscriptionSettings::default()`
/// serializes to `{}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionSettings {
    #[serde(rename = "resolveLinktos", skip_serializing_if = "Option::is_none")]
    pub resolve_link_tos: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_from: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_statistics: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub check_point_after_milliseconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub live_buffer_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_batch_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_size: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_check_point_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_retry_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_subscriber_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_timeout_milliseconds: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_check_point_count: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_consumer_strategy: Option<ConsumerStrategy>,
}

impl SubscriptionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve_link_tos(mut self, resolve: bool) -> Self {
        self.resolve_link_tos = Some(resolve);
        self
    }

    /// Version to start from; `-1` means "only new events".
    pub fn start_from(mut self, version: i64) -> Self {
        self.start_from = Some(version);
        self
    }

    pub fn buffer_size(mut self, size: u32) -> Self {
        self.buffer_size = Some(size);
        self
    }

    pub fn read_batch_size(mut self, size: u32) -> Self {
        self.read_batch_size = Some(size);
        self
    }

    pub fn max_retry_count(mut self, count: u32) -> Self {
        self.max_retry_count = Some(count);
        self
    }

    pub fn message_timeout(mut self, timeout: Duration) -> Self {
        self.message_timeout_milliseconds = Some(timeout.as_millis() as u64);
        self
    }

    pub fn consumer_strategy(mut self, strategy: ConsumerStrategy) -> Self {
        self.named_consumer_strategy = Some(strategy);
        self
    }
}

/// A member of a competing-consumer group.
///
/// There is no local cursor: the server decides what each fetch returns and
/// advances its checkpoint as events are acknowledged.
#[derive(Clone)]
pub struct PersistentSubscription {
    transport: Arc<dyn Transport>,
    stream: String,
    group: String,
    batch_size: usize,
    long_poll: Duration,
    empty_poll_delay: Duration,
    capacity: usize,
}

impl fmt::Debug for PersistentSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentSubscription")
            .field("stream", &self.stream)
            .field("group", &self.group)
            .field("batch_size", &self.batch_size)
            .finish_non_exhaustive()
    }
}

impl PersistentSubscription {
    pub fn new(
        transport: Arc<dyn Transport>,
        stream: impl Into<String>,
        group: impl Into<String>,
        config: &ClientConfig,
    ) -> Self {
        Self {
            transport,
            stream: stream.into(),
            group: group.into(),
            batch_size: config.persistent_batch(),
            long_poll: config.long_poll(),
            empty_poll_delay: config.empty_poll_delay(),
            capacity: config.capacity(),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    fn group_path(&self) -> String {
        format!(
            "/subscriptions/{}/{}",
            segment(&self.stream),
            segment(&self.group)
        )
    }

    /// Register the group on the server (`201 Created`).
    pub async fn create(
        &self,
        cancel: &CancellationToken,
        settings: &SubscriptionSettings,
    ) -> Result<()> {
        let request = Request::put(self.group_path());
        cancellable(cancel, self.send_settings(request, settings, 201)).await?;
        info!(stream = %self.stream, group = %self.group, "persistent subscription created");
        Ok(())
    }

    /// Replace the group's settings (`200 OK`).
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        settings: &SubscriptionSettings,
    ) -> Result<()> {
        let request = Request::post(self.group_path());
        cancellable(cancel, self.send_settings(request, settings, 200)).await?;
        info!(stream = %self.stream, group = %self.group, "persistent subscription updated");
        Ok(())
    }

    async fn send_settings(
        &self,
        request: Request,
        settings: &SubscriptionSettings,
        expected_status: u16,
    ) -> Result<()> {
        let body = serde_json::to_vec(settings)
            .map_err(|e| Error::Decode(format!("unable to encode settings: {e}")))?;
        let path = request.path.clone();
        let request = request.header("Content-Type", CONTENT_TYPE_JSON).body(body);

        let response = self.transport.send(request).await?;
        if response.status != expected_status {
            warn!(%path, status = response.status, "subscription settings rejected");
            return Err(Error::from_status(response.status, path));
        }
        Ok(())
    }

    /// Spawn the fetch task and return the consumer end.
    pub fn subscribe(&self, cancel: &CancellationToken) -> MessageStream {
        let (tx, producer_cancel, stream) = MessageStream::channel(cancel, self.capacity);
        tokio::spawn(self.clone().run(tx, producer_cancel));
        stream
    }

    fn fetch_request(&self) -> Request {
        Request::get(format!("{}/{}", self.group_path(), self.batch_size))
            .query("embed", "body")
            .header("Accept", ACCEPT_COMPETING)
            .header(HEADER_LONG_POLL, self.long_poll.as_secs().to_string())
    }

    async fn run(self, tx: mpsc::Sender<StreamMessage>, cancel: CancellationToken) {
        info!(stream = %self.stream, group = %self.group, "persistent subscription started");

        loop {
            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                page = fetch_page(self.transport.as_ref(), self.fetch_request(), &self.stream) => page,
            };

            let mut events = match page {
                Ok(page) => page.events,
                Err(err) => {
                    warn!(stream = %self.stream, group = %self.group, error = %err, "persistent subscription failed");
                    deliver(&tx, &cancel, StreamMessage::Error(err)).await;
                    return;
                }
            };

            if events.is_empty() {
                if !idle(&cancel, self.empty_poll_delay).await {
                    break;
                }
                continue;
            }

            events.sort_by_key(Event::version);
            let delivered = events.len();
            for event in events {
                let ack = Acknowledger::new(
                    self.transport.clone(),
                    self.stream.clone(),
                    self.group.clone(),
                    event.id(),
                );
                let message = StreamMessage::Event {
                    event,
                    ack: Some(ack),
                };
                if !deliver(&tx, &cancel, message).await {
                    info!(stream = %self.stream, group = %self.group, "persistent subscription stopped");
                    return;
                }
            }
            debug!(stream = %self.stream, group = %self.group, delivered, "persistent batch delivered");
        }

        info!(stream = %self.stream, group = %self.group, "persistent subscription cancelled");
    }
}
