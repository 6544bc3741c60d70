use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{deliver, idle, MessageStream, StreamMessage};
use crate::client::{fetch_page, page_request};
use crate::config::ClientConfig;
use crate::event::Event;
use crate::reader::Direction;
use crate::transport::{Transport, HEADER_LONG_POLL};

/// Single-consumer live read of a stream from a start position.
///
/// The cursor lives in the fetch task: it starts at `start`, advances by
/// the number of events handed to the consumer and never moves backwards.
/// Each `subscribe` call starts a fresh task from `start`.
#[derive(Clone)]
pub struct CatchUpSubscription {
    transport: Arc<dyn Transport>,
    stream: String,
    start: u64,
    page_size: usize,
    long_poll: Duration,
    empty_poll_delay: Duration,
    capacity: usize,
}

impl fmt::Debug for CatchUpSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatchUpSubscription")
            .field("stream", &self.stream)
            .field("start", &self.start)
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl CatchUpSubscription {
    pub fn new(
        transport: Arc<dyn Transport>,
        stream: impl Into<String>,
        start: u64,
        config: &ClientConfig,
    ) -> Self {
        Self {
            transport,
            stream: stream.into(),
            start,
            page_size: config.catch_up_page(),
            long_poll: config.long_poll(),
            empty_poll_delay: config.empty_poll_delay(),
            capacity: config.capacity(),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    /// Spawn the fetch task and return the consumer end.
    pub fn subscribe(&self, cancel: &CancellationToken) -> MessageStream {
        let (tx, producer_cancel, stream) = MessageStream::channel(cancel, self.capacity);
        tokio::spawn(self.clone().run(tx, producer_cancel));
        stream
    }

    async fn run(self, tx: mpsc::Sender<StreamMessage>, cancel: CancellationToken) {
        info!(stream = %self.stream, start = self.start, "catch-up subscription started");
        let mut cursor = self.start;

        loop {
            let request = page_request(&self.stream, cursor, Direction::Forward, self.page_size)
                .header(HEADER_LONG_POLL, self.long_poll.as_secs().to_string());

            let page = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                page = fetch_page(self.transport.as_ref(), request, &self.stream) => page,
            };

            let mut events = match page {
                Ok(page) => page.events,
                Err(err) => {
                    warn!(stream = %self.stream, cursor, error = %err, "catch-up subscription failed");
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
            for event in events {
                if !deliver(&tx, &cancel, StreamMessage::Event { event, ack: None }).await {
                    info!(stream = %self.stream, cursor, "catch-up subscription stopped");
                    return;
                }
                cursor += 1;
            }
            debug!(stream = %self.stream, cursor, "catch-up round delivered");
        }

        info!(stream = %self.stream, cursor, "catch-up subscription cancelled");
    }
}
