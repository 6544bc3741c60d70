//! Client — entry point that hands out readers, writers and subscriptions.

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::codec::{self, StreamPage};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::Event;
use crate::reader::{Direction, ReadCount, StreamReader};
use crate::subscription::{
    CatchUpSubscription, PersistentSubscription, Subscription, SubscriptionSettings,
};
use crate::transport::{segment, Request, Transport, ACCEPT_ATOM};
use crate::writer::StreamWriter;

/// Cheap-to-clone handle on an event store.
///
/// ## Example
///
/// ```no_run
/// use sourced_streams::{Client, Event, ExpectedVersion, ReadCount};
/// use sourced_streams::CancellationToken;
///
/// # async fn run() -> Result<(), sourced_streams::Error> {
/// let client = Client::connect("http://127.0.0.1:2113");
/// let cancel = CancellationToken::new();
///
/// client
///     .writer("orders")
///     .write(&cancel, ExpectedVersion::NoStream, &[Event::new("OrderPlaced", "{}")])
///     .await?;
///
/// let events = client.read_forwards(&cancel, "orders", 0, ReadCount::All).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Client {
    transport: Arc<dyn Transport>,
    config: ClientConfig,
}

impl Client {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self::from_arc(Arc::new(transport))
    }

    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            config: ClientConfig::default(),
        }
    }

    /// Connect over HTTP to `host` with no credentials.
    #[cfg(feature = "http")]
    pub fn connect(host: impl Into<String>) -> Self {
        Self::new(crate::transport::HttpTransport::new(host))
    }

    pub fn with_config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn forwards_reader(&self, stream: impl Into<String>) -> StreamReader {
        StreamReader::new(
            self.transport.clone(),
            stream,
            Direction::Forward,
            self.config.read_page(),
        )
    }

    pub fn backwards_reader(&self, stream: impl Into<String>) -> StreamReader {
        StreamReader::new(
            self.transport.clone(),
            stream,
            Direction::Backward,
            self.config.read_page(),
        )
    }

    pub fn writer(&self, stream: impl Into<String>) -> StreamWriter {
        StreamWriter::new(self.transport.clone(), stream)
    }

    /// Read `count` events ascending from `start`.
    pub async fn read_forwards(
        &self,
        cancel: &CancellationToken,
        stream: impl Into<String>,
        start: u64,
        count: ReadCount,
    ) -> Result<Vec<Event>> {
        self.forwards_reader(stream).read(cancel, start, count).await
    }

    /// Read `count` events at or below `start`, returned ascending.
    pub async fn read_backwards(
        &self,
        cancel: &CancellationToken,
        stream: impl Into<String>,
        start: u64,
        count: ReadCount,
    ) -> Result<Vec<Event>> {
        self.backwards_reader(stream).read(cancel, start, count).await
    }

    /// Read the single event at `version`, or `None` if the stream has no
    /// event there yet.
    pub async fn read_event(
        &self,
        cancel: &CancellationToken,
        stream: &str,
        version: u64,
    ) -> Result<Option<Event>> {
        let request = page_request(stream, version, Direction::Forward, 1);
        let page = cancellable(cancel, fetch_page(self.transport.as_ref(), request, stream)).await?;
        Ok(page.events.into_iter().next())
    }

    /// A catch-up subscription reading `stream` from `start`.
    pub fn catch_up_subscription(&self, stream: impl Into<String>, start: u64) -> Subscription {
        Subscription::CatchUp(CatchUpSubscription::new(
            self.transport.clone(),
            stream,
            start,
            &self.config,
        ))
    }

    /// Register a competing-consumer group and return a subscription on it.
    pub async fn create_persistent_subscription(
        &self,
        cancel: &CancellationToken,
        stream: impl Into<String>,
        group: impl Into<String>,
        settings: &SubscriptionSettings,
    ) -> Result<Subscription> {
        let subscription =
            PersistentSubscription::new(self.transport.clone(), stream, group, &self.config);
        subscription.create(cancel, settings).await?;
        Ok(Subscription::Persistent(subscription))
    }

    /// Attach to a group that already exists on the server.
    pub fn persistent_subscription(
        &self,
        stream: impl Into<String>,
        group: impl Into<String>,
    ) -> Subscription {
        Subscription::Persistent(PersistentSubscription::new(
            self.transport.clone(),
            stream,
            group,
            &self.config,
        ))
    }
}

/// `GET /streams/{stream}/{position}/{direction}/{count}?embed=body`.
pub(crate) fn page_request(
    stream: &str,
    position: u64,
    direction: Direction,
    count: usize,
) -> Request {
    Request::get(format!(
        "/streams/{}/{position}/{}/{count}",
        segment(stream),
        direction.as_str()
    ))
    .query("embed", "body")
    .header("Accept", ACCEPT_ATOM)
}

/// Send a read request and decode the page, classifying failures.
pub(crate) async fn fetch_page(
    transport: &dyn Transport,
    request: Request,
    stream: &str,
) -> Result<StreamPage> {
    let path = request.path.clone();
    let response = transport.send(request).await?;
    if !response.is_success() {
        debug!(%path, status = response.status, "read rejected");
        return Err(Error::from_status(response.status, path));
    }
    let page = codec::decode_page(&response.body, stream)?;
    debug!(%path, events = page.events.len(), head = page.head_of_stream, "page received");
    Ok(page)
}

/// Run `fut` unless `cancel` fires first.
pub(crate) async fn cancellable<T>(
    cancel: &CancellationToken,
    fut: impl Future<Output = Result<T>>,
) -> Result<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(Error::Cancelled),
        result = fut => result,
    }
}
