use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use crate::client::cancellable;
use crate::error::{Error, Result};
use crate::transport::{segment, Request, Transport};

/// What the server should do with a negatively acknowledged event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NackAction {
    /// Hold the event for manual intervention.
    Park,
    /// Redeliver the event.
    Retry,
    /// Drop the event and move on.
    Skip,
    /// Stop the subscription.
    Stop,
}

impl NackAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            NackAction::Park => "park",
            NackAction::Retry => "retry",
            NackAction::Skip => "skip",
            NackAction::Stop => "stop",
        }
    }
}

impl fmt::Display for NackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settles one event delivered by a persistent subscription.
///
/// Holds only the identifiers needed to address the server. `ack` and
/// `nack` consume the handle, so each delivery is settled at most once;
/// dropping it unsettled leaves redelivery to the server's timeout.
///
/// The handle cannot be duplicated:
///
/// ```compile_fail
/// fn settle_twice(ack: sourced_streams::Acknowledger) {
///     let _copy = ack.clone();
/// }
/// ```
pub struct Acknowledger {
    transport: Arc<dyn Transport>,
    stream: String,
    group: String,
    event_id: Uuid,
}

impl fmt::Debug for Acknowledger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Acknowledger")
            .field("stream", &self.stream)
            .field("group", &self.group)
            .field("event_id", &self.event_id)
            .finish_non_exhaustive()
    }
}

impl Acknowledger {
    pub(crate) fn new(
        transport: Arc<dyn Transport>,
        stream: impl Into<String>,
        group: impl Into<String>,
        event_id: Uuid,
    ) -> Self {
        Self {
            transport,
            stream: stream.into(),
            group: group.into(),
            event_id,
        }
    }

    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    /// Tell the server the event was processed.
    pub async fn ack(self, cancel: &CancellationToken) -> Result<()> {
        let request = Request::post(self.path("ack"));
        cancellable(cancel, self.settle(request)).await
    }

    /// Tell the server the event was not processed, and what to do with it.
    pub async fn nack(self, cancel: &CancellationToken, action: NackAction) -> Result<()> {
        let request = Request::post(self.path("nack")).query("action", action.as_str());
        cancellable(cancel, self.settle(request)).await
    }

    fn path(&self, verb: &str) -> String {
        format!(
            "/subscriptions/{}/{}/{verb}/{}",
            segment(&self.stream),
            segment(&self.group),
            self.event_id
        )
    }

    async fn settle(&self, request: Request) -> Result<()> {
        let path = request.path.clone();
        let response = self.transport.send(request).await?;
        if !response.is_success() {
            return Err(Error::from_status(response.status, path));
        }
        debug!(%path, "settled");
        Ok(())
    }
}
