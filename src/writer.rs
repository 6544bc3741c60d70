//! Batch writer — version-ordered appends with an optimistic-concurrency check.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::cancellable;
use crate::codec;
use crate::error::{Error, ErrorKind, Result};
use crate::event::{Event, ExpectedVersion};
use crate::transport::{
    segment, Request, Response, Transport, CONTENT_TYPE_EVENTS, HEADER_CURRENT_VERSION,
    HEADER_EXPECTED_VERSION,
};

/// Appends batches to one stream.
///
/// The precondition is always the one the caller passes; the writer never
/// derives it from the batch. A batch starting at version 0 of a new stream
/// goes with [`ExpectedVersion::NoStream`], a batch continuing after version
/// `n` goes with `ExpectedVersion::Exact(n)`.
pub struct StreamWriter {
    transport: Arc<dyn Transport>,
    stream: String,
}

impl StreamWriter {
    pub fn new(transport: Arc<dyn Transport>, stream: impl Into<String>) -> Self {
        Self {
            transport,
            stream: stream.into(),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Append `events` in ascending version order, all or nothing.
    ///
    /// Succeeds only on `201 Created`. Cancelling aborts the request if it
    /// has not completed, but cannot retract an append the server already
    /// committed.
    pub async fn write(
        &self,
        cancel: &CancellationToken,
        expected: ExpectedVersion,
        events: &[Event],
    ) -> Result<()> {
        if events.is_empty() {
            return Err(Error::EmptyBatch);
        }
        let expected_version = expected.as_i64()?;

        let mut batch = events.to_vec();
        batch.sort_by_key(Event::version);
        let body = codec::encode_batch(&batch)?;

        let path = format!("/streams/{}", segment(&self.stream));
        let request = Request::post(path.clone())
            .header("Content-Type", CONTENT_TYPE_EVENTS)
            .header(HEADER_EXPECTED_VERSION, expected_version.to_string())
            .body(body);

        let response = cancellable(cancel, self.transport.send(request)).await?;
        if response.status == 201 {
            debug!(stream = %self.stream, events = batch.len(), %expected, "appended");
            return Ok(());
        }

        let err = self.rejection(&response, expected_version, path);
        warn!(stream = %self.stream, status = response.status, error = %err, "append rejected");
        Err(err)
    }

    fn rejection(&self, response: &Response, expected: i64, path: String) -> Error {
        let current = response
            .header(HEADER_CURRENT_VERSION)
            .and_then(|v| v.trim().parse::<i64>().ok());
        let conflict = || Error::ConcurrencyConflict {
            stream: self.stream.clone(),
            expected,
            current,
            status: response.status,
        };

        if current.is_some() {
            return conflict();
        }
        let err = Error::from_status(response.status, path);
        if err.kind() == ErrorKind::UnexpectedStatus {
            conflict()
        } else {
            err
        }
    }
}
