//! Paged readers — fetch a bounded range of a stream page by page.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::client::{cancellable, fetch_page, page_request};
use crate::error::{Error, Result};
use crate::event::Event;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Forward => "forward",
            Direction::Backward => "backward",
        }
    }
}

/// How many events a read should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadCount {
    /// Exactly this many; the read fails if the stream runs out first.
    Exact(usize),
    /// Everything up to the head (forwards) or down to version 0 (backwards).
    All,
}

/// Reads a stream in one direction.
///
/// Every read returns events sorted ascending by version, whatever the
/// direction. A failed page discards everything read so far.
pub struct StreamReader {
    transport: Arc<dyn Transport>,
    stream: String,
    direction: Direction,
    page_size: usize,
}

impl StreamReader {
    pub fn new(
        transport: Arc<dyn Transport>,
        stream: impl Into<String>,
        direction: Direction,
        page_size: usize,
    ) -> Self {
        Self {
            transport,
            stream: stream.into(),
            direction,
            page_size: page_size.max(1),
        }
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Read `count` events starting at `start` (inclusive).
    ///
    /// Returns [`Error::Cancelled`] as soon as `cancel` fires.
    pub async fn read(
        &self,
        cancel: &CancellationToken,
        start: u64,
        count: ReadCount,
    ) -> Result<Vec<Event>> {
        let read = async {
            match self.direction {
                Direction::Forward => self.read_forwards(start, count).await,
                Direction::Backward => self.read_backwards(start, count).await,
            }
        };
        cancellable(cancel, read).await
    }

    async fn read_forwards(&self, start: u64, count: ReadCount) -> Result<Vec<Event>> {
        let mut events = Vec::new();
        let mut cursor = start;

        loop {
            let want = match count {
                ReadCount::Exact(n) if events.len() >= n => break,
                ReadCount::Exact(n) => self.page_size.min(n - events.len()),
                ReadCount::All => self.page_size,
            };

            let request = page_request(&self.stream, cursor, Direction::Forward, want);
            let page = fetch_page(self.transport.as_ref(), request, &self.stream).await?;
            let returned = page.events.len();
            let mut batch = page.events;
            batch.sort_by_key(Event::version);
            events.extend(batch);
            cursor += returned as u64;

            match count {
                ReadCount::All if page.head_of_stream || returned == 0 => break,
                ReadCount::Exact(n) if returned == 0 => {
                    return Err(Error::EndOfStream {
                        requested: n,
                        read: events.len(),
                    })
                }
                _ => {}
            }
        }

        if let ReadCount::Exact(n) = count {
            events.truncate(n);
        }
        debug!(stream = %self.stream, start, events = events.len(), "read forwards");
        Ok(events)
    }

    async fn read_backwards(&self, start: u64, count: ReadCount) -> Result<Vec<Event>> {
        let mut pages: Vec<Vec<Event>> = Vec::new();
        let mut total = 0usize;
        // One past the next position to read, so "below zero" never happens.
        let mut remaining_positions = start + 1;

        loop {
            let want = match count {
                ReadCount::Exact(n) if total >= n => break,
                ReadCount::Exact(n) => self.page_size.min(n - total),
                ReadCount::All => self.page_size,
            };
            if remaining_positions == 0 {
                match count {
                    ReadCount::All => break,
                    ReadCount::Exact(n) => {
                        return Err(Error::EndOfStream {
                            requested: n,
                            read: total,
                        })
                    }
                }
            }
            let want = want.min(usize::try_from(remaining_positions).unwrap_or(usize::MAX));
            let cursor = remaining_positions - 1;

            let request = page_request(&self.stream, cursor, Direction::Backward, want);
            let page = fetch_page(self.transport.as_ref(), request, &self.stream).await?;
            let returned = page.events.len();
            if returned == 0 {
                match count {
                    ReadCount::All => break,
                    ReadCount::Exact(n) => {
                        return Err(Error::EndOfStream {
                            requested: n,
                            read: total,
                        })
                    }
                }
            }

            let mut batch = page.events;
            batch.sort_by_key(Event::version);
            // Continue just below the lowest version received. A start past
            // the end of the stream returns fewer positions than requested.
            let lowest = batch[0].version();
            remaining_positions = lowest.min(remaining_positions - 1);
            total += returned;
            pages.push(batch);
        }

        // Pages arrive newest first; reverse them so the result ascends.
        let mut events: Vec<Event> = pages.into_iter().rev().flatten().collect();
        if let ReadCount::Exact(n) = count {
            let excess = events.len().saturating_sub(n);
            events.drain(..excess);
        }
        debug!(stream = %self.stream, start, events = events.len(), "read backwards");
        Ok(events)
    }
}
