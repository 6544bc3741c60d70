//! Subscriptions — live delivery of new events to a consumer.
//!
//! Two flavours share one consumer surface:
//!
//! - **Catch-up**: one consumer, client-side cursor, long-poll reads of the
//!   stream itself. Never re-delivers an event once its version is passed.
//! - **Persistent**: a named competing-consumer group tracked by the server.
//!   Each delivered event carries an [`Acknowledger`] that must be used to
//!   ack or nack it.
//!
//! ```text
//!  fetch task ──► bounded mpsc ──► MessageStream::next()
//!      │   ▲                               │
//!      │   └────── CancellationToken ──────┘
//!      ▼
//!  Transport
//! ```
//!
//! `subscribe` spawns the fetch task on the current tokio runtime. The task
//! stops when the token is cancelled, when the `MessageStream` is dropped,
//! or after delivering a single terminal error.
//!
//! ## Example
//!
//! ```no_run
//! use sourced_streams::{Client, StreamMessage};
//! use sourced_streams::CancellationToken;
//!
//! # async fn run(client: Client) {
//! let cancel = CancellationToken::new();
//! let mut messages = client.catch_up_subscription("orders", 0).subscribe(&cancel);
//!
//! while let Some(message) = messages.next().await {
//!     match message {
//!         StreamMessage::Event { event, .. } => println!("{}", event.version()),
//!         StreamMessage::Error(err) => eprintln!("subscription ended: {err}"),
//!     }
//! }
//! # }
//! ```

mod ack;
mod catch_up;
mod persistent;

pub use ack::{Acknowledger, NackAction};
pub use catch_up::CatchUpSubscription;
pub use persistent::{ConsumerStrategy, PersistentSubscription, SubscriptionSettings};

use std::future::{poll_fn, Future};
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_stream::Stream;
use tokio_util::sync::{CancellationToken, DropGuard, WaitForCancellationFutureOwned};

use crate::error::{Error, Result};
use crate::event::Event;

/// One item delivered to a subscription consumer.
#[derive(Debug)]
pub enum StreamMessage {
    /// A delivered event. Persistent subscriptions attach an acknowledger.
    Event {
        event: Event,
        ack: Option<Acknowledger>,
    },
    /// The subscription failed; no further messages follow.
    Error(Error),
}

impl StreamMessage {
    pub fn event(&self) -> Option<&Event> {
        match self {
            StreamMessage::Event { event, .. } => Some(event),
            StreamMessage::Error(_) => None,
        }
    }

    pub fn error(&self) -> Option<&Error> {
        match self {
            StreamMessage::Error(err) => Some(err),
            StreamMessage::Event { .. } => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, StreamMessage::Error(_))
    }

    /// Split into the event and its acknowledger, or return the error.
    pub fn into_event(self) -> Result<(Event, Option<Acknowledger>)> {
        match self {
            StreamMessage::Event { event, ack } => Ok((event, ack)),
            StreamMessage::Error(err) => Err(err),
        }
    }
}

/// A subscription of either flavour.
#[derive(Debug, Clone)]
pub enum Subscription {
    CatchUp(CatchUpSubscription),
    Persistent(PersistentSubscription),
}

impl Subscription {
    pub fn stream(&self) -> &str {
        match self {
            Subscription::CatchUp(s) => s.stream(),
            Subscription::Persistent(s) => s.stream(),
        }
    }

    /// Start delivering messages. Must be called inside a tokio runtime.
    pub fn subscribe(&self, cancel: &CancellationToken) -> MessageStream {
        match self {
            Subscription::CatchUp(s) => s.subscribe(cancel),
            Subscription::Persistent(s) => s.subscribe(cancel),
        }
    }

    /// Replace the server-side settings of a persistent group.
    ///
    /// Catch-up subscriptions have no server-side settings and are rejected
    /// with [`Error::NotPersistent`].
    pub async fn update(
        &self,
        cancel: &CancellationToken,
        settings: &SubscriptionSettings,
    ) -> Result<()> {
        match self {
            Subscription::Persistent(s) => s.update(cancel, settings).await,
            Subscription::CatchUp(s) => Err(Error::NotPersistent {
                stream: s.stream().to_string(),
            }),
        }
    }

    pub fn as_persistent(&self) -> Option<&PersistentSubscription> {
        match self {
            Subscription::Persistent(s) => Some(s),
            Subscription::CatchUp(_) => None,
        }
    }
}

/// Consumer end of a subscription.
///
/// Also implements [`Stream`], so it can be driven with `StreamExt`. Both
/// ways of polling stop yielding as soon as the token fires, even with
/// messages still buffered.
pub struct MessageStream {
    rx: mpsc::Receiver<StreamMessage>,
    cancel: CancellationToken,
    cancelled: Pin<Box<WaitForCancellationFutureOwned>>,
    _stop_on_drop: DropGuard,
}

impl MessageStream {
    /// Open a hand-off of `capacity` messages. The producer gets the sender
    /// and a token that fires when either the caller cancels or the stream
    /// is dropped.
    pub(crate) fn channel(
        parent: &CancellationToken,
        capacity: usize,
    ) -> (mpsc::Sender<StreamMessage>, CancellationToken, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let cancel = parent.child_token();
        let stream = Self {
            rx,
            cancel: cancel.clone(),
            cancelled: Box::pin(cancel.clone().cancelled_owned()),
            _stop_on_drop: cancel.clone().drop_guard(),
        };
        (tx, cancel, stream)
    }

    /// Wait for the next message. `None` once the subscription has ended or
    /// was cancelled.
    pub async fn next(&mut self) -> Option<StreamMessage> {
        poll_fn(|cx| Pin::new(&mut *self).poll_next(cx)).await
    }
}

impl Stream for MessageStream {
    type Item = StreamMessage;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        // Registers the waker with the token before touching the channel.
        if this.cancel.is_cancelled() || this.cancelled.as_mut().poll(cx).is_ready() {
            return Poll::Ready(None);
        }
        this.rx.poll_recv(cx)
    }
}

/// Hand one message to the consumer. Returns `false` when the producer
/// should stop: cancelled, or the consumer has gone away.
pub(crate) async fn deliver(
    tx: &mpsc::Sender<StreamMessage>,
    cancel: &CancellationToken,
    message: StreamMessage,
) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        sent = tx.send(message) => sent.is_ok(),
    }
}

/// Pause after an empty round. Returns `false` if cancelled meanwhile.
pub(crate) async fn idle(cancel: &CancellationToken, delay: Duration) -> bool {
    if delay.is_zero() {
        tokio::task::yield_now().await;
        return !cancel.is_cancelled();
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}
