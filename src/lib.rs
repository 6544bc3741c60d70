//! Client for append-only event streams served over HTTP.
//!
//! - [`StreamReader`]: paged forward/backward reads, always returned ascending.
//! - [`StreamWriter`]: version-ordered batch appends with an expected-version
//!   precondition.
//! - [`Subscription`]: catch-up (client cursor, long-poll) or persistent
//!   (server-tracked competing consumers with [`Acknowledger`]s).
//!
//! Everything talks to the server through the [`Transport`] trait;
//! [`HttpTransport`] (feature `http`, on by default) is the stock
//! implementation.

mod client;
mod codec;
mod config;
mod error;
mod event;
mod reader;
mod subscription;
mod transport;
mod writer;

pub use client::Client;
pub use codec::{decode_page, encode_batch, StreamPage};
pub use config::ClientConfig;
pub use error::{classify, Error, ErrorKind, Result};
pub use event::{Event, ExpectedVersion};
pub use reader::{Direction, ReadCount, StreamReader};
pub use subscription::{
    Acknowledger, CatchUpSubscription, ConsumerStrategy, MessageStream, NackAction,
    PersistentSubscription, StreamMessage, Subscription, SubscriptionSettings,
};
pub use transport::{Method, Request, Response, Transport};
#[cfg(feature = "http")]
pub use transport::{Credentials, HttpTransport, DEFAULT_HOST};
pub use writer::StreamWriter;

// Re-exported so callers don't need a direct tokio-util dependency.
pub use tokio_util::sync::CancellationToken;
