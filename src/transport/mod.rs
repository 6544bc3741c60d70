//! Transport — the HTTP seam between the stream engine and the network.
//!
//! Readers, writers, subscriptions and acknowledgers only ever see an
//! `Arc<dyn Transport>`. Host selection, credentials and default headers
//! belong to the transport implementation.
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │ StreamReader / StreamWriter / Subscription    │
//! │   build Request { method, path, query, ... }  │
//! └───────────────────────────────────────────────┘
//!                        │ send(request)
//!                        ▼
//! ┌───────────────────────────────────────────────┐
//! │ Transport trait                               │
//! └───────────────────────────────────────────────┘
//!          │                        │
//!          ▼                        ▼
//!  ┌───────────────┐       ┌─────────────────┐
//!  │ HttpTransport │       │ your own client │
//!  │ (reqwest)     │       │                 │
//!  └───────────────┘       └─────────────────┘
//! ```

use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};

use crate::error::Error;

#[cfg(feature = "http")]
mod http;

#[cfg(feature = "http")]
pub use http::{Credentials, HttpTransport, DEFAULT_HOST};

pub(crate) const ACCEPT_ATOM: &str = "application/vnd.eventstore.atom+json";
pub(crate) const ACCEPT_COMPETING: &str = "application/vnd.eventstore.competingatom+json";
pub(crate) const CONTENT_TYPE_EVENTS: &str = "application/vnd.eventstore.events+json";
pub(crate) const CONTENT_TYPE_JSON: &str = "application/json";
pub(crate) const HEADER_LONG_POLL: &str = "ES-LongPoll";
pub(crate) const HEADER_EXPECTED_VERSION: &str = "ES-ExpectedVersion";
pub(crate) const HEADER_CURRENT_VERSION: &str = "ES-CurrentVersion";

/// Characters that would end or split a path segment, plus `%` itself.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'/')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}');

/// Percent-encode a stream or group name for use as one path segment.
pub(crate) fn segment(name: &str) -> String {
    utf8_percent_encode(name, SEGMENT).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
        }
    }
}

/// A request relative to the transport's base address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: Method,
    /// Path beginning with `/`, e.g. `/streams/orders`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl Request {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::Put, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = Some(body);
        self
    }

    /// Look up a header by name, ignoring case.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Look up a query parameter by exact name.
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Response {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Look up a header by name, ignoring case.
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Sends requests to the event store.
///
/// Implementations must be cancel-safe: callers abandon the returned
/// future when their cancellation token fires.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: Request) -> Result<Response, Error>;
}
