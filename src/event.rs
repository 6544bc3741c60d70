//! Event envelope and the append precondition.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::error::Error;

/// An immutable event, either built by the caller for an append or
/// hydrated from a read.
///
/// Data and metadata are opaque bytes; they are sent and received exactly
/// as given. Builder methods consume and return the event, so a value is
/// never changed once it has been handed to a writer or a consumer.
///
/// ## Example
///
/// ```
/// use sourced_streams::Event;
///
/// let event = Event::new("OrderPlaced", r#"{"order":"o-1"}"#)
///     .with_version(0)
///     .with_metadata(r#"{"correlation_id":"req-9"}"#);
///
/// assert_eq!(event.event_type(), "OrderPlaced");
/// assert_eq!(event.data_str(), Some(r#"{"order":"o-1"}"#));
/// assert!(event.is_json());
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    id: Uuid,
    stream: String,
    event_type: String,
    version: u64,
    data: Vec<u8>,
    metadata: Vec<u8>,
    is_json: bool,
    created: Option<DateTime<Utc>>,
}

impl Event {
    /// Create a JSON event with a fresh id.
    pub fn new(event_type: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            stream: String::new(),
            event_type: event_type.into(),
            version: 0,
            data: data.into(),
            metadata: Vec::new(),
            is_json: true,
            created: None,
        }
    }

    /// Create a JSON event by serializing `payload` with serde.
    pub fn json<T: serde::Serialize>(
        event_type: impl Into<String>,
        payload: &T,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self::new(event_type, serde_json::to_vec(payload)?))
    }

    pub fn with_id(mut self, id: Uuid) -> Self {
        self.id = id;
        self
    }

    pub fn with_stream(mut self, stream: impl Into<String>) -> Self {
        self.stream = stream.into();
        self
    }

    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn with_metadata(mut self, metadata: impl Into<Vec<u8>>) -> Self {
        self.metadata = metadata.into();
        self
    }

    /// Mark the data as binary (not JSON). It is then sent as a string.
    pub fn binary(mut self) -> Self {
        self.is_json = false;
        self
    }

    pub fn with_created(mut self, created: DateTime<Utc>) -> Self {
        self.created = Some(created);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn stream(&self) -> &str {
        &self.stream
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Zero-based position of the event in its stream.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    pub fn is_json(&self) -> bool {
        self.is_json
    }

    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.created
    }

    /// Get the data as a string (if valid UTF-8).
    pub fn data_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.data).ok()
    }

    /// Deserialize the JSON data into `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.data)
    }
}

/// Optimistic-concurrency precondition sent with every append.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ExpectedVersion {
    /// Append regardless of the current version.
    Any,
    /// The stream must not exist yet.
    NoStream,
    /// The stream must exist, at any version.
    StreamExists,
    /// The last event in the stream must have this version.
    Exact(u64),
}

impl ExpectedVersion {
    /// The integer value carried by the `ES-ExpectedVersion` header.
    ///
    /// Fails for an exact version beyond `i64::MAX`, which the server
    /// cannot represent.
    pub fn as_i64(self) -> Result<i64, Error> {
        match self {
            ExpectedVersion::Any => Ok(-2),
            ExpectedVersion::NoStream => Ok(-1),
            ExpectedVersion::StreamExists => Ok(-4),
            ExpectedVersion::Exact(version) => {
                i64::try_from(version).map_err(|_| Error::VersionOutOfRange { version })
            }
        }
    }
}

impl fmt::Display for ExpectedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedVersion::Any => f.write_str("-2"),
            ExpectedVersion::NoStream => f.write_str("-1"),
            ExpectedVersion::StreamExists => f.write_str("-4"),
            ExpectedVersion::Exact(version) => write!(f, "{version}"),
        }
    }
}
