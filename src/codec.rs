//! Wire format for event envelopes.
//!
//! Pages come back as `{ "entries": [...], "headOfStream": bool }`. Payloads
//! are carried through [`RawValue`] so embedded JSON is never re-marshaled:
//! a string value yields its contents, any other JSON value yields its raw
//! text, byte for byte.
//!
//! The server sends JSON bodies either embedded or as a string holding the
//! JSON text, so the two cannot be told apart on the way back. A JSON event
//! whose data is itself a string literal (`"abc"`) is therefore read back
//! unquoted (`abc`). Wrap such values in an object or array to keep them
//! intact.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::event::Event;

/// One decoded page of a stream or subscription read.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct StreamPage {
    pub events: Vec<Event>,
    /// Set by the server when the page reaches the current end of the stream.
    pub head_of_stream: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePage {
    #[serde(default)]
    entries: Vec<WireEntry>,
    #[serde(default)]
    head_of_stream: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEntry {
    event_id: Uuid,
    #[serde(default)]
    event_type: String,
    event_number: u64,
    #[serde(default)]
    data: Option<Box<RawValue>>,
    #[serde(rename = "metaData", default)]
    meta_data: Option<Box<RawValue>>,
    #[serde(default)]
    stream_id: String,
    #[serde(default)]
    is_json: bool,
    #[serde(default)]
    updated: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct OutgoingEvent<'a> {
    event_id: Uuid,
    event_type: &'a str,
    event_number: u64,
    data: Payload<'a>,
    #[serde(rename = "metaData", skip_serializing_if = "Option::is_none")]
    meta_data: Option<Payload<'a>>,
    #[serde(skip_serializing_if = "str::is_empty")]
    stream_id: &'a str,
    is_json: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    updated: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Payload<'a> {
    Raw(&'a RawValue),
    Text(&'a str),
}

/// Decode a page body. Entries without a `streamId` take `stream`.
pub fn decode_page(body: &[u8], stream: &str) -> Result<StreamPage> {
    let page: WirePage = serde_json::from_slice(body)?;
    let events = page
        .entries
        .into_iter()
        .map(|entry| entry.into_event(stream))
        .collect::<Result<Vec<_>>>()?;
    Ok(StreamPage {
        events,
        head_of_stream: page.head_of_stream,
    })
}

/// Encode a batch as a JSON array, in the order given.
pub fn encode_batch(events: &[Event]) -> Result<Vec<u8>> {
    let outgoing = events
        .iter()
        .map(OutgoingEvent::from_event)
        .collect::<Result<Vec<_>>>()?;
    serde_json::to_vec(&outgoing).map_err(|e| Error::Decode(format!("unable to encode batch: {e}")))
}

impl WireEntry {
    fn into_event(self, stream: &str) -> Result<Event> {
        let stream = if self.stream_id.is_empty() {
            stream.to_string()
        } else {
            self.stream_id
        };

        let mut event = Event::new(self.event_type, payload_bytes(self.data.as_deref())?)
            .with_id(self.event_id)
            .with_stream(stream)
            .with_version(self.event_number)
            .with_metadata(payload_bytes(self.meta_data.as_deref())?);
        if !self.is_json {
            event = event.binary();
        }
        if let Some(updated) = self.updated {
            event = event.with_created(updated);
        }
        Ok(event)
    }
}

fn payload_bytes(raw: Option<&RawValue>) -> Result<Vec<u8>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let text = raw.get();
    if text == "null" {
        return Ok(Vec::new());
    }
    if text.starts_with('"') {
        let unquoted: String = serde_json::from_str(text)?;
        return Ok(unquoted.into_bytes());
    }
    Ok(text.as_bytes().to_vec())
}

impl<'a> OutgoingEvent<'a> {
    fn from_event(event: &'a Event) -> Result<Self> {
        let meta_data = if event.metadata().is_empty() {
            None
        } else {
            Some(payload(event.metadata(), event.is_json())?)
        };
        Ok(Self {
            event_id: event.id(),
            event_type: event.event_type(),
            event_number: event.version(),
            data: payload(event.data(), event.is_json())?,
            meta_data,
            stream_id: event.stream(),
            is_json: event.is_json(),
            updated: event.created(),
        })
    }
}

fn payload(bytes: &[u8], is_json: bool) -> Result<Payload<'_>> {
    if is_json {
        if let Ok(raw) = serde_json::from_slice::<&RawValue>(bytes) {
            return Ok(Payload::Raw(raw));
        }
    }
    std::str::from_utf8(bytes)
        .map(Payload::Text)
        .map_err(|_| Error::Decode("payload is not valid UTF-8".to_string()))
}
