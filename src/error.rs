//! Error taxonomy shared by every component that talks to the event store.
//!
//! Every HTTP call is classified exactly once through [`classify`]; readers,
//! writers, subscriptions and acknowledgers all funnel non-success statuses
//! through [`Error::from_status`].

use thiserror::Error;

/// Flat classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// 404 — the stream (or subscription group) does not exist.
    StreamNotFound,
    /// 401 — credentials missing or rejected.
    Unauthorized,
    /// 500 — the server failed while handling the request.
    InternalServerError,
    /// 400 / 406 — the server rejected the request or response media type.
    InvalidContentType,
    /// The request never produced a response (connection, DNS, TLS, ...).
    TransportFailure,
    /// A response body could not be decoded, or a batch could not be encoded.
    DecodeFailure,
    /// The caller cancelled the operation.
    Cancelled,
    /// An append was rejected because the expected version did not hold.
    ConcurrencyConflict,
    /// Any other non-success status.
    UnexpectedStatus,
    /// The call was rejected locally before or after talking to the server.
    InvalidRequest,
}

/// Map a non-success HTTP status code to an [`ErrorKind`].
pub fn classify(status: u16) -> ErrorKind {
    match status {
        404 => ErrorKind::StreamNotFound,
        401 => ErrorKind::Unauthorized,
        500 => ErrorKind::InternalServerError,
        400 | 406 => ErrorKind::InvalidContentType,
        _ => ErrorKind::UnexpectedStatus,
    }
}

/// Error type for every stream, subscription and acknowledgement operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("stream not found: {path}")]
    StreamNotFound { path: String },

    #[error("unauthorized: {path}")]
    Unauthorized { path: String },

    #[error("internal server error: {path}")]
    InternalServerError { path: String },

    #[error("invalid content type (status {status}): {path}")]
    InvalidContentType { status: u16, path: String },

    #[error("unexpected status {status}: {path}")]
    UnexpectedStatus { status: u16, path: String },

    #[error("concurrency conflict on stream {stream} (expected version {expected}, current {current:?})")]
    ConcurrencyConflict {
        stream: String,
        expected: i64,
        current: Option<i64>,
        status: u16,
    },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("decode failed: {0}")]
    Decode(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("can't write an empty batch")]
    EmptyBatch,

    #[error("end of stream after {read} of {requested} requested events")]
    EndOfStream { requested: usize, read: usize },

    #[error("subscription on stream {stream} is not persistent")]
    NotPersistent { stream: String },

    #[error("expected version {version} is out of range")]
    VersionOutOfRange { version: u64 },
}

impl Error {
    /// Build the classified error for a non-success `status` returned by `path`.
    pub fn from_status(status: u16, path: impl Into<String>) -> Self {
        let path = path.into();
        match classify(status) {
            ErrorKind::StreamNotFound => Error::StreamNotFound { path },
            ErrorKind::Unauthorized => Error::Unauthorized { path },
            ErrorKind::InternalServerError => Error::InternalServerError { path },
            ErrorKind::InvalidContentType => Error::InvalidContentType { status, path },
            _ => Error::UnexpectedStatus { status, path },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::StreamNotFound { .. } => ErrorKind::StreamNotFound,
            Error::Unauthorized { .. } => ErrorKind::Unauthorized,
            Error::InternalServerError { .. } => ErrorKind::InternalServerError,
            Error::InvalidContentType { .. } => ErrorKind::InvalidContentType,
            Error::UnexpectedStatus { .. } => ErrorKind::UnexpectedStatus,
            Error::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Error::Transport(_) => ErrorKind::TransportFailure,
            Error::Decode(_) => ErrorKind::DecodeFailure,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::EmptyBatch
            | Error::EndOfStream { .. }
            | Error::NotPersistent { .. }
            | Error::VersionOutOfRange { .. } => ErrorKind::InvalidRequest,
        }
    }

    /// The HTTP status that produced this error, if it came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::StreamNotFound { .. } => Some(404),
            Error::Unauthorized { .. } => Some(401),
            Error::InternalServerError { .. } => Some(500),
            Error::InvalidContentType { status, .. }
            | Error::UnexpectedStatus { status, .. }
            | Error::ConcurrencyConflict { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Decode(err.to_string())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
