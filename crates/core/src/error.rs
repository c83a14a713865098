//! Unified error types for trawl.
//!
//! [`Error`] covers caller misuse and cache persistence. [`SourceError`] is the
//! per-lane failure taxonomy: it is attached to a source's lane state and never
//! propagates across lanes.

use rmcp::model::{ErrorCode, ErrorData as McpError};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::rusqlite;

/// Unified error types for trawl.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., an empty query).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// No provider is registered under the given source id.
    #[error("UNKNOWN_SOURCE: {0}")]
    UnknownSource(String),

    /// A provider with the same source id is already registered.
    #[error("DUPLICATE_SOURCE: {0}")]
    DuplicateSource(String),

    /// An HTTP client could not be constructed for a provider.
    #[error("CLIENT_BUILD: {0}")]
    ClientBuild(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// A persisted cache entry could not be encoded or decoded.
    #[error("CACHE_ERROR: corrupt entry: {0}")]
    CorruptEntry(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::CorruptEntry(err.to_string())
    }
}

impl From<Error> for McpError {
    fn from(err: Error) -> Self {
        let (code, message) = match &err {
            Error::InvalidInput(msg) => (-32602, msg.clone()),
            Error::UnknownSource(id) => (-32602, format!("unknown source: {id}")),
            Error::DuplicateSource(id) => (-32603, format!("duplicate source: {id}")),
            Error::ClientBuild(msg) => (-32603, msg.clone()),
            Error::Database(e) => (-32002, e.to_string()),
            Error::MigrationFailed(msg) => (-32002, msg.clone()),
            Error::CorruptEntry(msg) => (-32002, msg.clone()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}

/// Failure of a single source's page fetch.
///
/// Caught at the lane boundary: a failing source shows its error in its own
/// lane while the other lanes keep their results.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceError {
    /// The source did not answer within its timeout.
    #[error("TIMEOUT: no response within {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The source needs credentials or configuration that are missing.
    #[error("NOT_CONFIGURED: {hint}")]
    NotConfigured { hint: String },

    /// Non-success status or transport failure.
    #[error("UPSTREAM_ERROR: {message}")]
    Upstream { message: String },

    /// The payload did not match the shape the adapter expects.
    #[error("MALFORMED_RESPONSE: {message}")]
    MalformedResponse { message: String },

    /// The stored cursor belongs to a different pagination idiom.
    #[error("INVALID_CURSOR: expected {expected}, found {found}")]
    InvalidCursor { expected: String, found: String },
}

impl SourceError {
    pub fn upstream(message: impl Into<String>) -> Self {
        SourceError::Upstream { message: message.into() }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        SourceError::MalformedResponse { message: message.into() }
    }

    pub fn not_configured(hint: impl Into<String>) -> Self {
        SourceError::NotConfigured { hint: hint.into() }
    }

    /// Whether the caller should show a setup hint rather than a transient error.
    pub fn is_setup_problem(&self) -> bool {
        matches!(self, SourceError::NotConfigured { .. })
    }
}
