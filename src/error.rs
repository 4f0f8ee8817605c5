//! Error types.
//!
//! Each collaborator boundary has its own error enum. The binary wraps
//! them in `anyhow` at the edges; everything below `main` returns these.

use thiserror::Error;

/// Errors raised when a dimension tuple does not fit a table's vocabulary.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("unknown table '{table}' in form '{form}'")]
    UnknownTable { form: String, table: String },

    #[error("table '{table}' has no dimension '{dimension}'")]
    UnknownDimension { table: String, dimension: String },

    #[error("table '{table}' expects {expected} dimension values, got {actual}")]
    Arity {
        table: String,
        expected: usize,
        actual: usize,
    },

    #[error("'{key}' is outside the vocabulary of table '{table}'")]
    OutsideVocabulary { table: String, key: String },

    #[error("count {value} for table '{table}' exceeds the maximum of {max}")]
    CountTooLarge { table: String, value: u64, max: u64 },

    #[error("row total over table '{table}' needs exactly one free dimension, got {free}")]
    NotARow { table: String, free: usize },

    #[error("invalid schema for table '{table}': {reason}")]
    Invalid { table: String, reason: String },
}

/// Errors returned by a persistence backend.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cannot reach store at {url}: {message}")]
    Unreachable { url: String, message: String },

    #[error("store request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("store returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("store payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("store misconfigured: {0}")]
    Config(String),
}

/// Errors surfaced by a form session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("failed to load '{table}': {source}")]
    Load {
        table: String,
        #[source]
        source: StoreError,
    },

    #[error("failed to save '{table}': {source}")]
    Save {
        table: String,
        #[source]
        source: StoreError,
    },
}

/// Errors from the LLM completion endpoint. Never shown to end users
/// directly; the narrative service maps them to fallback messages.
#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error("narrative service not configured: {0}")]
    NotConfigured(String),

    #[error("invalid API key: {0}")]
    Auth(String),

    #[error("request timed out after {0}s")]
    Timeout(u64),

    #[error("cannot connect to LLM endpoint at {0}")]
    Connect(String),

    #[error("failed to send request: {0}")]
    Transport(String),

    #[error("LLM API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to parse LLM response: {0}")]
    Parse(String),
}
