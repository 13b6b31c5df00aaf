//! Error types for the survey store and navigation state

use thiserror::Error;

/// Failures talking to the measurement document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Malformed document for {location}: {source}")]
    MalformedDocument {
        location: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Store read timed out after {0} ms")]
    Timeout(u64),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// A navigation request that was refused. State is left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SelectionError {
    #[error("{value} is not among the available {axis} values")]
    NotACandidate { axis: &'static str, value: String },

    #[error("Unknown metric: {0}")]
    UnknownMetric(String),

    #[error("Invalid {axis} value: {value}")]
    InvalidValue { axis: &'static str, value: String },

    #[error("No data available for {0}")]
    NoData(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;
