use crate::record::{BatchResult, OwnerId};
use crate::shortcode::ShortCode;
use std::fmt::{Display, Formatter};
use thiserror::Error;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum StorageError {
    #[error("short code not found: {0}")]
    NotFound(String),
    #[error("short code has been deleted: {0}")]
    Gone(String),
    /// The origin is already shortened. The carried code is live and usable.
    #[error("origin already shortened as {code}")]
    Conflict { code: ShortCode },
    #[error("no links found for owner {0}")]
    NoLinksByOwner(OwnerId),
    #[error("event log i/o failed: {0}")]
    Io(String),
    #[error("event log is corrupt at line {line}: {message}")]
    CorruptLog { line: usize, message: String },
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
    /// A non-transactional batch stopped early. `committed` is durable.
    #[error("batch stopped after {} committed item(s): {}", .committed.len(), .source)]
    PartialBatch {
        committed: Vec<BatchResult>,
        source: Box<StorageError>,
    },
    #[error("{} delete batch(es) failed: {}", .0.len(), join_failures(.0))]
    PartialBatchFailure(Vec<BatchFailure>),
    #[error("operation cancelled")]
    Cancelled,
    #[error("operation deadline exceeded")]
    DeadlineExceeded,
    #[error("storage is closed")]
    Closed,
    #[error("no unused short code after {0} attempts")]
    CodeSpaceExhausted(usize),
}

impl StorageError {
    /// Returns `true` for errors raised by the caller's [`Context`](crate::Context).
    pub fn is_cancellation(&self) -> bool {
        matches!(self, StorageError::Cancelled | StorageError::DeadlineExceeded)
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io(err.to_string())
    }
}

/// One failed batch of a fan-out delete.
#[derive(Debug, Clone)]
pub struct BatchFailure {
    /// Position of the batch in the partitioned input.
    pub batch_index: usize,
    pub codes: Vec<ShortCode>,
    pub source: StorageError,
}

impl Display for BatchFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "batch #{} ({} codes): {}",
            self.batch_index,
            self.codes.len(),
            self.source
        )
    }
}

fn join_failures(failures: &[BatchFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
