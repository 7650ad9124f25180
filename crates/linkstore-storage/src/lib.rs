//! Storage backends for linkstore.
//!
//! Two interchangeable implementations of [`LinkStorage`]:
//!
//! - [`LogStore`]: an in-memory index made durable by an append-only
//!   NDJSON event log, replayed on startup.
//! - [`MySqlStorage`]: a relational backend with transactional batch inserts.

pub mod event_log;
pub mod log_store;
pub mod mysql;

pub use event_log::{LogConsumer, LogEntry, LogEvent, LogProducer, OwnerRegistration};
pub use linkstore_core::{
    BatchItem, BatchResult, Context, LinkStorage, OwnerId, OwnerLink, Result, ShortCode,
    StorageError,
};
pub use log_store::{LogStore, StoreState};
pub use mysql::MySqlStorage;
