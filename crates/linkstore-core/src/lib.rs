//! Core types and traits for the linkstore engine.
//!
//! This crate provides the storage contract shared by every backend, the
//! cancellation [`Context`] threaded through each operation, and the short
//! code generators used when a new link is created.

pub mod base58;
pub mod context;
pub mod error;
pub mod generator;
pub mod record;
pub mod shortcode;
pub mod storage;

pub use context::Context;
pub use error::{BatchFailure, Result, StorageError};
pub use generator::{Generator, RandomGenerator, SeqGenerator};
pub use record::{BatchItem, BatchResult, LinkRecord, OwnerId, OwnerLink};
pub use shortcode::ShortCode;
pub use storage::LinkStorage;
