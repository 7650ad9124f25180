//! Link service built on the linkstore backends.
//!
//! This crate wires a [`LinkStorage`](linkstore_core::LinkStorage) backend
//! chosen through [`StorageConfig`] into a [`LinkService`], and provides the
//! fan-out [`DeletionPipeline`] used for bulk deletes.

pub mod config;
pub mod deletion;
pub mod error;
pub mod service;

pub use config::{Backend, StorageConfig};
pub use deletion::{partition, DeletionPipeline, PipelineSettings};
pub use error::{Result, ServiceError};
pub use service::{LinkService, OwnedUrl, ServiceSettings, ShortenedItem};
