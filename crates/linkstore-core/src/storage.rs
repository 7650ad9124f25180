use crate::context::Context;
use crate::error::Result;
use crate::record::{BatchItem, BatchResult, OwnerId, OwnerLink};
use crate::shortcode::ShortCode;
use async_trait::async_trait;
use std::sync::Arc;

/// The operation set every link backend implements.
///
/// Callers hold one implementation, usually as `Arc<dyn LinkStorage>`, chosen
/// at startup. Every operation except [`LinkStorage::close`] checks its
/// [`Context`] before doing any work.
#[async_trait]
pub trait LinkStorage: Send + Sync + 'static {
    /// Stores `origin` under a freshly generated code.
    ///
    /// If a live record already holds `origin`, nothing is written and
    /// `Err(StorageError::Conflict { code })` carries the existing code.
    async fn add(&self, ctx: &Context, origin: &str, owner: Option<OwnerId>) -> Result<ShortCode>;

    /// Stores several origins at once.
    ///
    /// Atomicity is backend specific: relational backends are all-or-nothing,
    /// the log-backed backend keeps the items that preceded a failure and
    /// reports them through `StorageError::PartialBatch`.
    async fn add_batch(
        &self,
        ctx: &Context,
        owner: Option<OwnerId>,
        items: &[BatchItem],
    ) -> Result<Vec<BatchResult>>;

    /// Resolves a code to its origin.
    ///
    /// Returns `NotFound` for codes that never existed and `Gone` for
    /// soft-deleted ones.
    async fn get(&self, ctx: &Context, code: &ShortCode) -> Result<String>;

    /// Lists the live links created by `owner`, oldest first.
    async fn get_links_by_owner(&self, ctx: &Context, owner: OwnerId) -> Result<Vec<OwnerLink>>;

    /// Soft-deletes the given codes that belong to `owner`.
    ///
    /// Codes owned by someone else, or unknown codes, are skipped silently.
    async fn delete_links(&self, ctx: &Context, codes: &[ShortCode], owner: OwnerId) -> Result<()>;

    /// Allocates a new owner id.
    async fn register_owner(&self, ctx: &Context) -> Result<OwnerId>;

    async fn ping(&self, ctx: &Context) -> Result<()>;

    /// Releases the backend. Safe to call more than once.
    async fn close(&self) -> Result<()>;
}

#[async_trait]
impl<S: LinkStorage + ?Sized> LinkStorage for Arc<S> {
    async fn add(&self, ctx: &Context, origin: &str, owner: Option<OwnerId>) -> Result<ShortCode> {
        (**self).add(ctx, origin, owner).await
    }

    async fn add_batch(
        &self,
        ctx: &Context,
        owner: Option<OwnerId>,
        items: &[BatchItem],
    ) -> Result<Vec<BatchResult>> {
        (**self).add_batch(ctx, owner, items).await
    }

    async fn get(&self, ctx: &Context, code: &ShortCode) -> Result<String> {
        (**self).get(ctx, code).await
    }

    async fn get_links_by_owner(&self, ctx: &Context, owner: OwnerId) -> Result<Vec<OwnerLink>> {
        (**self).get_links_by_owner(ctx, owner).await
    }

    async fn delete_links(&self, ctx: &Context, codes: &[ShortCode], owner: OwnerId) -> Result<()> {
        (**self).delete_links(ctx, codes, owner).await
    }

    async fn register_owner(&self, ctx: &Context) -> Result<OwnerId> {
        (**self).register_owner(ctx).await
    }

    async fn ping(&self, ctx: &Context) -> Result<()> {
        (**self).ping(ctx).await
    }

    async fn close(&self) -> Result<()> {
        (**self).close().await
    }
}
