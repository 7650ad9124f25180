use crate::deletion::{DeletionPipeline, PipelineSettings};
use crate::error::{Result, ServiceError};
use linkstore_core::{BatchItem, Context, LinkStorage, OwnerId, ShortCode, StorageError};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace};
use typed_builder::TypedBuilder;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";
pub const DEFAULT_OP_TIMEOUT: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, TypedBuilder)]
pub struct ServiceSettings {
    /// Prefix every short URL is rendered under.
    #[builder(default = DEFAULT_BASE_URL.to_string(), setter(into))]
    pub base_url: String,
    /// Upper bound for each logical operation.
    #[builder(default = DEFAULT_OP_TIMEOUT)]
    pub op_timeout: Duration,
    #[builder(default)]
    pub pipeline: PipelineSettings,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// A batch item after shortening.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShortenedItem {
    pub correlation_id: String,
    pub short_url: String,
}

/// One of an owner's links, rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedUrl {
    pub short_url: String,
    pub original_url: String,
}

/// Link operations on top of any [`LinkStorage`] backend.
///
/// This service handles:
/// - URL validation before anything is stored
/// - A per-operation timeout derived from the caller's context
/// - Rendering codes as full short URLs
/// - Bulk deletion through the [`DeletionPipeline`]
#[derive(Clone)]
pub struct LinkService {
    storage: Arc<dyn LinkStorage>,
    pipeline: DeletionPipeline,
    settings: ServiceSettings,
}

impl std::fmt::Debug for LinkService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkService")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LinkService {
    pub fn new(storage: Arc<dyn LinkStorage>, settings: ServiceSettings) -> Self {
        let pipeline = DeletionPipeline::new(Arc::clone(&storage), settings.pipeline);
        Self {
            storage,
            pipeline,
            settings,
        }
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    /// Validates that the URL has a valid format (http or https scheme and a host).
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ServiceError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ServiceError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {url}"
            )));
        };

        let scheme = scheme.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ServiceError::InvalidUrl(format!(
                "URL scheme must be http or https: {scheme}"
            )));
        }

        let host = rest.split(['/', '?', '#']).next().unwrap_or_default();
        if host.is_empty() {
            return Err(ServiceError::InvalidUrl(format!("URL has no host: {url}")));
        }

        Ok(())
    }

    fn scoped(&self, ctx: &Context) -> Context {
        ctx.with_timeout(self.settings.op_timeout)
    }

    fn short_url(&self, code: &ShortCode) -> String {
        code.to_url(&self.settings.base_url)
    }

    /// Shortens `url` and returns the rendered short URL.
    ///
    /// An already shortened URL fails with [`ServiceError::AlreadyShortened`]
    /// carrying the existing short URL.
    pub async fn shorten(&self, ctx: &Context, url: &str, owner: Option<OwnerId>) -> Result<String> {
        Self::validate_url(url)?;
        trace!(url = %url, "shortening url");

        match self.storage.add(&self.scoped(ctx), url, owner).await {
            Ok(code) => {
                debug!(code = %code, "url shortened");
                Ok(self.short_url(&code))
            }
            Err(StorageError::Conflict { code }) => Err(ServiceError::AlreadyShortened {
                short_url: self.short_url(&code),
            }),
            Err(err) => Err(err.into()),
        }
    }

    /// Shortens several URLs at once. Every URL is validated before any is stored.
    pub async fn shorten_batch(
        &self,
        ctx: &Context,
        owner: Option<OwnerId>,
        items: &[BatchItem],
    ) -> Result<Vec<ShortenedItem>> {
        for item in items {
            Self::validate_url(&item.origin)?;
        }

        let results = self
            .storage
            .add_batch(&self.scoped(ctx), owner, items)
            .await?;
        debug!(items = results.len(), "url batch shortened");

        Ok(results
            .into_iter()
            .map(|result| ShortenedItem {
                short_url: self.short_url(&result.code),
                correlation_id: result.correlation_id,
            })
            .collect())
    }

    /// Resolves a code to the URL it was created for.
    pub async fn resolve(&self, ctx: &Context, code: &str) -> Result<String> {
        let code = ShortCode::new(code)?;
        Ok(self.storage.get(&self.scoped(ctx), &code).await?)
    }

    pub async fn links_for_owner(&self, ctx: &Context, owner: OwnerId) -> Result<Vec<OwnedUrl>> {
        let links = self
            .storage
            .get_links_by_owner(&self.scoped(ctx), owner)
            .await?;

        Ok(links
            .into_iter()
            .map(|link| OwnedUrl {
                short_url: self.short_url(&link.code),
                original_url: link.origin,
            })
            .collect())
    }

    /// Soft-deletes the codes owned by `owner` through the deletion pipeline.
    pub async fn delete_links(&self, ctx: &Context, codes: &[String], owner: OwnerId) -> Result<()> {
        let codes = codes
            .iter()
            .map(|code| ShortCode::new(code.as_str()))
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.pipeline.run(&self.scoped(ctx), &codes, owner).await?;
        info!(owner = %owner, codes = codes.len(), "links deleted");
        Ok(())
    }

    pub async fn register_owner(&self, ctx: &Context) -> Result<OwnerId> {
        let owner = self.storage.register_owner(&self.scoped(ctx)).await?;
        info!(owner = %owner, "owner registered");
        Ok(owner)
    }

    pub async fn ping(&self, ctx: &Context) -> Result<()> {
        Ok(self.storage.ping(&self.scoped(ctx)).await?)
    }

    pub async fn close(&self) -> Result<()> {
        Ok(self.storage.close().await?)
    }
}
