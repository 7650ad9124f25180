use crate::error::{Result, ServiceError};
use linkstore_core::{LinkStorage, RandomGenerator};
use linkstore_storage::{LogStore, MySqlStorage};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;
use typed_builder::TypedBuilder;

pub const DEFAULT_FILE_STORAGE_PATH: &str = "shorter.jsonl";

/// Which [`LinkStorage`] implementation backs the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Backend {
    /// In-memory index persisted to an append-only event log.
    #[default]
    Log,
    MySql,
}

impl Display for Backend {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Log => write!(f, "log"),
            Backend::MySql => write!(f, "mysql"),
        }
    }
}

#[derive(Debug, Clone, TypedBuilder)]
pub struct StorageConfig {
    #[builder(default)]
    pub backend: Backend,
    /// Event log location, used by [`Backend::Log`].
    #[builder(default = PathBuf::from(DEFAULT_FILE_STORAGE_PATH), setter(into))]
    pub file_path: PathBuf,
    /// Connection string, required by [`Backend::MySql`].
    #[builder(default, setter(into))]
    pub mysql_dsn: Option<String>,
    /// Prepended to every generated code.
    #[builder(default, setter(into))]
    pub code_prefix: String,
}

impl StorageConfig {
    /// Opens the configured backend. The log backend replays its file first.
    pub async fn open(&self) -> Result<Arc<dyn LinkStorage>> {
        let generator = RandomGenerator::with_prefix(self.code_prefix.clone());

        let storage: Arc<dyn LinkStorage> = match self.backend {
            Backend::Log => Arc::new(LogStore::open(&self.file_path, generator)?),
            Backend::MySql => {
                let dsn = self.mysql_dsn.as_deref().ok_or_else(|| {
                    ServiceError::Config(
                        "mysql dsn is required when storage backend is mysql".to_string(),
                    )
                })?;
                Arc::new(MySqlStorage::connect(dsn, generator).await?)
            }
        };

        info!(backend = %self.backend, "storage opened");
        Ok(storage)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use linkstore_core::Context;
    use tempfile::TempDir;

    #[test]
    fn defaults_to_log_backend() {
        let config = StorageConfig::builder().build();

        assert_eq!(config.backend, Backend::Log);
        assert_eq!(config.file_path, PathBuf::from("shorter.jsonl"));
        assert!(config.mysql_dsn.is_none());
    }

    #[tokio::test]
    async fn opens_log_backend_with_prefix() {
        let dir = TempDir::new().unwrap();
        let config = StorageConfig::builder()
            .file_path(dir.path().join("links.jsonl"))
            .code_prefix("lk")
            .build();

        let storage = config.open().await.unwrap();
        let code = storage
            .add(&Context::background(), "https://example.com", None)
            .await
            .unwrap();

        assert!(code.as_str().starts_with("lk"));
        assert!(dir.path().join("links.jsonl").exists());
    }

    #[tokio::test]
    async fn mysql_backend_requires_dsn() {
        let config = StorageConfig::builder().backend(Backend::MySql).build();

        let Err(err) = config.open().await else {
            panic!("mysql backend opened without a dsn");
        };

        assert!(matches!(err, ServiceError::Config(_)));
    }
}
