use linkstore_core::shortcode::InvalidShortCode;
use linkstore_core::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ServiceError>;

#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    /// The origin was shortened before. `short_url` is the existing link.
    #[error("url already shortened as {short_url}")]
    AlreadyShortened { short_url: String },
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<InvalidShortCode> for ServiceError {
    fn from(value: InvalidShortCode) -> Self {
        Self::InvalidShortCode(value.0)
    }
}
