use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Identifier of the user that owns a set of links.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(i64);

impl OwnerId {
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    pub const fn get(self) -> i64 {
        self.0
    }
}

impl From<i64> for OwnerId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

impl Display for OwnerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One stored code to origin mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkRecord {
    pub code: ShortCode,
    /// The original URL that was shortened.
    pub origin: String,
    pub owner: Option<OwnerId>,
    /// Soft-delete flag. Deleted records stay in storage but no longer resolve.
    pub deleted: bool,
}

impl LinkRecord {
    pub fn new(code: ShortCode, origin: impl Into<String>, owner: Option<OwnerId>) -> Self {
        Self {
            code,
            origin: origin.into(),
            owner,
            deleted: false,
        }
    }

    pub fn is_live(&self) -> bool {
        !self.deleted
    }
}

/// One item of a batch add request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Caller-chosen id echoed back in the matching [`BatchResult`].
    pub correlation_id: String,
    pub origin: String,
}

impl BatchItem {
    pub fn new(correlation_id: impl Into<String>, origin: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            origin: origin.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchResult {
    pub correlation_id: String,
    pub code: ShortCode,
}

/// A link as listed for its owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerLink {
    pub code: ShortCode,
    pub origin: String,
}
