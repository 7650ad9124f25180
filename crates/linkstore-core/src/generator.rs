use crate::shortcode::ShortCode;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Trait for generating short codes.
///
/// Implementations are pure generators that don't interact with storage.
/// Backends check the generated code against what they already hold and
/// ask again on a collision, so a generator only needs to make collisions
/// unlikely, not impossible.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortCode;
}

/// Random codes: an optional prefix followed by a base58-encoded v4 UUID.
#[derive(Debug, Clone, Default)]
pub struct RandomGenerator {
    prefix: String,
}

impl RandomGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl Generator for RandomGenerator {
    fn generate(&self) -> ShortCode {
        ShortCode::generated(&self.prefix, Uuid::new_v4())
    }
}

/// A sequential generator: prefix + zero-padded counter.
///
/// Deterministic, which makes it convenient in tests. After a restart the
/// counter starts over, so the backend's collision check does the rest.
#[derive(Debug)]
pub struct SeqGenerator {
    counter: AtomicU64,
    prefix: String,
}

impl SeqGenerator {
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::with_offset(prefix, 0)
    }

    pub fn with_offset(prefix: impl Into<String>, offset: u64) -> Self {
        Self {
            counter: AtomicU64::new(offset),
            prefix: prefix.into(),
        }
    }
}

impl Clone for SeqGenerator {
    fn clone(&self) -> Self {
        Self {
            counter: AtomicU64::new(self.counter.load(Ordering::SeqCst)),
            prefix: self.prefix.clone(),
        }
    }
}

impl Generator for SeqGenerator {
    fn generate(&self) -> ShortCode {
        let count = self.counter.fetch_add(1, Ordering::SeqCst);
        ShortCode::new_unchecked(format!("{}{:06}", self.prefix, count))
    }
}
