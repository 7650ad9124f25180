use crate::error::{Result, StorageError};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

/// Cancellation and deadline carried through every storage operation.
///
/// A `Context` is cheap to clone. Contexts derived with [`Context::with_timeout`]
/// share the cancellation signal of their parent and keep the earlier of the
/// two deadlines.
///
/// ```
/// use linkstore_core::Context;
/// use std::time::Duration;
///
/// let ctx = Context::background().with_timeout(Duration::from_secs(3));
/// assert!(ctx.check().is_ok());
/// ctx.cancel();
/// assert!(ctx.check().is_err());
/// ```
#[derive(Debug, Clone)]
pub struct Context {
    cancelled: Arc<watch::Sender<bool>>,
    deadline: Option<Instant>,
}

impl Context {
    /// A context that is never done until [`Context::cancel`] is called.
    pub fn background() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            cancelled: Arc::new(tx),
            deadline: None,
        }
    }

    /// Derives a context that expires `timeout` from now.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Derives a context that expires at `deadline`, or at the parent deadline if earlier.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            cancelled: Arc::clone(&self.cancelled),
            deadline: Some(deadline),
        }
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Signals cancellation to this context and every context sharing its signal.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancelled.borrow()
    }

    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    /// Returns the error an operation must report if it starts now.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(StorageError::Cancelled);
        }
        if self.deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            return Err(StorageError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Resolves once the context is cancelled or its deadline passes.
    pub async fn done(&self) -> StorageError {
        let mut rx = self.cancelled.subscribe();
        let cancelled = async move {
            // the sender lives as long as `self`, so `wait_for` cannot fail here
            let _ = rx.wait_for(|cancelled| *cancelled).await;
        };

        match self.deadline {
            Some(deadline) => tokio::select! {
                _ = cancelled => StorageError::Cancelled,
                _ = tokio::time::sleep_until(deadline) => StorageError::DeadlineExceeded,
            },
            None => {
                cancelled.await;
                StorageError::Cancelled
            }
        }
    }

    /// Runs `fut` unless the context finishes first.
    ///
    /// The context is checked before `fut` is polled, so an already-done
    /// context never starts the work.
    pub async fn run<T, F>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        self.check()?;
        tokio::select! {
            biased;
            err = self.done() => Err(err),
            res = fut => res,
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}
