//! Fan-out deletion of many codes.
//!
//! Codes are split into fixed-size batches. A feeder task pushes batches onto
//! a bounded channel, a pool of workers applies each batch with
//! [`LinkStorage::delete_links`], and failed batches are reported back on an
//! error channel. Batches that succeeded are never rolled back.

use linkstore_core::{BatchFailure, Context, LinkStorage, OwnerId, Result, ShortCode, StorageError};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, trace, warn};
use typed_builder::TypedBuilder;

pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const DEFAULT_WORKERS: usize = 4;

/// Tuning knobs for [`DeletionPipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, TypedBuilder)]
pub struct PipelineSettings {
    /// Maximum number of codes handed to one `delete_links` call.
    #[builder(default = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,
    /// Number of batches applied concurrently.
    #[builder(default = DEFAULT_WORKERS)]
    pub workers: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Splits `codes` into contiguous batches of at most `batch_size` codes.
///
/// A zero batch size is treated as one.
pub fn partition(codes: &[ShortCode], batch_size: usize) -> Vec<Vec<ShortCode>> {
    codes
        .chunks(batch_size.max(1))
        .map(<[ShortCode]>::to_vec)
        .collect()
}

type Batch = (usize, Vec<ShortCode>);

#[derive(Clone)]
pub struct DeletionPipeline {
    storage: Arc<dyn LinkStorage>,
    settings: PipelineSettings,
}

impl std::fmt::Debug for DeletionPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionPipeline")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DeletionPipeline {
    pub fn new(storage: Arc<dyn LinkStorage>, settings: PipelineSettings) -> Self {
        Self { storage, settings }
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    /// Soft-deletes `codes` owned by `owner`, batch by batch.
    ///
    /// Every failed batch is reported in
    /// [`StorageError::PartialBatchFailure`], ordered by batch index. When the
    /// context finishes before every batch was dispatched and no batch failed
    /// on its own, the context error is returned instead.
    pub async fn run(&self, ctx: &Context, codes: &[ShortCode], owner: OwnerId) -> Result<()> {
        ctx.check()?;
        if codes.is_empty() {
            return Ok(());
        }

        let batches = partition(codes, self.settings.batch_size);
        let total = batches.len();
        let workers = self.settings.workers.clamp(1, total);
        trace!(
            owner = %owner,
            codes = codes.len(),
            batches = total,
            workers,
            "starting delete pipeline"
        );

        let (batch_tx, batch_rx) = mpsc::channel::<Batch>(workers);
        let batch_rx = Arc::new(Mutex::new(batch_rx));
        // one slot per batch, so reporting a failure never waits
        let (err_tx, mut err_rx) = mpsc::channel::<BatchFailure>(total);

        let feeder = tokio::spawn(feed(ctx.clone(), batches, batch_tx));

        let mut pool = JoinSet::new();
        for _ in 0..workers {
            pool.spawn(work(
                ctx.clone(),
                Arc::clone(&self.storage),
                Arc::clone(&batch_rx),
                err_tx.clone(),
                owner,
            ));
        }
        drop(err_tx);
        // the workers hold the only receivers, so the feeder stops once they are gone
        drop(batch_rx);

        let mut stopped = None;
        while let Some(joined) = pool.join_next().await {
            if let Err(err) = joined {
                stopped.get_or_insert(err);
            }
        }
        if let Some(err) = stopped {
            feeder.abort();
            warn!(owner = %owner, error = %err, "delete worker stopped unexpectedly");
            return Err(worker_failed(err));
        }
        let dispatched = feeder.await.map_err(worker_failed)?;

        let mut failures = Vec::new();
        while let Some(failure) = err_rx.recv().await {
            failures.push(failure);
        }
        failures.sort_by_key(|failure| failure.batch_index);

        if failures.iter().any(|failure| !failure.source.is_cancellation()) {
            warn!(
                owner = %owner,
                failed = failures.len(),
                batches = total,
                "delete pipeline finished with failed batches"
            );
            return Err(StorageError::PartialBatchFailure(failures));
        }
        if let Some(failure) = failures.into_iter().next() {
            return Err(failure.source);
        }
        if dispatched < total {
            debug!(dispatched, batches = total, "delete pipeline stopped early");
            return Err(ctx.check().err().unwrap_or(StorageError::Cancelled));
        }

        debug!(owner = %owner, batches = total, "delete pipeline finished");
        Ok(())
    }
}

/// Pushes batches until they run out or the context is done. Returns how many were sent.
async fn feed(ctx: Context, batches: Vec<Vec<ShortCode>>, tx: mpsc::Sender<Batch>) -> usize {
    let mut dispatched = 0;
    for batch in batches.into_iter().enumerate() {
        tokio::select! {
            biased;
            _ = ctx.done() => break,
            sent = tx.send(batch) => {
                if sent.is_err() {
                    break;
                }
                dispatched += 1;
            }
        }
    }
    dispatched
}

async fn work(
    ctx: Context,
    storage: Arc<dyn LinkStorage>,
    rx: Arc<Mutex<mpsc::Receiver<Batch>>>,
    errors: mpsc::Sender<BatchFailure>,
    owner: OwnerId,
) {
    loop {
        let next = rx.lock().await.recv().await;
        let Some((batch_index, codes)) = next else {
            break;
        };

        if let Err(source) = storage.delete_links(&ctx, &codes, owner).await {
            warn!(batch = batch_index, error = %source, "delete batch failed");
            let _ = errors
                .send(BatchFailure {
                    batch_index,
                    codes,
                    source,
                })
                .await;
        }
    }
}

fn worker_failed(err: JoinError) -> StorageError {
    StorageError::Unavailable(format!("delete worker stopped: {err}"))
}
