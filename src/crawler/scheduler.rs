//! Batched static extraction with checkpoints
//!
//! This module handles:
//! - Partitioning the URL list into fixed-size batches
//! - Global concurrency limiting via a semaphore
//! - Flushing every output stream after each batch
//! - Persisting the checkpoint so a resumed run skips flushed batches

use crate::config::BatchConfig;
use crate::crawler::{DetailExtractor, ExtractError, ExtractOutcome, RetryPolicy};
use crate::output::{Checkpoint, WriterHandle};
use crate::state::ProductRecord;
use crate::SweepError;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// A contiguous slice of the URL list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Batch<'a> {
    /// 0-based position in the list of batches
    pub index: usize,
    pub urls: &'a [String],
}

/// Runs static extraction batch by batch
///
/// Within a batch, URLs are processed by a bounded pool of workers and
/// their record order is unspecified. Batches are flushed strictly in
/// order; a flushed batch is never written again.
pub struct BatchCheckpointer {
    batch_size: usize,

    /// Global semaphore limiting concurrent extractions
    workers: Arc<Semaphore>,

    pause: Duration,

    checkpoint_path: PathBuf,
}

impl BatchCheckpointer {
    /// Creates a new batch checkpointer
    ///
    /// # Arguments
    ///
    /// * `config` - The `[batch]` section of the profile
    /// * `checkpoint_path` - Where the checkpoint sidecar is saved
    pub fn new(config: &BatchConfig, checkpoint_path: impl Into<PathBuf>) -> Self {
        Self {
            batch_size: config.size.max(1),
            workers: Arc::new(Semaphore::new(config.workers.max(1))),
            pause: Duration::from_millis(config.pause_ms),
            checkpoint_path: checkpoint_path.into(),
        }
    }

    /// Partitions `urls` into batches of the configured size
    pub fn batches<'a>(&self, urls: &'a [String]) -> impl Iterator<Item = Batch<'a>> {
        urls.chunks(self.batch_size)
            .enumerate()
            .map(|(index, urls)| Batch { index, urls })
    }

    /// Extracts every batch not yet recorded in `checkpoint`
    ///
    /// After each batch the writer flushes all three streams, and the
    /// checkpoint is advanced and saved. Marks the static phase done at the
    /// end.
    ///
    /// # Returns
    ///
    /// * `Ok(usize)` - Number of batches flushed by this call
    /// * `Err(SweepError)` - Output or checkpoint persistence failed
    pub async fn run_static(
        &self,
        urls: &[String],
        extractor: Arc<DetailExtractor>,
        policy: &RetryPolicy,
        writer: &WriterHandle,
        checkpoint: &mut Checkpoint,
    ) -> crate::Result<usize> {
        let total = urls.len().div_ceil(self.batch_size);
        let mut flushed = 0;

        if checkpoint.batches_flushed > 0 {
            tracing::info!(
                "Skipping {} of {} batches already flushed",
                checkpoint.batches_flushed.min(total),
                total
            );
        }

        for batch in self.batches(urls).skip(checkpoint.batches_flushed) {
            tracing::info!(
                "Batch {}/{}: extracting {} URLs",
                batch.index + 1,
                total,
                batch.urls.len()
            );

            self.run_batch(batch, &extractor, policy, writer).await?;

            checkpoint.sizes = writer.flush().await?;
            checkpoint.batches_flushed = batch.index + 1;
            checkpoint.save(&self.checkpoint_path)?;
            flushed += 1;

            tracing::info!("Batch {}/{} flushed", batch.index + 1, total);

            if !self.pause.is_zero() && batch.index + 1 < total {
                tokio::time::sleep(self.pause).await;
            }
        }

        checkpoint.static_done = true;
        checkpoint.save(&self.checkpoint_path)?;
        Ok(flushed)
    }

    async fn run_batch(
        &self,
        batch: Batch<'_>,
        extractor: &Arc<DetailExtractor>,
        policy: &RetryPolicy,
        writer: &WriterHandle,
    ) -> crate::Result<()> {
        let mut tasks = JoinSet::new();

        for url in batch.urls {
            let workers = self.workers.clone();
            let extractor = extractor.clone();
            let policy = policy.clone();
            let sender = writer.sender();
            let url = url.clone();

            tasks.spawn(async move {
                let _permit = workers
                    .acquire_owned()
                    .await
                    .map_err(|_| SweepError::Writer("worker pool closed".to_string()))?;
                let outcome = extractor.extract_with(&url, &policy).await;
                sender.send(outcome).await?;
                Ok::<_, SweepError>(url)
            });
        }

        // Every URL of the batch must reach the writer before it is flushed
        let sender = writer.sender();
        for (url, message) in drain_workers(&mut tasks, batch.urls).await? {
            tracing::error!("Extraction worker for {} failed: {}", url, message);
            sender.send(aborted_outcome(url, message)).await?;
        }

        Ok(())
    }
}

/// Waits for every worker and returns the URLs whose task never finished
///
/// A task that panicked or was cancelled sent nothing, so its URL comes back
/// with the join error. Writer failures are returned as errors.
async fn drain_workers(
    tasks: &mut JoinSet<crate::Result<String>>,
    urls: &[String],
) -> crate::Result<Vec<(String, String)>> {
    let mut unfinished: Vec<String> = urls.to_vec();
    let mut failures = Vec::new();

    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(Ok(url)) => {
                if let Some(pos) = unfinished.iter().position(|u| *u == url) {
                    unfinished.swap_remove(pos);
                }
            }
            Ok(Err(e)) => return Err(e),
            Err(e) => failures.push(e.to_string()),
        }
    }

    // Join errors carry no URL; the leftovers are exactly the lost tasks
    let message = failures
        .first()
        .cloned()
        .unwrap_or_else(|| "worker lost".to_string());
    Ok(unfinished
        .into_iter()
        .map(|url| (url, message.clone()))
        .collect())
}

fn aborted_outcome(url: String, message: String) -> ExtractOutcome {
    ExtractOutcome::Failed {
        placeholder: ProductRecord::placeholder(url.as_str()),
        error: ExtractError::WorkerAborted {
            url: url.clone(),
            message,
        },
        url,
    }
}
