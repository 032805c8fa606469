use std::collections::BTreeMap;

use crate::models::JobMatch;
use crate::retry::RetryPolicy;
use crate::traits::JobStore;

/// Result of writing one target's matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistOutcome {
    /// Job + match pairs written.
    pub committed: usize,
    /// Written matches per user id.
    pub committed_by_user: BTreeMap<String, u64>,
    /// Batches given up on after every retry.
    pub failed_batches: usize,
    /// Pairs lost with those batches.
    pub dropped: usize,
}

/// Commit `writes` in chunks of `batch_size`, one store transaction per
/// chunk. A chunk is retried as a whole; if it still fails it is counted
/// and the remaining chunks are attempted anyway.
pub async fn commit_in_batches<S: JobStore>(
    store: &S,
    writes: &[JobMatch],
    batch_size: usize,
    retry: &RetryPolicy,
) -> PersistOutcome {
    let mut outcome = PersistOutcome::default();

    for (index, batch) in writes.chunks(batch_size.max(1)).enumerate() {
        let label = format!("batch {} ({} records)", index + 1, batch.len());
        match retry.run(&label, |_| store.commit_batch(batch)).await {
            Ok(()) => {
                outcome.committed += batch.len();
                for write in batch {
                    *outcome
                        .committed_by_user
                        .entry(write.matched.user_id.clone())
                        .or_default() += 1;
                }
                tracing::debug!(batch = index + 1, records = batch.len(), "Batch committed");
            }
            Err(e) => {
                outcome.failed_batches += 1;
                outcome.dropped += batch.len();
                tracing::error!(
                    batch = index + 1,
                    records = batch.len(),
                    error = %e,
                    "Batch commit failed after retries"
                );
            }
        }
    }

    outcome
}
