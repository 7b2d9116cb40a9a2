//! Batch execution with a consecutive-failure abort.

use std::future::Future;

use tracing::{error, warn};

/// Result of running one chunk through [`BatchProcessor::process`].
#[derive(Debug)]
pub struct BatchOutcome<T, R, E> {
    /// 1-based position of this chunk in the run.
    pub batch_num: usize,
    /// The records handed to the chunk function.
    pub input: Vec<T>,
    /// Per-record results when the chunk succeeded; empty otherwise.
    pub output: Vec<R>,
    /// Whether the chunk function returned `Ok`.
    pub succeeded: bool,
    /// The chunk error when it did not.
    pub error: Option<E>,
}

/// Everything a finished (or aborted) run produced.
#[derive(Debug)]
pub struct BatchReport<T, R, E> {
    /// One outcome per attempted chunk, in input order.
    pub outcomes: Vec<BatchOutcome<T, R, E>>,
    /// `true` when the consecutive-failure limit stopped the run early.
    pub aborted: bool,
}

impl<T, R, E> BatchReport<T, R, E> {
    /// The error from the most recent failed chunk, if any.
    #[must_use]
    pub fn last_error(&self) -> Option<&E> {
        self.outcomes.iter().rev().find_map(|outcome| outcome.error.as_ref())
    }
}

/// Splits work into fixed-size chunks and stops early when too many
/// chunks fail in a row.
pub struct BatchProcessor {
    batch_size: usize,
    max_consecutive_failures: u32,
}

impl BatchProcessor {
    /// Creates a processor with the given chunk size and abort threshold.
    ///
    /// # Panics
    ///
    /// Panics if `batch_size` or `max_consecutive_failures` is zero.
    #[must_use]
    pub fn new(batch_size: usize, max_consecutive_failures: u32) -> Self {
        assert!(batch_size > 0, "batch_size must be at least 1");
        assert!(max_consecutive_failures > 0, "max_consecutive_failures must be at least 1");
        Self { batch_size, max_consecutive_failures }
    }

    /// The configured chunk size.
    #[must_use]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// The configured abort threshold.
    #[must_use]
    pub fn max_consecutive_failures(&self) -> u32 {
        self.max_consecutive_failures
    }

    /// Runs `chunk_fn` over consecutive chunks of at most `batch_size`
    /// records, in order. The last chunk may be shorter; empty input
    /// produces an empty report.
    ///
    /// A failed chunk contributes an outcome with its error. Any success
    /// resets the failure streak; `max_consecutive_failures` failures in
    /// a row abort the run with the remaining chunks unattempted.
    pub async fn process<T, R, E, F, Fut>(&self, items: &[T], mut chunk_fn: F) -> BatchReport<T, R, E>
    where
        T: Clone,
        F: FnMut(usize, Vec<T>) -> Fut,
        Fut: Future<Output = Result<Vec<R>, E>>,
    {
        let total_batches = items.len().div_ceil(self.batch_size);
        let mut outcomes = Vec::with_capacity(total_batches);
        let mut consecutive_failures = 0u32;

        for (index, chunk) in items.chunks(self.batch_size).enumerate() {
            let batch_num = index + 1;
            match chunk_fn(batch_num, chunk.to_vec()).await {
                Ok(output) => {
                    consecutive_failures = 0;
                    outcomes.push(BatchOutcome {
                        batch_num,
                        input: chunk.to_vec(),
                        output,
                        succeeded: true,
                        error: None,
                    });
                }
                Err(err) => {
                    consecutive_failures += 1;
                    warn!(batch_num, total_batches, consecutive_failures, "batch failed");
                    outcomes.push(BatchOutcome {
                        batch_num,
                        input: chunk.to_vec(),
                        output: Vec::new(),
                        succeeded: false,
                        error: Some(err),
                    });
                    if consecutive_failures >= self.max_consecutive_failures {
                        error!(consecutive_failures, "aborting run after repeated batch failures");
                        return BatchReport { outcomes, aborted: true };
                    }
                }
            }
        }

        BatchReport { outcomes, aborted: false }
    }
}

#[cfg(test)]
mod tests {
    use super::BatchProcessor;

    fn items(n: u32) -> Vec<u32> {
        (0..n).collect()
    }

    #[tokio::test]
    async fn chunks_cover_the_input_in_order() {
        let processor = BatchProcessor::new(3, 3);
        let input = items(10);

        let report = processor
            .process(&input, |_, chunk| async move { Ok::<_, String>(chunk) })
            .await;

        assert!(!report.aborted);
        assert_eq!(report.outcomes.len(), 4);
        assert_eq!(report.outcomes[0].input.len(), 3);
        assert_eq!(report.outcomes[3].input.len(), 1);
        assert_eq!(
            report.outcomes.iter().map(|o| o.batch_num).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );

        let flattened: Vec<u32> =
            report.outcomes.iter().flat_map(|o| o.output.iter().copied()).collect();
        assert_eq!(flattened, input);
    }

    #[tokio::test]
    async fn empty_input_produces_an_empty_report() {
        let processor = BatchProcessor::new(5, 3);
        let input: Vec<u32> = Vec::new();

        let report = processor
            .process(&input, |_, _| async move { Ok::<Vec<u32>, String>(Vec::new()) })
            .await;

        assert!(!report.aborted);
        assert!(report.outcomes.is_empty());
    }

    #[tokio::test]
    async fn aborts_after_consecutive_failures() {
        let processor = BatchProcessor::new(1, 3);
        let input = items(10);

        let report = processor
            .process(&input, |batch_num, _| async move {
                Err::<Vec<u32>, String>(format!("batch {batch_num} failed"))
            })
            .await;

        assert!(report.aborted);
        assert_eq!(report.outcomes.len(), 3);
        assert_eq!(report.last_error().map(String::as_str), Some("batch 3 failed"));
    }

    #[tokio::test]
    async fn a_success_resets_the_failure_streak() {
        let processor = BatchProcessor::new(1, 3);
        let input = items(9);

        // Two failures, a success, repeated; never three in a row.
        let report = processor
            .process(&input, |batch_num, chunk| async move {
                if batch_num % 3 == 0 {
                    Ok::<_, String>(chunk)
                } else {
                    Err(format!("batch {batch_num} failed"))
                }
            })
            .await;

        assert!(!report.aborted);
        assert_eq!(report.outcomes.len(), 9);
        assert_eq!(report.outcomes.iter().filter(|o| o.succeeded).count(), 3);
    }

    #[tokio::test]
    async fn failed_chunks_keep_their_input() {
        let processor = BatchProcessor::new(4, 5);
        let input = items(8);

        let report = processor
            .process(&input, |batch_num, chunk| async move {
                if batch_num == 1 {
                    Err::<Vec<u32>, String>("first batch failed".to_string())
                } else {
                    Ok(chunk)
                }
            })
            .await;

        assert!(!report.aborted);
        assert!(!report.outcomes[0].succeeded);
        assert_eq!(report.outcomes[0].input, vec![0, 1, 2, 3]);
        assert!(report.outcomes[0].output.is_empty());
        assert!(report.outcomes[1].succeeded);
    }
}
