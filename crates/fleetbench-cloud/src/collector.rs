//! Result collection (fan-out / fan-in)
//!
//! Each worker's result is polled independently and concurrently; the
//! collector then joins all of them. Two fan-in policies are offered:
//!
//! - [`FanInPolicy::AllOrNothing`]: any exhausted or malformed worker fails
//!   the whole collection ([`ResultCollector::collect_all`]).
//! - [`FanInPolicy::PartialSuccess`]: successes and per-worker failures are
//!   reported side by side ([`ResultCollector::collect_partial`]).

use crate::error::{CloudError, Result};
use crate::model::{RunResult, WorkerId, WorkerResult};
use crate::provider::KeyValueStore;
use crate::retry::{RetryConfig, RetryPolicy};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default wait between reads of a worker's result
pub const DEFAULT_RESULT_POLL_INTERVAL: Duration = Duration::from_secs(3);

/// Default number of reads per worker (about three minutes at the default interval)
pub const DEFAULT_RESULT_POLL_ATTEMPTS: u32 = 60;

/// How per-worker outcomes are folded into the run outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FanInPolicy {
    /// One failed worker fails the collection
    #[default]
    AllOrNothing,
    /// Failed workers are reported next to the collected results
    PartialSuccess,
}

/// Result collected for one worker
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedResult {
    pub worker_id: WorkerId,
    #[serde(flatten)]
    pub result: WorkerResult,
}

/// A worker whose result could not be collected
#[derive(Debug)]
pub struct WorkerFailure {
    pub worker_id: WorkerId,
    pub error: CloudError,
}

/// Outcome of a partial-success collection, in worker order
#[derive(Debug, Default)]
pub struct PartialCollection {
    pub collected: Vec<CollectedResult>,
    pub failures: Vec<WorkerFailure>,
}

impl PartialCollection {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct ResultCollector {
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    poll: RetryConfig,
}

impl ResultCollector {
    pub fn new(store: Arc<dyn KeyValueStore>, retry: RetryPolicy, poll: RetryConfig) -> Self {
        Self { store, retry, poll }
    }

    /// Wait for and parse the result of a single worker
    pub async fn collect_one(&self, worker_id: &WorkerId) -> Result<WorkerResult> {
        let key = worker_id.result_key();
        let config = self.poll.for_subject(key);

        let raw = self
            .retry
            .execute(&config, || self.store.get(key))
            .await?;

        let result = WorkerResult::parse(worker_id, &raw)?;
        tracing::debug!(worker = %worker_id, ?result, "Collected worker result");
        Ok(result)
    }

    /// Collect every worker's result; any single failure fails the call
    ///
    /// Every fetch is allowed to settle before the outcome is decided, so no
    /// read is abandoned mid-flight. The first failure in worker order is
    /// returned.
    pub async fn collect_all(&self, workers: &[WorkerId]) -> Result<RunResult> {
        let outcomes = join_all(workers.iter().map(|id| self.collect_one(id))).await;

        let results = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        tracing::info!(count = results.len(), "Collected all worker results");
        Ok(RunResult::new(results))
    }

    /// Collect every worker's result, keeping per-worker failures
    pub async fn collect_partial(&self, workers: &[WorkerId]) -> PartialCollection {
        let outcomes = join_all(workers.iter().map(|id| self.collect_one(id))).await;

        let mut collection = PartialCollection::default();
        for (worker_id, outcome) in workers.iter().zip(outcomes) {
            match outcome {
                Ok(result) => collection.collected.push(CollectedResult {
                    worker_id: worker_id.clone(),
                    result,
                }),
                Err(error) => {
                    tracing::warn!(worker = %worker_id, "Result collection failed: {}", error);
                    collection.failures.push(WorkerFailure {
                        worker_id: worker_id.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            collected = collection.collected.len(),
            failed = collection.failures.len(),
            "Collected worker results"
        );
        collection
    }
}
