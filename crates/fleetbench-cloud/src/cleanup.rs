//! Cleanup coordination
//!
//! Once results are in hand, every worker's store entry and the stack itself
//! are deleted concurrently. Cleanup is advisory: failures are collected into
//! a [`CleanupReport`] and logged, never raised.

use crate::error::CloudError;
use crate::model::WorkerId;
use crate::provider::KeyValueStore;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::stack::StackLifecycleController;
use futures_util::future::join_all;
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Default wait between deletion attempts
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(2);

/// Default number of deletion attempts per resource
pub const DEFAULT_CLEANUP_ATTEMPTS: u32 = 5;

/// A resource owned by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum CleanupResource {
    /// A worker's result entry in the key-value store
    Parameter(WorkerId),
    /// The provisioning request
    Stack(String),
}

impl fmt::Display for CleanupResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CleanupResource::Parameter(id) => write!(f, "parameter {}", id),
            CleanupResource::Stack(name) => write!(f, "stack {}", name),
        }
    }
}

/// A resource that could not be deleted (non-fatal)
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[error("Cleanup of {resource} failed: {reason}")]
pub struct CleanupFailure {
    pub resource: CleanupResource,
    pub reason: String,
}

impl CleanupFailure {
    pub fn new(resource: CleanupResource, err: &CloudError) -> Self {
        Self {
            resource,
            reason: err.to_string(),
        }
    }
}

/// What a teardown managed to delete
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub deleted: Vec<CleanupResource>,
    pub failures: Vec<CleanupFailure>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn record(&mut self, resource: CleanupResource, outcome: Result<(), CleanupFailure>) {
        match outcome {
            Ok(()) => self.deleted.push(resource),
            Err(failure) => self.failures.push(failure),
        }
    }
}

pub struct CleanupCoordinator {
    store: Arc<dyn KeyValueStore>,
    stack: Arc<StackLifecycleController>,
    retry: RetryPolicy,
    deletion: RetryConfig,
}

impl CleanupCoordinator {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        stack: Arc<StackLifecycleController>,
        retry: RetryPolicy,
        deletion: RetryConfig,
    ) -> Self {
        Self {
            store,
            stack,
            retry,
            deletion,
        }
    }

    /// Delete one worker's entry, retrying transient errors
    ///
    /// An entry that is already gone counts as deleted.
    pub async fn delete_entry(&self, worker_id: &WorkerId) -> Result<(), CleanupFailure> {
        let key = worker_id.result_key();
        let resource = CleanupResource::Parameter(worker_id.clone());
        let config = self.deletion.for_subject(&resource);

        let outcome = self
            .retry
            .execute(&config, || async move {
                match self.store.delete(key).await {
                    Err(err) if err.is_not_found() => Ok(()),
                    other => other,
                }
            })
            .await;

        outcome.map_err(|err| {
            let failure = CleanupFailure::new(resource, &err);
            tracing::warn!("{}", failure);
            failure
        })
    }

    /// Delete every worker entry and the stack, concurrently
    ///
    /// Waits for every deletion to settle before returning.
    pub async fn teardown(&self, workers: &[WorkerId], stack_name: &str) -> CleanupReport {
        let entries = join_all(workers.iter().map(|id| self.delete_entry(id)));
        let (entry_outcomes, stack_outcome) =
            tokio::join!(entries, self.stack.teardown(stack_name));

        let mut report = CleanupReport::default();
        for (worker_id, outcome) in workers.iter().zip(entry_outcomes) {
            report.record(CleanupResource::Parameter(worker_id.clone()), outcome);
        }
        report.record(CleanupResource::Stack(stack_name.to_string()), stack_outcome);

        if report.is_clean() {
            tracing::info!(deleted = report.deleted.len(), "Cleanup finished");
        } else {
            tracing::warn!(
                deleted = report.deleted.len(),
                failed = report.failures.len(),
                "Cleanup finished with failures"
            );
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ProvisioningRequest;
    use crate::provider::TokioSleeper;
    use crate::testing::{InMemoryProvisioning, InMemoryParameterStore, RecordingSleeper};

    struct Fixture {
        store: Arc<InMemoryParameterStore>,
        provisioning: Arc<InMemoryProvisioning>,
        coordinator: CleanupCoordinator,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(InMemoryParameterStore::new());
        let provisioning = Arc::new(InMemoryProvisioning::new());
        let retry = RetryPolicy::new(Arc::new(RecordingSleeper::new()));
        let deletion = RetryConfig::bounded("delete", Duration::from_millis(2000), 3);

        let stack = Arc::new(StackLifecycleController::new(
            provisioning.clone(),
            retry.clone(),
            RetryConfig::bounded("poll", Duration::from_millis(5000), 3),
            deletion.clone(),
        ));
        stack
            .submit(&ProvisioningRequest::new("Run-1", "body"))
            .await
            .unwrap();

        for (key, value) in [("id1", "1,2,3"), ("id2", "4,5,6"), ("id3", "7,8,9")] {
            store.put(key, value);
        }

        Fixture {
            coordinator: CleanupCoordinator::new(store.clone(), stack, retry, deletion),
            store,
            provisioning,
        }
    }

    fn ids() -> Vec<WorkerId> {
        ["id1", "id2", "id3"].into_iter().map(WorkerId::from).collect()
    }

    #[tokio::test]
    async fn test_teardown_deletes_everything() {
        let f = fixture().await;

        let report = f.coordinator.teardown(&ids(), "Run-1").await;

        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 4);
        assert!(!f.provisioning.exists("Run-1"));
        for key in ["id1", "id2", "id3"] {
            assert!(!f.store.contains(key));
        }
    }

    #[tokio::test]
    async fn test_one_failing_entry_does_not_block_siblings() {
        let f = fixture().await;
        f.store.fail_deletes("id1");

        let report = f.coordinator.teardown(&ids(), "Run-1").await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].resource,
            CleanupResource::Parameter(WorkerId::new("id1"))
        );
        assert!(f.store.contains("id1"));
        assert!(!f.store.contains("id2"));
        assert!(!f.store.contains("id3"));
        assert!(!f.provisioning.exists("Run-1"));
        assert!(report.deleted.contains(&CleanupResource::Stack("Run-1".to_string())));
    }

    #[tokio::test]
    async fn test_stack_failure_is_reported_not_raised() {
        let f = fixture().await;
        f.provisioning.fail_deletes(100);

        let report = f.coordinator.teardown(&ids(), "Run-1").await;

        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].resource,
            CleanupResource::Stack("Run-1".to_string())
        );
        assert_eq!(report.deleted.len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deletions_run_concurrently() {
        let store = Arc::new(InMemoryParameterStore::new());
        let provisioning = Arc::new(InMemoryProvisioning::new());
        let retry = RetryPolicy::new(Arc::new(TokioSleeper));
        let deletion = RetryConfig::bounded("delete", Duration::from_secs(2), 5);
        let stack = Arc::new(StackLifecycleController::new(
            provisioning.clone(),
            retry.clone(),
            RetryConfig::bounded("poll", Duration::from_secs(5), 3),
            deletion.clone(),
        ));
        stack
            .submit(&ProvisioningRequest::new("Run-1", "body"))
            .await
            .unwrap();
        for key in ["id1", "id2", "id3"] {
            store.put(key, "1,2,3");
            store.fail_next_deletes(key, 2);
        }
        provisioning.fail_deletes(2);
        let coordinator = CleanupCoordinator::new(store.clone(), stack, retry, deletion);
        let start = tokio::time::Instant::now();

        let report = coordinator.teardown(&ids(), "Run-1").await;

        // each resource alone needs two 2s waits
        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 4);
        assert!(start.elapsed() >= Duration::from_secs(4));
        assert!(start.elapsed() < Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_missing_entry_counts_as_deleted() {
        let f = fixture().await;

        let outcome = f.coordinator.delete_entry(&WorkerId::new("never-written")).await;

        assert!(outcome.is_ok());
    }
}
