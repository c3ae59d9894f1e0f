//! Run orchestration
//!
//! Sequences one benchmark run:
//!
//! ```text
//! submit ──▶ await_completion ──▶ resolve workers ──▶ collect results ──▶ teardown
//!   │              │                    │                   │
//!   ├─ rejected:   └──── failure: stack teardown, error ────┘
//!   │  nothing to clean up                                   collection failure:
//!   └─ other error: stack teardown, error                    full teardown, then error
//! ```
//!
//! Worker entries are only deleted once collection has returned, so a result
//! is never deleted before it was read.

use crate::cleanup::{
    CleanupCoordinator, CleanupReport, DEFAULT_CLEANUP_ATTEMPTS, DEFAULT_CLEANUP_INTERVAL,
};
use crate::collector::{
    CollectedResult, DEFAULT_RESULT_POLL_ATTEMPTS, DEFAULT_RESULT_POLL_INTERVAL, FanInPolicy,
    PartialCollection, ResultCollector, WorkerFailure,
};
use crate::discovery::{DEFAULT_GROUP_OUTPUT_KEY, WorkerDiscovery};
use crate::error::{CloudError, Result};
use crate::model::{ProvisioningRequest, ProvisioningState, RunResult, StackDescriptor, WorkerId};
use crate::provider::{CloudCapabilities, GroupMembership};
use crate::retry::{RetryConfig, RetryPolicy};
use crate::stack::{DEFAULT_STACK_POLL_ATTEMPTS, DEFAULT_STACK_POLL_INTERVAL, StackLifecycleController};
use std::sync::Arc;

/// Timing and policy knobs of a run
#[derive(Debug, Clone)]
pub struct LifecycleSettings {
    /// Polling of the stack status
    pub stack_poll: RetryConfig,
    /// Polling of each worker's result entry
    pub result_poll: RetryConfig,
    /// Deletion of entries and of the stack
    pub cleanup: RetryConfig,
    /// Stack output naming the worker group
    pub group_output_key: String,
    pub fan_in: FanInPolicy,
}

impl Default for LifecycleSettings {
    fn default() -> Self {
        Self {
            stack_poll: RetryConfig::bounded(
                "Waiting for stack completion failed",
                DEFAULT_STACK_POLL_INTERVAL,
                DEFAULT_STACK_POLL_ATTEMPTS,
            ),
            result_poll: RetryConfig::bounded(
                "Fetching worker result failed",
                DEFAULT_RESULT_POLL_INTERVAL,
                DEFAULT_RESULT_POLL_ATTEMPTS,
            ),
            cleanup: RetryConfig::bounded(
                "Deletion failed",
                DEFAULT_CLEANUP_INTERVAL,
                DEFAULT_CLEANUP_ATTEMPTS,
            ),
            group_output_key: DEFAULT_GROUP_OUTPUT_KEY.to_string(),
            fan_in: FanInPolicy::default(),
        }
    }
}

/// Progress callbacks, all optional
pub trait RunObserver: Send + Sync {
    fn stack_submitted(&self, _name: &str) {}
    fn stack_settled(&self, _descriptor: &StackDescriptor) {}
    fn workers_resolved(&self, _workers: &[WorkerId]) {}
    fn results_collected(&self, _collected: usize, _failed: usize) {}
    fn cleanup_finished(&self, _report: &CleanupReport) {}
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentObserver;

impl RunObserver for SilentObserver {}

/// Everything a successful run produced
#[derive(Debug)]
pub struct RunOutcome {
    pub stack_name: String,
    /// Workers in resolution order
    pub workers: Vec<WorkerId>,
    /// Collected results, in worker order
    pub results: Vec<CollectedResult>,
    /// Workers that never reported (partial-success runs only)
    pub failures: Vec<WorkerFailure>,
    pub cleanup: CleanupReport,
}

impl RunOutcome {
    pub fn run_result(&self) -> RunResult {
        RunResult::new(self.results.iter().map(|c| c.result).collect())
    }

    /// Whether every resolved worker produced a result
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

pub struct Orchestrator {
    membership: Arc<dyn GroupMembership>,
    stack: Arc<StackLifecycleController>,
    collector: ResultCollector,
    cleanup: CleanupCoordinator,
    settings: LifecycleSettings,
    observer: Arc<dyn RunObserver>,
}

impl Orchestrator {
    pub fn new(capabilities: CloudCapabilities, settings: LifecycleSettings) -> Self {
        let retry = RetryPolicy::new(capabilities.sleeper.clone());
        let stack = Arc::new(StackLifecycleController::new(
            capabilities.provisioning.clone(),
            retry.clone(),
            settings.stack_poll.clone(),
            settings.cleanup.clone(),
        ));
        let collector = ResultCollector::new(
            capabilities.store.clone(),
            retry.clone(),
            settings.result_poll.clone(),
        );
        let cleanup = CleanupCoordinator::new(
            capabilities.store.clone(),
            stack.clone(),
            retry,
            settings.cleanup.clone(),
        );

        Self {
            membership: capabilities.membership,
            stack,
            collector,
            cleanup,
            settings,
            observer: Arc::new(SilentObserver),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = observer;
        self
    }

    fn discovery(&self, expected_workers: Option<usize>) -> WorkerDiscovery {
        let discovery = WorkerDiscovery::new(self.membership.clone())
            .with_output_key(self.settings.group_output_key.clone());
        match expected_workers {
            Some(count) => discovery.with_expected_workers(count),
            None => discovery,
        }
    }

    /// Run one request end to end
    ///
    /// Fatal errors are returned after the stack teardown has been attempted.
    /// Cleanup failures never fail the run; they are listed in
    /// [`RunOutcome::cleanup`].
    pub async fn run(
        &self,
        request: &ProvisioningRequest,
        expected_workers: Option<usize>,
    ) -> Result<RunOutcome> {
        let name = request.name.as_str();

        if let Err(err) = self.stack.submit(request).await {
            if !matches!(err, CloudError::ProvisioningRejected { .. }) {
                // the service may have accepted the request before the call failed
                let report = self.cleanup.teardown(&[], name).await;
                self.observer.cleanup_finished(&report);
            }
            return Err(err);
        }
        self.observer.stack_submitted(name);

        let workers = match self.provision(name, expected_workers).await {
            Ok(workers) => workers,
            Err(err) => {
                tracing::error!(stack = %name, "Run aborted before collection: {}", err);
                let listed: &[WorkerId] = match &err {
                    CloudError::WorkerCountMismatch { workers, .. } => workers,
                    _ => &[],
                };
                let report = self.cleanup.teardown(listed, name).await;
                self.observer.cleanup_finished(&report);
                return Err(err);
            }
        };

        let collection = self.collect(&workers).await;

        let cleanup = self.cleanup.teardown(&workers, name).await;
        self.observer.cleanup_finished(&cleanup);

        let collection = collection?;
        Ok(RunOutcome {
            stack_name: name.to_string(),
            workers,
            results: collection.collected,
            failures: collection.failures,
            cleanup,
        })
    }

    async fn provision(&self, name: &str, expected_workers: Option<usize>) -> Result<Vec<WorkerId>> {
        let descriptor = self.stack.await_completion(name).await?;
        self.observer.stack_settled(&descriptor);
        if descriptor.has_failed() {
            tracing::warn!(
                stack = %name,
                status = %descriptor.status,
                reason = descriptor.status_reason.as_deref().unwrap_or("-"),
                "Stack failed to provision"
            );
        }

        let workers = self.discovery(expected_workers).resolve(&descriptor).await?;
        self.observer.workers_resolved(&workers);
        Ok(workers)
    }

    async fn collect(&self, workers: &[WorkerId]) -> Result<PartialCollection> {
        let collection = match self.settings.fan_in {
            FanInPolicy::AllOrNothing => {
                let results = self.collector.collect_all(workers).await?;
                PartialCollection {
                    collected: workers
                        .iter()
                        .cloned()
                        .zip(results.into_inner())
                        .map(|(worker_id, result)| CollectedResult { worker_id, result })
                        .collect(),
                    failures: Vec::new(),
                }
            }
            FanInPolicy::PartialSuccess => self.collector.collect_partial(workers).await,
        };
        self.observer
            .results_collected(collection.collected.len(), collection.failures.len());
        Ok(collection)
    }

    /// Delete whatever a previous run left behind
    ///
    /// Without explicit worker ids, the workers of a still COMPLETE stack are
    /// resolved first so their entries can be deleted too.
    pub async fn reconcile(&self, stack_name: &str, workers: Vec<WorkerId>) -> Result<CleanupReport> {
        let workers = if workers.is_empty() {
            let descriptor = self.stack.describe(stack_name).await?;
            if descriptor.state() == ProvisioningState::Complete {
                self.discovery(None).resolve(&descriptor).await?
            } else {
                tracing::info!(
                    stack = %stack_name,
                    status = %descriptor.status,
                    "Stack is not complete, skipping worker resolution"
                );
                Vec::new()
            }
        } else {
            workers
        };

        let report = self.cleanup.teardown(&workers, stack_name).await;
        self.observer.cleanup_finished(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WorkerResult;
    use crate::testing::InMemoryCloud;
    use std::sync::Mutex;

    fn cloud_with_workers(workers: &[&str]) -> InMemoryCloud {
        let cloud = InMemoryCloud::new();
        cloud.provisioning.set_output("ChildASGName", "asg-1");
        cloud.groups.set_members("asg-1", workers);
        cloud
    }

    fn settings(fan_in: FanInPolicy) -> LifecycleSettings {
        let mut settings = LifecycleSettings::default();
        settings.result_poll = RetryConfig::bounded("fetch", DEFAULT_RESULT_POLL_INTERVAL, 4);
        settings.fan_in = fan_in;
        settings
    }

    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl EventLog {
        fn push(&self, event: String) {
            self.0.lock().unwrap().push(event);
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().unwrap().clone()
        }
    }

    impl RunObserver for EventLog {
        fn stack_submitted(&self, name: &str) {
            self.push(format!("submitted {}", name));
        }
        fn stack_settled(&self, descriptor: &StackDescriptor) {
            self.push(format!("settled {}", descriptor.status));
        }
        fn workers_resolved(&self, workers: &[WorkerId]) {
            self.push(format!("resolved {}", workers.len()));
        }
        fn results_collected(&self, collected: usize, failed: usize) {
            self.push(format!("collected {}/{}", collected, failed));
        }
        fn cleanup_finished(&self, report: &CleanupReport) {
            self.push(format!("cleaned {}", report.deleted.len()));
        }
    }

    #[tokio::test]
    async fn test_run_reports_progress_in_order() {
        let cloud = cloud_with_workers(&["i-1", "i-2"]);
        cloud.store.put("i-1", "5,10,15");
        cloud.store.put("i-2", "7,14,21");
        let log = Arc::new(EventLog::default());
        let orchestrator = Orchestrator::new(cloud.capabilities(), settings(FanInPolicy::AllOrNothing))
            .with_observer(log.clone());

        let outcome = orchestrator
            .run(&ProvisioningRequest::new("Run-1", "body"), Some(2))
            .await
            .unwrap();

        assert!(outcome.is_complete());
        assert_eq!(outcome.results[1].worker_id, WorkerId::new("i-2"));
        assert_eq!(
            log.events(),
            vec![
                "submitted Run-1",
                "settled CREATE_COMPLETE",
                "resolved 2",
                "collected 2/0",
                "cleaned 3",
            ]
        );
    }

    #[tokio::test]
    async fn test_rejected_submission_cleans_nothing() {
        let cloud = cloud_with_workers(&["i-1"]);
        cloud.provisioning.reject_with("Template format error");
        let orchestrator = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default());

        let err = orchestrator
            .run(&ProvisioningRequest::new("Run-1", "body"), None)
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::ProvisioningRejected { .. }));
        assert!(cloud.provisioning.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_unanswered_submission_is_torn_down() {
        let cloud = cloud_with_workers(&["i-1"]);
        cloud
            .provisioning
            .fail_creates_after_accepting("dispatch failure: timed out");
        let log = Arc::new(EventLog::default());
        let orchestrator = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default())
            .with_observer(log.clone());

        let err = orchestrator
            .run(&ProvisioningRequest::new("Run-1", "body"), Some(1))
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::ApiError(_)));
        assert_eq!(cloud.provisioning.delete_calls(), vec!["Run-1".to_string()]);
        assert!(!cloud.provisioning.exists("Run-1"));
        assert_eq!(log.events(), vec!["cleaned 1"]);
    }

    #[tokio::test]
    async fn test_count_mismatch_deletes_entries_of_listed_workers() {
        let cloud = cloud_with_workers(&["i-1", "i-2"]);
        cloud.store.put("i-1", "1,2,3");
        cloud.store.put("i-2", "4,5,6");
        let orchestrator = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default());

        let err = orchestrator
            .run(&ProvisioningRequest::new("Run-1", "body"), Some(3))
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::WorkerCountMismatch { expected: 3, ref workers } if workers.len() == 2));
        assert!(!cloud.store.contains("i-1"));
        assert!(!cloud.store.contains("i-2"));
        assert!(!cloud.provisioning.exists("Run-1"));
    }

    #[tokio::test]
    async fn test_failed_stack_is_fatal_and_torn_down() {
        let cloud = cloud_with_workers(&["i-1"]);
        cloud
            .provisioning
            .script_statuses("Run-1", &["CREATE_IN_PROGRESS", "CREATE_FAILED"]);
        let orchestrator = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default());

        let err = orchestrator
            .run(&ProvisioningRequest::new("Run-1", "body"), Some(1))
            .await
            .unwrap_err();

        assert!(matches!(err, CloudError::StackNotComplete { ref status, .. } if status == "CREATE_FAILED"));
        assert_eq!(cloud.provisioning.delete_calls(), vec!["Run-1".to_string()]);
        assert!(!cloud.provisioning.exists("Run-1"));
    }

    #[tokio::test]
    async fn test_partial_policy_keeps_successful_workers() {
        let cloud = cloud_with_workers(&["id1", "id2", "id3"]);
        cloud.store.put("id1", "1,2,3");
        cloud.store.put("id3", "7,8,9");
        let orchestrator =
            Orchestrator::new(cloud.capabilities(), settings(FanInPolicy::PartialSuccess));

        let outcome = orchestrator
            .run(&ProvisioningRequest::new("Run-1", "body"), Some(3))
            .await
            .unwrap();

        assert!(!outcome.is_complete());
        assert_eq!(
            outcome.run_result(),
            RunResult::new(vec![WorkerResult::new(1, 2, 3), WorkerResult::new(7, 8, 9)])
        );
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].worker_id, WorkerId::new("id2"));
        assert!(!cloud.provisioning.exists("Run-1"));
    }

    #[tokio::test]
    async fn test_reconcile_resolves_workers_of_a_live_stack() {
        let cloud = cloud_with_workers(&["i-1", "i-2"]);
        cloud.store.put("i-1", "1,2,3");
        cloud.store.put("i-2", "4,5,6");
        let orchestrator = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default());
        orchestrator
            .stack
            .submit(&ProvisioningRequest::new("Run-1", "body"))
            .await
            .unwrap();

        let report = orchestrator.reconcile("Run-1", Vec::new()).await.unwrap();

        assert!(report.is_clean());
        assert_eq!(report.deleted.len(), 3);
        assert!(!cloud.store.contains("i-1"));
        assert!(!cloud.store.contains("i-2"));
        assert!(!cloud.provisioning.exists("Run-1"));
    }

    #[tokio::test]
    async fn test_reconcile_of_a_vanished_stack_uses_given_workers() {
        let cloud = cloud_with_workers(&[]);
        cloud.store.put("i-9", "1,2,3");
        let orchestrator = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default());

        let report = orchestrator
            .reconcile("Run-0", vec![WorkerId::new("i-9")])
            .await
            .unwrap();

        assert!(report.is_clean());
        assert!(!cloud.store.contains("i-9"));
        assert_eq!(cloud.provisioning.delete_calls(), vec!["Run-0".to_string()]);
    }
}
