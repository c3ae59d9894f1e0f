//! End-to-end runs against the in-memory capabilities

use fleetbench_cloud::testing::InMemoryCloud;
use fleetbench_cloud::{
    CleanupResource, CloudError, FanInPolicy, LifecycleSettings, Orchestrator, ProvisioningRequest,
    RetryConfig, RunResult, TokioSleeper, WorkerId, WorkerResult,
};
use std::sync::Arc;
use std::time::Duration;

fn cloud(workers: &[&str]) -> InMemoryCloud {
    let cloud = InMemoryCloud::new();
    cloud.provisioning.set_output("ChildASGName", "Run-1-ChildASG");
    cloud.groups.set_members("Run-1-ChildASG", workers);
    cloud
}

fn request() -> ProvisioningRequest {
    ProvisioningRequest::new("Run-1", "Resources: {}")
        .with_parameter("NumberOfInstances", 2u32)
        .with_capability("CAPABILITY_IAM")
}

#[tokio::test]
async fn test_two_worker_run() {
    let cloud = cloud(&["i-1", "i-2"]);
    cloud.provisioning.script_statuses(
        "Run-1",
        &["CREATE_IN_PROGRESS", "CREATE_IN_PROGRESS", "CREATE_COMPLETE"],
    );
    cloud.store.put("i-1", "5,10,15");
    cloud.store.put("i-2", "7,14,21");
    cloud.store.delay("i-2", 2);

    let orchestrator = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default());
    let outcome = orchestrator.run(&request(), Some(2)).await.unwrap();

    assert_eq!(
        outcome.run_result(),
        RunResult::new(vec![WorkerResult::new(5, 10, 15), WorkerResult::new(7, 14, 21)])
    );
    assert_eq!(outcome.workers, vec![WorkerId::new("i-1"), WorkerId::new("i-2")]);
    assert!(outcome.cleanup.is_clean());

    // both entries and the stack are gone
    assert!(!cloud.store.contains("i-1"));
    assert!(!cloud.store.contains("i-2"));
    assert!(!cloud.provisioning.exists("Run-1"));
    assert_eq!(cloud.provisioning.create_calls(), 1);

    // two stack polls and two result polls were waited out at their own intervals
    let waits = cloud.sleeper.recorded();
    assert_eq!(
        waits.iter().filter(|d| **d == Duration::from_secs(5)).count(),
        2
    );
    assert_eq!(
        waits.iter().filter(|d| **d == Duration::from_secs(3)).count(),
        2
    );
}

#[tokio::test]
async fn test_request_reaches_the_provider_untouched() {
    let cloud = cloud(&["i-1", "i-2"]);
    cloud.store.put("i-1", "1,1,1");
    cloud.store.put("i-2", "2,2,2");

    Orchestrator::new(cloud.capabilities(), LifecycleSettings::default())
        .run(&request(), None)
        .await
        .unwrap();

    let created = cloud.provisioning.created();
    assert_eq!(created.len(), 1);
    assert_eq!(created[0].template_body, "Resources: {}");
    assert_eq!(created[0].parameters["NumberOfInstances"].to_string(), "2");
    assert!(created[0].capabilities.contains("CAPABILITY_IAM"));
}

#[tokio::test]
async fn test_collection_failure_still_cleans_up() {
    let cloud = cloud(&["id1", "id2", "id3"]);
    cloud.store.put("id1", "1,2,3");
    cloud.store.put("id3", "7,8,9");

    let mut settings = LifecycleSettings::default();
    settings.result_poll = RetryConfig::bounded("fetch", Duration::from_millis(10), 5);
    let orchestrator = Orchestrator::new(cloud.capabilities(), settings);

    let err = orchestrator.run(&request(), Some(3)).await.unwrap_err();

    assert!(matches!(err, CloudError::RetryExhausted { attempts: 5, .. }));
    assert!(!cloud.store.contains("id1"));
    assert!(!cloud.store.contains("id3"));
    assert!(!cloud.provisioning.exists("Run-1"));
}

#[tokio::test]
async fn test_results_survive_cleanup_failures() {
    let cloud = cloud(&["id1", "id2", "id3"]);
    for (id, value) in [("id1", "1,2,3"), ("id2", "4,5,6"), ("id3", "7,8,9")] {
        cloud.store.put(id, value);
    }
    cloud.store.fail_deletes("id1");

    let outcome = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default())
        .run(&request(), Some(3))
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.cleanup.failures.len(), 1);
    assert_eq!(
        outcome.cleanup.failures[0].resource,
        CleanupResource::Parameter(WorkerId::new("id1"))
    );
    assert!(!cloud.store.contains("id2"));
    assert!(!cloud.store.contains("id3"));
    assert!(!cloud.provisioning.exists("Run-1"));
}

#[tokio::test]
async fn test_stack_poll_exhaustion_tears_down() {
    let cloud = cloud(&["i-1"]);
    cloud
        .provisioning
        .script_statuses("Run-1", &["CREATE_IN_PROGRESS"]);

    let mut settings = LifecycleSettings::default();
    settings.stack_poll = RetryConfig::bounded("poll", Duration::from_millis(10), 3);
    let err = Orchestrator::new(cloud.capabilities(), settings)
        .run(&request(), Some(1))
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::RetryExhausted { attempts: 3, .. }));
    assert_eq!(cloud.provisioning.describe_calls(), 3);
    assert!(!cloud.provisioning.exists("Run-1"));
}

#[tokio::test]
async fn test_missing_group_output_is_fatal() {
    let cloud = InMemoryCloud::new();

    let err = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default())
        .run(&request(), None)
        .await
        .unwrap_err();

    assert!(matches!(err, CloudError::OutputNotFound { ref key, .. } if key == "ChildASGName"));
    assert!(!cloud.provisioning.exists("Run-1"));
}

#[tokio::test]
async fn test_worker_count_mismatch_is_fatal() {
    let cloud = cloud(&["i-1"]);

    let err = Orchestrator::new(cloud.capabilities(), LifecycleSettings::default())
        .run(&request(), Some(2))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CloudError::WorkerCountMismatch { expected: 2, ref workers } if workers.len() == 1
    ));
    assert!(!cloud.provisioning.exists("Run-1"));
}

#[tokio::test]
async fn test_partial_success_is_an_explicit_choice() {
    let cloud = cloud(&["id1", "id2"]);
    cloud.store.put("id1", "1,2,3");
    cloud.store.put("id2", "oops");

    let settings = LifecycleSettings {
        fan_in: FanInPolicy::PartialSuccess,
        ..LifecycleSettings::default()
    };
    let outcome = Orchestrator::new(cloud.capabilities(), settings)
        .run(&request(), Some(2))
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 1);
    assert_eq!(outcome.failures.len(), 1);
    assert!(matches!(
        outcome.failures[0].error,
        CloudError::MalformedResult { .. }
    ));
    assert!(!cloud.store.contains("id2"));
}

#[tokio::test(start_paused = true)]
async fn test_run_waits_for_slow_workers_side_by_side() {
    let cloud = cloud(&["i-1", "i-2", "i-3"]);
    for (key, value) in [("i-1", "1,2,3"), ("i-2", "4,5,6"), ("i-3", "7,8,9")] {
        cloud.store.put(key, value);
        cloud.store.delay(key, 2);
    }
    let capabilities = cloud.capabilities().with_sleeper(Arc::new(TokioSleeper));
    let start = tokio::time::Instant::now();

    let outcome = Orchestrator::new(capabilities, LifecycleSettings::default())
        .run(&request(), Some(3))
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert!(outcome.cleanup.is_clean());
    // a single worker alone takes two 3s polls
    assert!(start.elapsed() >= Duration::from_secs(6));
    assert!(start.elapsed() < Duration::from_secs(12));
}
