//! Integration tests for the lifecycle controller.
//!
//! All tests run against the scripted runtime in `common`, so no container
//! engine is required.

mod common;

use common::{FakeRuntime, bundle, create_request, created_at, pod, provider};
use magiklink::pod::{LogOptions, LogRequest, PodCreateRequest, PodReference, PodUid};
use magiklink::{CREATED_RESPONSE, DELETED_RESPONSE, POD_UID_LABEL};
use std::sync::Arc;
use tempfile::TempDir;

fn reference(uid: &str) -> PodReference {
    PodReference::new("web", "ns", uid)
}

fn log_request(uid: &str, container: &str) -> LogRequest {
    LogRequest {
        namespace: "ns".to_string(),
        pod_uid: uid.to_string(),
        pod_name: "web".to_string(),
        container_name: container.to_string(),
        opts: LogOptions::default(),
    }
}

// =============================================================================
// Create
// =============================================================================

#[tokio::test]
async fn test_create_then_status_reports_first_container() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();

    let status = provider.status(&reference("uid-1")).await.unwrap();
    assert_eq!(status.uid, "uid-1");
    assert_eq!(status.name, "web");
    assert_eq!(status.namespace, "ns");
    assert_eq!(status.containers.len(), 1);
    assert_eq!(status.containers[0].name, "app");

    let running = status.containers[0].state.running().unwrap();
    assert_eq!(running.started_at, created_at());
    assert!(status.containers[0].state.terminated().is_none());
}

#[tokio::test]
async fn test_create_builds_run_request() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();

    let runs = runtime.runs();
    assert_eq!(runs.len(), 1);
    let run = &runs[0];
    assert_eq!(run.name, "app-uid-1");
    assert_eq!(run.image, "alpine:3.19");
    assert_eq!(run.command, "sh -c");
    assert_eq!(run.args, "echo hi");
    assert_eq!(run.command_argv, vec!["sh".to_string(), "-c".to_string()]);
    assert_eq!(run.args_argv, vec!["echo".to_string(), "hi".to_string()]);
    assert_eq!(
        run.env,
        vec![
            ("MODE".to_string(), "prod".to_string()),
            ("GREETING".to_string(), "hello".to_string()),
        ]
    );
    assert_eq!(run.mounts, vec!["ns-cm1:/etc/app".to_string()]);
    assert!(
        run.labels
            .contains(&(POD_UID_LABEL.to_string(), "uid-1".to_string()))
    );
}

#[tokio::test]
async fn test_create_keeps_multi_word_arguments() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    let mut request = create_request("uid-1");
    request.pod.spec.containers[0].args = vec!["echo hello world".to_string()];
    provider.create(&request).await.unwrap();

    let run = &runtime.runs()[0];
    assert_eq!(run.args, "echo hello world");
    assert_eq!(run.args_argv, vec!["echo hello world".to_string()]);
}

#[tokio::test]
async fn test_create_materializes_volumes() {
    let dir = TempDir::new().unwrap();
    let provider = provider(FakeRuntime::new(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();

    let content = std::fs::read_to_string(dir.path().join("ns-cm1/a.txt")).unwrap();
    assert_eq!(content, "hello");
}

#[tokio::test]
async fn test_create_rejects_pod_without_containers() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    let mut request = create_request("uid-1");
    request.pod.spec.containers.clear();

    let err = provider.create(&request).await.unwrap_err();
    assert!(err.is_validation());
    assert!(runtime.runs().is_empty());
    assert!(provider.tracker().is_empty());
}

#[tokio::test]
async fn test_create_runtime_failure_leaves_nothing_tracked() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    runtime.fail_run_at(0);
    let provider = provider(runtime.clone(), dir.path());

    let err = provider.create(&create_request("uid-1")).await.unwrap_err();
    assert!(matches!(err, magiklink::Error::Runtime(_)));

    let err = provider.status(&reference("uid-1")).await.unwrap_err();
    assert!(err.is_not_found());
    assert!(provider.tracker().is_empty());
}

#[tokio::test]
async fn test_create_materialization_failure_stops_before_runtime() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("not-a-directory");
    std::fs::write(&root, "occupied").unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), &root);

    let err = provider.create(&create_request("uid-1")).await.unwrap_err();
    assert!(
        matches!(err, magiklink::Error::Io { .. }),
        "expected io error, got {err:?}"
    );
    assert!(runtime.runs().is_empty(), "runtime must not be called");
    assert!(provider.tracker().is_empty());
}

#[tokio::test]
async fn test_create_missing_env_reference_is_rejected() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    let request = PodCreateRequest {
        pod: pod("uid-1"),
        bundles: vec![],
    };

    let err = provider.create(&request).await.unwrap_err();
    assert!(err.is_validation());
    assert!(runtime.runs().is_empty());
}

#[tokio::test]
async fn test_create_twice_overwrites_entry() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();
    provider.create(&create_request("uid-1")).await.unwrap();

    assert_eq!(provider.tracker().len(), 1);
    let tracked = provider.tracker().lookup(&PodUid::from("uid-1")).unwrap();
    assert_eq!(tracked.len(), 1);
    assert_eq!(tracked[0].handle.as_str(), "c0002");
}

// =============================================================================
// All-Containers Mode
// =============================================================================

#[tokio::test]
async fn test_all_containers_mode_tracks_every_container() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path()).with_all_containers(true);

    provider.create(&create_request("uid-1")).await.unwrap();

    let status = provider.status(&reference("uid-1")).await.unwrap();
    let names: Vec<&str> = status.containers.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["app", "sidecar"]);
    assert_eq!(runtime.runs()[1].name, "sidecar-uid-1");
}

#[tokio::test]
async fn test_all_containers_mode_cleans_up_on_failure() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    runtime.fail_run_at(1);
    let provider = provider(runtime.clone(), dir.path()).with_all_containers(true);

    assert!(provider.create(&create_request("uid-1")).await.is_err());

    assert_eq!(runtime.live(), 0);
    assert_eq!(runtime.removed(), vec!["c0001".to_string()]);
    assert!(provider.tracker().is_empty());
}

// =============================================================================
// Delete
// =============================================================================

#[tokio::test]
async fn test_delete_unregistered_uid_is_not_found() {
    let dir = TempDir::new().unwrap();
    let provider = provider(FakeRuntime::new(), dir.path());

    let err = provider.delete(&PodUid::from("missing")).await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_removes_containers_and_entry() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();
    provider.delete(&PodUid::from("uid-1")).await.unwrap();

    assert_eq!(runtime.live(), 0);
    assert!(provider.tracker().is_empty());
    assert!(
        provider
            .status(&reference("uid-1"))
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn test_delete_failure_retains_entry_for_retry() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();

    runtime.fail_removes(true);
    let err = provider.delete(&PodUid::from("uid-1")).await.unwrap_err();
    assert!(matches!(err, magiklink::Error::Runtime(_)));
    assert_eq!(provider.tracker().len(), 1);

    runtime.fail_removes(false);
    provider.delete(&PodUid::from("uid-1")).await.unwrap();
    assert!(provider.tracker().is_empty());
    assert_eq!(runtime.live(), 0);
}

// =============================================================================
// Status
// =============================================================================

#[tokio::test]
async fn test_status_exited_container() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();
    let handle = provider.tracker().lookup(&PodUid::from("uid-1")).unwrap()[0]
        .handle
        .clone();
    runtime.set_status(&handle, "exited", "Exited (137)");

    let status = provider.status(&reference("uid-1")).await.unwrap();
    let terminated = status.containers[0].state.terminated().unwrap();
    assert_eq!(terminated.exit_code, 137);
    assert_eq!(terminated.reason, "Exited (137)");
}

#[tokio::test]
async fn test_status_vanished_container_is_completed() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();
    let handle = provider.tracker().lookup(&PodUid::from("uid-1")).unwrap()[0]
        .handle
        .clone();
    runtime.vanish(&handle);

    let status = provider.status(&reference("uid-1")).await.unwrap();
    let terminated = status.containers[0].state.terminated().unwrap();
    assert_eq!(terminated.exit_code, 0);
    assert_eq!(terminated.reason, "Completed");
}

#[tokio::test]
async fn test_status_runtime_error_surfaces() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();
    runtime.fail_inspect(true);

    let err = provider.status(&reference("uid-1")).await.unwrap_err();
    assert!(matches!(err, magiklink::Error::Runtime(_)));
}

// =============================================================================
// Logs
// =============================================================================

#[tokio::test]
async fn test_logs_of_named_and_default_container() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    provider.create(&create_request("uid-1")).await.unwrap();
    let handle = provider.tracker().lookup(&PodUid::from("uid-1")).unwrap()[0]
        .handle
        .clone();
    runtime.set_logs(&handle, b"one\ntwo\nthree");

    let logs = provider.logs(&log_request("uid-1", "app")).await.unwrap();
    assert_eq!(logs, b"one\ntwo\nthree");

    let logs = provider.logs(&log_request("uid-1", "")).await.unwrap();
    assert_eq!(logs, b"one\ntwo\nthree");

    let mut request = log_request("uid-1", "app");
    request.opts.tail = 1;
    assert_eq!(provider.logs(&request).await.unwrap(), b"three");
}

#[tokio::test]
async fn test_logs_errors() {
    let dir = TempDir::new().unwrap();
    let provider = provider(FakeRuntime::new(), dir.path());
    provider.create(&create_request("uid-1")).await.unwrap();

    // not provisioned in first-container mode
    let err = provider
        .logs(&log_request("uid-1", "sidecar"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let err = provider
        .logs(&log_request("uid-2", "app"))
        .await
        .unwrap_err();
    assert!(err.is_not_found());

    let mut request = log_request("uid-1", "app");
    request.opts.tail = 5;
    request.opts.limit_bytes = 10;
    assert!(provider.logs(&request).await.unwrap_err().is_validation());
}

// =============================================================================
// Batch Entry Points
// =============================================================================

#[tokio::test]
async fn test_batch_entry_points() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = provider(runtime.clone(), dir.path());

    let created = provider
        .create_pods(vec![create_request("uid-1"), create_request("uid-2")])
        .await
        .unwrap();
    assert_eq!(created, CREATED_RESPONSE);
    // only the first element is handled
    assert_eq!(provider.tracker().len(), 1);

    let statuses = provider
        .get_statuses(vec![reference("uid-1")])
        .await
        .unwrap();
    assert_eq!(statuses.len(), 1);

    let deleted = provider.delete_pod(reference("uid-1")).await.unwrap();
    assert_eq!(deleted, DELETED_RESPONSE);
}

#[tokio::test]
async fn test_batch_empty_lists_are_rejected() {
    let dir = TempDir::new().unwrap();
    let provider = provider(FakeRuntime::new(), dir.path());

    assert!(provider.create_pods(vec![]).await.unwrap_err().is_validation());
    assert!(
        provider
            .get_statuses(vec![])
            .await
            .unwrap_err()
            .is_validation()
    );
}

// =============================================================================
// Concurrency
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_creates_on_distinct_uids() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = Arc::new(provider(runtime.clone(), dir.path()));

    let mut tasks = Vec::new();
    for i in 0..16 {
        let provider = Arc::clone(&provider);
        tasks.push(tokio::spawn(async move {
            provider
                .create(&create_request(&format!("uid-{i}")))
                .await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(provider.tracker().len(), 16);
    let mut handles = Vec::new();
    for i in 0..16 {
        let tracked = provider
            .tracker()
            .lookup(&PodUid::from(format!("uid-{i}")))
            .unwrap();
        assert_eq!(tracked.len(), 1);
        handles.push(tracked[0].handle.clone());
    }
    handles.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    handles.dedup();
    assert_eq!(handles.len(), 16);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_create_delete_race_on_one_uid() {
    let dir = TempDir::new().unwrap();
    let runtime = FakeRuntime::new();
    let provider = Arc::new(provider(runtime.clone(), dir.path()));

    let creator = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.create(&create_request("uid-1")).await })
    };
    let deleter = {
        let provider = Arc::clone(&provider);
        tokio::spawn(async move { provider.delete(&PodUid::from("uid-1")).await })
    };

    creator.await.unwrap().unwrap();
    let deleted = deleter.await.unwrap();

    match provider.tracker().lookup(&PodUid::from("uid-1")) {
        // delete ran first and found nothing
        Ok(tracked) => {
            assert!(deleted.unwrap_err().is_not_found());
            assert_eq!(tracked.len(), 1);
            assert_eq!(runtime.live(), 1);
        }
        // delete ran after create
        Err(e) => {
            assert!(e.is_not_found());
            deleted.unwrap();
            assert_eq!(runtime.live(), 0);
        }
    }
}

#[tokio::test]
async fn test_bundle_namespace_applies_to_members() {
    let dir = TempDir::new().unwrap();
    let provider = provider(FakeRuntime::new(), dir.path());

    let mut b = bundle();
    b.config_maps[0].metadata.namespace.clear();
    let request = PodCreateRequest {
        pod: pod("uid-1"),
        bundles: vec![b],
    };
    provider.create(&request).await.unwrap();
    assert!(dir.path().join("ns-cm1/a.txt").exists());
}
