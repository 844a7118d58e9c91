//! Shared fixtures: a scripted in-memory runtime and pod builders.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use magiklink::pod::{LogOptions, PodCreateRequest, PodDescriptor, RuntimeHandle, VolumeBundle};
use magiklink::{
    ContainerRuntime, InMemoryTracker, Materializer, NativeStatus, Provider, RunRequest,
    RuntimeError, RuntimeResult,
};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// =============================================================================
// Fake Runtime
// =============================================================================

/// Creation time reported for every fake container.
pub fn created_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

#[derive(Default)]
struct FakeState {
    next_id: u64,
    containers: HashMap<String, FakeContainer>,
    runs: Vec<RunRequest>,
    removed: Vec<String>,
    fail_run_at: Option<usize>,
    fail_removes: bool,
    fail_inspect: bool,
    run_delay: Option<Duration>,
}

struct FakeContainer {
    status: Option<NativeStatus>,
    logs: Vec<u8>,
}

/// Runtime that keeps containers in memory and fails on request.
#[derive(Default)]
pub struct FakeRuntime {
    state: Mutex<FakeState>,
}

impl FakeRuntime {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Fails the `n`th run call (zero-based, counting all calls so far).
    pub fn fail_run_at(&self, n: usize) {
        self.state.lock().unwrap().fail_run_at = Some(n);
    }

    /// Delays the reply of every successful run after the container exists.
    pub fn delay_runs(&self, delay: Duration) {
        self.state.lock().unwrap().run_delay = Some(delay);
    }

    pub fn fail_removes(&self, fail: bool) {
        self.state.lock().unwrap().fail_removes = fail;
    }

    pub fn fail_inspect(&self, fail: bool) {
        self.state.lock().unwrap().fail_inspect = fail;
    }

    pub fn set_status(&self, handle: &RuntimeHandle, label: &str, raw: &str) {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.containers.get_mut(handle.as_str()) {
            c.status = Some(NativeStatus {
                label: label.to_string(),
                raw_status: raw.to_string(),
                created_at: created_at(),
            });
        }
    }

    pub fn set_logs(&self, handle: &RuntimeHandle, logs: &[u8]) {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.containers.get_mut(handle.as_str()) {
            c.logs = logs.to_vec();
        }
    }

    /// Forgets a container without going through `remove`.
    pub fn vanish(&self, handle: &RuntimeHandle) {
        self.state.lock().unwrap().containers.remove(handle.as_str());
    }

    pub fn runs(&self) -> Vec<RunRequest> {
        self.state.lock().unwrap().runs.clone()
    }

    pub fn removed(&self) -> Vec<String> {
        self.state.lock().unwrap().removed.clone()
    }

    pub fn live(&self) -> usize {
        self.state.lock().unwrap().containers.len()
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    fn name(&self) -> &str {
        "fake"
    }

    async fn run(&self, request: RunRequest) -> RuntimeResult<RuntimeHandle> {
        tokio::task::yield_now().await;
        let (id, delay) = {
            let mut state = self.state.lock().unwrap();
            let call = state.runs.len();
            state.runs.push(request.clone());

            if state.fail_run_at == Some(call) {
                return Err(RuntimeError::failed("run", request.name, "image not found"));
            }

            state.next_id += 1;
            let id = format!("c{:04}", state.next_id);
            state.containers.insert(
                id.clone(),
                FakeContainer {
                    status: Some(NativeStatus {
                        label: "running".to_string(),
                        raw_status: "Up".to_string(),
                        created_at: created_at(),
                    }),
                    logs: Vec::new(),
                },
            );
            (id, state.run_delay)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        Ok(RuntimeHandle::new(id))
    }

    async fn remove(&self, handle: &RuntimeHandle, _force: bool) -> RuntimeResult<()> {
        tokio::task::yield_now().await;
        let mut state = self.state.lock().unwrap();
        if state.fail_removes {
            return Err(RuntimeError::Unavailable("daemon restarting".to_string()));
        }
        state.containers.remove(handle.as_str());
        state.removed.push(handle.as_str().to_string());
        Ok(())
    }

    async fn inspect(&self, handle: &RuntimeHandle) -> RuntimeResult<Option<NativeStatus>> {
        let state = self.state.lock().unwrap();
        if state.fail_inspect {
            return Err(RuntimeError::Unavailable("daemon restarting".to_string()));
        }
        Ok(state
            .containers
            .get(handle.as_str())
            .and_then(|c| c.status.clone()))
    }

    async fn fetch_logs(
        &self,
        handle: &RuntimeHandle,
        opts: &LogOptions,
    ) -> RuntimeResult<Vec<u8>> {
        let state = self.state.lock().unwrap();
        let logs = state
            .containers
            .get(handle.as_str())
            .map(|c| c.logs.clone())
            .ok_or_else(|| RuntimeError::failed("logs", handle.as_str(), "no such container"))?;

        let logs = match opts.tail_lines() {
            Some(n) => {
                let text = String::from_utf8_lossy(&logs).into_owned();
                let lines: Vec<&str> = text.lines().collect();
                let start = lines.len().saturating_sub(n as usize);
                lines[start..].join("\n").into_bytes()
            }
            None => logs,
        };
        Ok(logs)
    }
}

// =============================================================================
// Builders
// =============================================================================

/// Pod with two containers and a configMap volume mounted in the first.
pub fn pod_value(uid: &str) -> serde_json::Value {
    json!({
        "metadata": { "name": "web", "namespace": "ns", "uid": uid },
        "spec": {
            "containers": [
                {
                    "name": "app",
                    "image": "alpine",
                    "tag": "3.19",
                    "command": ["sh", "-c"],
                    "args": ["echo", "hi"],
                    "volumeMounts": [{ "name": "cm1", "mountPath": "/etc/app" }],
                    "env": [
                        { "name": "MODE", "value": "prod" },
                        {
                            "name": "GREETING",
                            "valueFrom": { "configMapKeyRef": { "name": "cm1", "key": "a.txt" } }
                        }
                    ]
                },
                { "name": "sidecar", "image": "busybox" }
            ],
            "volumes": [{ "name": "cm1", "configMap": { "name": "cm1" } }]
        }
    })
}

pub fn bundle_value() -> serde_json::Value {
    json!({
        "name": "bundle",
        "namespace": "ns",
        "configMaps": [
            { "metadata": { "name": "cm1", "namespace": "ns" }, "data": { "a.txt": "hello" } }
        ]
    })
}

pub fn pod(uid: &str) -> PodDescriptor {
    serde_json::from_value(pod_value(uid)).unwrap()
}

pub fn bundle() -> VolumeBundle {
    serde_json::from_value(bundle_value()).unwrap()
}

pub fn create_request(uid: &str) -> PodCreateRequest {
    PodCreateRequest {
        pod: pod(uid),
        bundles: vec![bundle()],
    }
}

pub fn provider(runtime: Arc<FakeRuntime>, root: &Path) -> Provider {
    Provider::new(
        runtime,
        Arc::new(InMemoryTracker::new()),
        Materializer::new(root),
    )
}
