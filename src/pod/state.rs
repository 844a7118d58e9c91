//! Pod state types.
//!
//! This module defines the identity and status types for pods:
//! - `PodUid`: Control-plane assigned pod identifier
//! - `RuntimeHandle`: Opaque id of a container in the runtime
//! - `TrackedContainer`: One container of a tracked pod
//! - `PodStatus` / `ContainerStatus` / `ContainerStates`: Normalized status report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Identifiers
// =============================================================================

/// Unique identifier of a pod, as assigned by the control plane.
///
/// The provider never generates these; they arrive with every request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PodUid(String);

impl PodUid {
    pub fn new(uid: impl Into<String>) -> Self {
        Self(uid.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PodUid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PodUid {
    fn from(uid: &str) -> Self {
        Self(uid.to_string())
    }
}

impl From<String> for PodUid {
    fn from(uid: String) -> Self {
        Self(uid)
    }
}

/// Runtime-native container id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RuntimeHandle(String);

impl RuntimeHandle {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for RuntimeHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A provisioned container of a tracked pod.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedContainer {
    /// Container name from the pod descriptor.
    pub name: String,
    pub handle: RuntimeHandle,
}

impl TrackedContainer {
    pub fn new(name: impl Into<String>, handle: RuntimeHandle) -> Self {
        Self {
            name: name.into(),
            handle,
        }
    }
}

// =============================================================================
// Status Report
// =============================================================================

/// Status of one pod.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PodStatus {
    pub name: String,
    #[serde(rename = "UID")]
    pub uid: String,
    pub namespace: String,
    /// One entry per tracked container, in provisioning order.
    #[serde(default)]
    pub containers: Vec<ContainerStatus>,
}

/// Status of one container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerStatus {
    pub name: String,
    pub state: ContainerStates,
}

/// Normalized container state. At most one state is active.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ContainerStatesWire", into = "ContainerStatesWire")]
pub enum ContainerStates {
    /// No state known yet.
    #[default]
    Pending,
    Running(StateRunning),
    Waiting(StateWaiting),
    Terminated(StateTerminated),
}

impl ContainerStates {
    #[must_use]
    pub fn running(&self) -> Option<&StateRunning> {
        match self {
            Self::Running(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn waiting(&self) -> Option<&StateWaiting> {
        match self {
            Self::Waiting(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn terminated(&self) -> Option<&StateTerminated> {
        match self {
            Self::Terminated(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRunning {
    #[serde(rename = "startedAt")]
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateWaiting {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateTerminated {
    #[serde(default)]
    pub reason: String,
    #[serde(rename = "exitCode")]
    pub exit_code: i32,
}

#[derive(Serialize, Deserialize)]
struct ContainerStatesWire {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    running: Option<StateRunning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    waiting: Option<StateWaiting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    terminated: Option<StateTerminated>,
}

impl TryFrom<ContainerStatesWire> for ContainerStates {
    type Error = &'static str;

    fn try_from(wire: ContainerStatesWire) -> Result<Self, Self::Error> {
        match (wire.running, wire.waiting, wire.terminated) {
            (None, None, None) => Ok(Self::Pending),
            (Some(r), None, None) => Ok(Self::Running(r)),
            (None, Some(w), None) => Ok(Self::Waiting(w)),
            (None, None, Some(t)) => Ok(Self::Terminated(t)),
            _ => Err("container state must have at most one of running, waiting, terminated"),
        }
    }
}

impl From<ContainerStates> for ContainerStatesWire {
    fn from(state: ContainerStates) -> Self {
        let mut wire = Self {
            running: None,
            waiting: None,
            terminated: None,
        };
        match state {
            ContainerStates::Pending => {}
            ContainerStates::Running(r) => wire.running = Some(r),
            ContainerStates::Waiting(w) => wire.waiting = Some(w),
            ContainerStates::Terminated(t) => wire.terminated = Some(t),
        }
        wire
    }
}
