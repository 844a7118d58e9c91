//! Container runtime trait - the outbound capability set of the provider.
//!
//! The provider drives containers only through these four operations:
//! - `run`: Create and start a container, returning its handle
//! - `remove`: Remove a container (optionally forcing a running one)
//! - `inspect`: Report the native status of a container
//! - `fetch_logs`: Return a snapshot of a container's output
//!
//! Anything the runtime can do beyond this set is out of reach by design of
//! the trait: the provider has no other way to talk to it.
//!
//! # Implementations
//!
//! - `DockerRuntime`: Docker Engine API via bollard
//! - Tests use a scripted in-memory runtime

use crate::pod::{LogOptions, RuntimeHandle};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// =============================================================================
// Errors
// =============================================================================

/// Errors reported by a [`ContainerRuntime`].
#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    /// Docker Engine API failure.
    #[error("docker: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// Runtime could not be reached.
    #[error("runtime unavailable: {0}")]
    Unavailable(String),

    /// Operation rejected by the runtime.
    #[error("{operation} failed for {handle}: {reason}")]
    Failed {
        operation: &'static str,
        handle: String,
        reason: String,
    },
}

impl RuntimeError {
    pub fn failed(
        operation: &'static str,
        handle: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Failed {
            operation,
            handle: handle.into(),
            reason: reason.into(),
        }
    }
}

pub type RuntimeResult<T> = std::result::Result<T, RuntimeError>;

// =============================================================================
// Requests and Reports
// =============================================================================

/// Everything needed to start one container.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunRequest {
    /// Runtime container name, `<container>-<uid>`.
    pub name: String,
    /// Image reference including tag.
    pub image: String,
    /// Space-joined entrypoint; empty keeps the image default.
    pub command: String,
    /// Space-joined arguments; empty keeps the image default.
    pub args: String,
    /// Entrypoint as declared, one element per argument.
    pub command_argv: Vec<String>,
    /// Arguments as declared, one element per argument.
    pub args_argv: Vec<String>,
    /// Resolved environment in declaration order.
    pub env: Vec<(String, String)>,
    /// Bind specifiers, `<host>:<container path>`.
    pub mounts: Vec<String>,
    /// Labels attached to the container.
    pub labels: Vec<(String, String)>,
}

/// Native status as reported by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeStatus {
    /// Coarse state label such as `running` or `exited`.
    pub label: String,
    /// Human-readable status text, e.g. `Exited (137)`.
    pub raw_status: String,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Container Runtime Trait
// =============================================================================

/// Container runtime driven by the provider.
///
/// # Lifecycle
///
/// ```text
/// run(request) → handle → [inspect(handle) | fetch_logs(handle, opts)]* → remove(handle)
/// ```
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    /// Returns the runtime name.
    fn name(&self) -> &str;

    /// Creates and starts a container.
    ///
    /// On error no container is left behind.
    async fn run(&self, request: RunRequest) -> RuntimeResult<RuntimeHandle>;

    /// Removes a container. A container that no longer exists counts as
    /// removed.
    async fn remove(&self, handle: &RuntimeHandle, force: bool) -> RuntimeResult<()>;

    /// Returns the native status, or `None` if the runtime does not know the
    /// handle.
    async fn inspect(&self, handle: &RuntimeHandle) -> RuntimeResult<Option<NativeStatus>>;

    /// Returns the container's combined output.
    async fn fetch_logs(&self, handle: &RuntimeHandle, opts: &LogOptions)
    -> RuntimeResult<Vec<u8>>;
}
