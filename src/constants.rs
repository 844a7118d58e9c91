//! # Provider Constants
//!
//! Limits, defaults and well-known strings shared by the provider modules.
//! These constants are the single source of truth for request bounds and for
//! the status vocabulary exchanged with the container runtime.
//!
//! ## Cross-References
//!
//! - [`crate::pod`]: Uses request limits during descriptor validation
//! - [`crate::status`]: Uses the native status labels and fallback values
//! - [`crate::config`]: Uses the default bind address and data root

// =============================================================================
// Request Limits
// =============================================================================

/// Maximum size of an encoded pod descriptor in bytes (1 MiB).
///
/// **Rationale**: Kubernetes caps objects at roughly 1.5 MiB in etcd; a pod
/// manifest larger than this is either malformed or hostile.
pub const MAX_MANIFEST_SIZE: usize = 1024 * 1024;

/// Maximum number of containers (init containers included) per pod.
pub const MAX_CONTAINERS_PER_POD: usize = 16;

/// Maximum number of volumes per pod.
pub const MAX_VOLUMES_PER_POD: usize = 64;

/// Maximum number of environment variables per container.
pub const MAX_ENV_VARS_PER_CONTAINER: usize = 256;

/// Maximum length for RFC 1123 labels (namespaces, containers, volumes).
pub const MAX_LABEL_NAME_LEN: usize = 63;

/// Maximum length for RFC 1123 subdomains (pods, ConfigMaps, Secrets).
pub const MAX_SUBDOMAIN_NAME_LEN: usize = 253;

/// Default termination grace period (seconds) when the descriptor has none.
pub const DEFAULT_GRACE_PERIOD_SECS: i64 = 30;

/// Namespace assumed when a descriptor omits one.
pub const DEFAULT_NAMESPACE: &str = "default";

// =============================================================================
// Native Status Vocabulary
// =============================================================================

/// Runtime label for a container whose process is alive.
pub const NATIVE_STATUS_RUNNING: &str = "running";

/// Runtime label for a container whose process has exited.
pub const NATIVE_STATUS_EXITED: &str = "exited";

/// Exit code reported when an exited container's status text carries none.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Reason reported for containers the runtime can no longer describe.
///
/// Callers rely on never seeing an indefinite state, so anything unknown is
/// reported as a graceful completion.
pub const FALLBACK_TERMINATED_REASON: &str = "Completed";

/// Exit code paired with [`FALLBACK_TERMINATED_REASON`].
pub const FALLBACK_EXIT_CODE: i32 = 0;

// =============================================================================
// Sidecar Defaults
// =============================================================================

/// Default listen address of the HTTP sidecar.
pub const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:4000";

/// Default directory materialized volume files are written under.
pub const DEFAULT_DATA_ROOT: &str = ".";

/// Label attached to every runtime container, holding the owning pod uid.
pub const POD_UID_LABEL: &str = "magiklink.pod.uid";

/// Label attached to every runtime container, holding the pod namespace.
pub const POD_NAMESPACE_LABEL: &str = "magiklink.pod.namespace";

/// Response text of a successful create.
pub const CREATED_RESPONSE: &str = "Containers created";

/// Response text of a successful delete.
pub const DELETED_RESPONSE: &str = "Containers deleted";
