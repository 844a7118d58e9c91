//! Tests for constants module.
//!
//! Validates that request limits are sane and that the status vocabulary
//! matches what the translator and the sidecar responses expect.

use magiklink::*;

// =============================================================================
// Request Limit Tests
// =============================================================================

#[test]
fn test_manifest_size_reasonable() {
    assert!(
        MAX_MANIFEST_SIZE >= 256 * 1024,
        "manifest limit too restrictive for pods with inline env"
    );
    assert!(
        MAX_MANIFEST_SIZE <= 4 * 1024 * 1024,
        "manifest limit too permissive"
    );
}

#[test]
fn test_name_lengths_match_rfc1123() {
    assert_eq!(MAX_LABEL_NAME_LEN, 63);
    assert_eq!(MAX_SUBDOMAIN_NAME_LEN, 253);
}

#[test]
fn test_per_pod_limits_nonzero() {
    assert!(MAX_CONTAINERS_PER_POD > 0);
    assert!(MAX_VOLUMES_PER_POD > 0);
    assert!(MAX_ENV_VARS_PER_CONTAINER > 0);
    assert!(DEFAULT_GRACE_PERIOD_SECS >= 0);
}

// =============================================================================
// Status Vocabulary Tests
// =============================================================================

#[test]
fn test_fallback_is_graceful_completion() {
    assert_eq!(FALLBACK_TERMINATED_REASON, "Completed");
    assert_eq!(FALLBACK_EXIT_CODE, 0);
    assert_ne!(UNKNOWN_EXIT_CODE, FALLBACK_EXIT_CODE);
}

#[test]
fn test_native_labels_distinct() {
    assert_ne!(NATIVE_STATUS_RUNNING, NATIVE_STATUS_EXITED);
}

#[test]
fn test_default_bind_address_parses() {
    assert!(
        DEFAULT_BIND_ADDRESS
            .parse::<std::net::SocketAddr>()
            .is_ok()
    );
}
