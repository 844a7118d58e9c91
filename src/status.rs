//! Status translation from runtime-native reports to [`ContainerStates`].
//!
//! | Native label | Result |
//! |--------------|--------|
//! | `running` | `Running { startedAt = created_at }` |
//! | `exited` | `Terminated { reason = raw text, exitCode = parsed or -1 }` |
//! | anything else, or unknown container | `Terminated { "Completed", 0 }` |
//!
//! The fallback never reports an indefinite state: callers poll status to
//! decide whether a pod is done, and a container the runtime has forgotten
//! is treated as finished.

use crate::constants::{
    FALLBACK_EXIT_CODE, FALLBACK_TERMINATED_REASON, NATIVE_STATUS_EXITED, NATIVE_STATUS_RUNNING,
    UNKNOWN_EXIT_CODE,
};
use crate::pod::{ContainerStates, StateRunning, StateTerminated};
use crate::runtime::NativeStatus;
use regex::Regex;
use std::sync::LazyLock;

/// `Exited (<code>)` where code is an optionally negative decimal integer.
static EXIT_CODE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Exited \((-?\d+)\)").expect("exit code pattern is valid"));

/// Extracts the exit code from status text such as `Exited (137) 2 hours ago`.
///
/// The first match wins. Returns `None` when the text carries no code or the
/// code does not fit in an `i32`.
#[must_use]
pub fn parse_exit_code(text: &str) -> Option<i32> {
    EXIT_CODE_PATTERN
        .captures(text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// Maps a native status (or its absence) to a normalized state.
#[must_use]
pub fn translate(native: Option<&NativeStatus>) -> ContainerStates {
    match native {
        Some(status) if status.label == NATIVE_STATUS_RUNNING => {
            ContainerStates::Running(StateRunning {
                started_at: status.created_at,
            })
        }
        Some(status) if status.label == NATIVE_STATUS_EXITED => {
            ContainerStates::Terminated(StateTerminated {
                reason: status.raw_status.clone(),
                exit_code: parse_exit_code(&status.raw_status).unwrap_or(UNKNOWN_EXIT_CODE),
            })
        }
        _ => ContainerStates::Terminated(StateTerminated {
            reason: FALLBACK_TERMINATED_REASON.to_string(),
            exit_code: FALLBACK_EXIT_CODE,
        }),
    }
}
