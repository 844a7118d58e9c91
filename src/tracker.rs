//! Pod identity tracking.
//!
//! The tracker maps a pod uid to the runtime handles created for it. It is
//! the only state the provider keeps between calls, and it lives in memory:
//! a restarted provider has forgotten every pod.
//!
//! [`UidLocks`] serializes create and delete for one uid while letting
//! different uids proceed in parallel. The tracker map itself is guarded by a
//! synchronous lock that is never held across an await.

use crate::error::{Error, Result};
use crate::pod::{PodUid, TrackedContainer};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

// =============================================================================
// Identity Tracker Trait
// =============================================================================

/// Mapping from pod uid to the containers provisioned for it.
pub trait IdentityTracker: Send + Sync {
    /// Records the containers of a pod.
    ///
    /// An existing entry is overwritten and returned.
    fn register(
        &self,
        uid: PodUid,
        containers: Vec<TrackedContainer>,
    ) -> Result<Option<Vec<TrackedContainer>>>;

    /// Returns the containers of a pod.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the uid is not tracked.
    fn lookup(&self, uid: &PodUid) -> Result<Vec<TrackedContainer>>;

    /// Drops a pod's entry, returning it.
    ///
    /// # Errors
    ///
    /// [`Error::NotFound`] if the uid is not tracked.
    fn remove(&self, uid: &PodUid) -> Result<Vec<TrackedContainer>>;

    /// Number of tracked pods.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// =============================================================================
// In-Memory Tracker
// =============================================================================

/// Process-local tracker.
#[derive(Debug, Default)]
pub struct InMemoryTracker {
    pods: RwLock<HashMap<PodUid, Vec<TrackedContainer>>>,
}

impl InMemoryTracker {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_tracked(uid: &PodUid) -> Error {
    Error::NotFound(format!("pod {uid} is not tracked"))
}

impl IdentityTracker for InMemoryTracker {
    fn register(
        &self,
        uid: PodUid,
        containers: Vec<TrackedContainer>,
    ) -> Result<Option<Vec<TrackedContainer>>> {
        let mut pods = self
            .pods
            .write()
            .map_err(|_| Error::Internal("lock poisoned".into()))?;

        let previous = pods.insert(uid.clone(), containers);
        if previous.is_some() {
            tracing::warn!(uid = %uid, "pod already tracked, replacing its handles");
        }
        Ok(previous)
    }

    fn lookup(&self, uid: &PodUid) -> Result<Vec<TrackedContainer>> {
        let pods = self
            .pods
            .read()
            .map_err(|_| Error::Internal("lock poisoned".into()))?;

        pods.get(uid).cloned().ok_or_else(|| not_tracked(uid))
    }

    fn remove(&self, uid: &PodUid) -> Result<Vec<TrackedContainer>> {
        let mut pods = self
            .pods
            .write()
            .map_err(|_| Error::Internal("lock poisoned".into()))?;

        pods.remove(uid).ok_or_else(|| not_tracked(uid))
    }

    fn len(&self) -> usize {
        self.pods
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

// =============================================================================
// Per-Uid Locks
// =============================================================================

#[derive(Debug)]
struct LockEntry {
    mutex: Arc<AsyncMutex<()>>,
    /// Tasks holding or waiting for `mutex`.
    users: usize,
}

type LockMap = HashMap<PodUid, LockEntry>;

/// Async mutex per pod uid.
///
/// Entries are created on first use and dropped once no task holds or waits
/// for them, including waiters whose future is dropped before acquiring.
#[derive(Debug, Clone, Default)]
pub struct UidLocks {
    locks: Arc<Mutex<LockMap>>,
}

impl UidLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Waits for exclusive access to `uid`.
    pub async fn lock(&self, uid: &PodUid) -> UidGuard {
        let (mutex, ticket) = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            let entry = locks.entry(uid.clone()).or_insert_with(|| LockEntry {
                mutex: Arc::default(),
                users: 0,
            });
            entry.users += 1;
            let ticket = Ticket {
                uid: uid.clone(),
                locks: Arc::clone(&self.locks),
            };
            (Arc::clone(&entry.mutex), ticket)
        };
        let guard = mutex.lock_owned().await;

        UidGuard {
            _guard: guard,
            _ticket: ticket,
        }
    }

    /// Number of uids with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Exclusive access to one uid; released on drop.
#[derive(Debug)]
pub struct UidGuard {
    // Field order matters: the mutex is released before the entry is
    // considered for removal.
    _guard: OwnedMutexGuard<()>,
    _ticket: Ticket,
}

/// One registered user of a uid entry.
#[derive(Debug)]
struct Ticket {
    uid: PodUid,
    locks: Arc<Mutex<LockMap>>,
}

impl Drop for Ticket {
    fn drop(&mut self) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);

        let idle = match locks.get_mut(&self.uid) {
            Some(entry) => {
                entry.users = entry.users.saturating_sub(1);
                entry.users == 0
            }
            None => false,
        };
        if idle {
            locks.remove(&self.uid);
        }
    }
}
