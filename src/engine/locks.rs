//! Per-entity critical sections
//!
//! Every multi-document operation serializes on the ids it touches. Locks
//! must be taken in `LockScope` declaration order (application, applicant,
//! room, student, code) so that opposite-order interleavings cannot
//! deadlock. Guards are released before any notification is dispatched.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Entries are pruned once the registry grows past this many keys
const PRUNE_THRESHOLD: usize = 1024;

/// Lock namespaces, in global acquisition order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LockScope {
    /// Application record id
    Application,
    /// Applicant's external student id (pending uniqueness, student creation)
    Applicant,
    /// Room record id
    Room,
    /// Student record id
    Student,
    /// Application code being consumed by registration
    Code,
}

/// Held critical section; released on drop
pub type EntityGuard = OwnedMutexGuard<()>;

/// Registry of async mutexes keyed by scope and entity key
#[derive(Debug, Clone, Default)]
pub struct LockRegistry {
    locks: Arc<Mutex<HashMap<(LockScope, String), Arc<AsyncMutex<()>>>>>,
}

impl LockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for and take the critical section for `(scope, key)`
    pub async fn lock(&self, scope: LockScope, key: impl ToString) -> EntityGuard {
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            if locks.len() > PRUNE_THRESHOLD {
                // Only the registry holds idle entries
                locks.retain(|_, m| Arc::strong_count(m) > 1);
            }
            locks
                .entry((scope, key.to_string()))
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        mutex.lock_owned().await
    }

    /// Number of tracked keys
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn test_scope_order() {
        assert!(LockScope::Application < LockScope::Applicant);
        assert!(LockScope::Applicant < LockScope::Room);
        assert!(LockScope::Room < LockScope::Student);
        assert!(LockScope::Student < LockScope::Code);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_same_key_is_exclusive() {
        let registry = LockRegistry::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = registry.clone();
            let inside = inside.clone();
            let max_seen = max_seen.clone();
            handles.push(tokio::spawn(async move {
                let _guard = registry.lock(LockScope::Room, "R101").await;
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(2)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(max_seen.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_different_keys_do_not_block() {
        let registry = LockRegistry::new();
        let _a = registry.lock(LockScope::Room, "R101").await;
        let _b = registry.lock(LockScope::Room, "R102").await;
        // Same key string in another scope is a different lock
        let _c = registry.lock(LockScope::Student, "R101").await;
        assert_eq!(registry.len(), 3);
    }
}
