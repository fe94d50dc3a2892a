//! Per-thread-root locks
//!
//! A relocation holds the lock of every root it touches for its whole
//! duration. Roots are always locked in ascending id order so two operations
//! over the same pair of threads cannot deadlock.

use crate::types::PostId;
use crate::{Error, Result};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
pub struct RootLocks {
    locks: Mutex<HashMap<PostId, Arc<AsyncMutex<()>>>>,
}

/// Held locks; released on drop
pub struct RootGuard {
    roots: Vec<PostId>,
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl RootGuard {
    pub fn roots(&self) -> &[PostId] {
        &self.roots
    }

    /// Fail with `Conflict` unless `root` is one of the held roots
    ///
    /// A root resolved before locking may have joined another thread by the
    /// time the lock is granted.
    pub fn ensure_holds(&self, root: PostId) -> Result<()> {
        if self.roots.binary_search(&root).is_ok() {
            Ok(())
        } else {
            Err(Error::Conflict(format!(
                "Thread root changed to {} while waiting for the lock",
                root
            )))
        }
    }
}

impl RootLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock every root in `roots`, waiting for other holders
    pub async fn lock(&self, roots: &[PostId]) -> RootGuard {
        let mut roots = roots.to_vec();
        roots.sort();
        roots.dedup();

        let handles: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock();
            // Entries nobody holds or waits on can go
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            roots
                .iter()
                .map(|root| Arc::clone(locks.entry(*root).or_default()))
                .collect()
        };

        let mut guards = Vec::with_capacity(handles.len());
        for handle in handles {
            guards.push(handle.lock_owned().await);
        }

        tracing::trace!(roots = ?roots, "Acquired root locks");

        RootGuard {
            roots,
            _guards: guards,
        }
    }

    /// Number of roots with a live lock entry
    pub fn tracked(&self) -> usize {
        self.locks.lock().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_sorts_and_dedups() {
        let locks = RootLocks::new();
        let a = PostId::new();
        let b = PostId::new();
        let guard = locks.lock(&[b, a, b]).await;
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(guard.roots(), expected.as_slice());
    }

    #[tokio::test]
    async fn test_same_root_is_exclusive() {
        let locks = Arc::new(RootLocks::new());
        let root = PostId::new();
        let guard = locks.lock(&[root]).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.lock(&[root]).await;
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .expect("contender should acquire after release")
            .unwrap();
    }

    #[tokio::test]
    async fn test_ensure_holds() {
        let locks = RootLocks::new();
        let (a, b) = (PostId::new(), PostId::new());
        let guard = locks.lock(&[b, a]).await;
        assert!(guard.ensure_holds(a).is_ok());
        assert!(guard.ensure_holds(b).is_ok());
        assert!(matches!(guard.ensure_holds(PostId::new()), Err(Error::Conflict(_))));
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = RootLocks::new();
        for _ in 0..10 {
            let _guard = locks.lock(&[PostId::new()]).await;
        }
        let _guard = locks.lock(&[PostId::new()]).await;
        assert_eq!(locks.tracked(), 1);
    }
}
