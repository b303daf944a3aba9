// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Named, short-lived mutual-exclusion scopes.
//!
//! Serializes check-then-create sequences per identity key (tenant +
//! channel + external id) so concurrent webhook deliveries for the same
//! sender cannot both pass the "does it exist?" check. Distinct keys
//! never contend, so unrelated senders see no head-of-line blocking.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-key async mutexes.
#[derive(Default)]
pub struct KeyedLocks {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting if a holder exists.
    ///
    /// The guard must be held only across the check-then-create step,
    /// never the whole event pipeline.
    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Number of keys ever locked (entries are kept for reuse).
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn same_key_serializes() {
        let locks = Arc::new(KeyedLocks::new());
        let in_section = Arc::new(AtomicUsize::new(0));
        let max_seen = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..20 {
            let locks = Arc::clone(&locks);
            let in_section = Arc::clone(&in_section);
            let max_seen = Arc::clone(&max_seen);
            handles.push(tokio::spawn(async move {
                let _guard = locks.acquire("tenant:whatsapp:555").await;
                let now = in_section.fetch_add(1, Ordering::SeqCst) + 1;
                max_seen.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                in_section.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(
            max_seen.load(Ordering::SeqCst),
            1,
            "two tasks entered the critical section for one key"
        );
    }

    #[tokio::test]
    async fn different_keys_run_concurrently() {
        let locks = Arc::new(KeyedLocks::new());

        // Hold key A, then show key B is still immediately acquirable.
        let _guard_a = locks.acquire("a").await;
        let acquired_b = tokio::time::timeout(
            std::time::Duration::from_millis(50),
            locks.acquire("b"),
        )
        .await;
        assert!(acquired_b.is_ok(), "distinct keys must not contend");
        assert_eq!(locks.len(), 2);
    }

    #[tokio::test]
    async fn released_key_is_reacquirable() {
        let locks = KeyedLocks::new();
        drop(locks.acquire("k").await);
        let reacquired =
            tokio::time::timeout(std::time::Duration::from_millis(50), locks.acquire("k")).await;
        assert!(reacquired.is_ok());
    }
}
