//! Allocation lock
//!
//! Two Ports reconciling at the same time must never pick the same free port.
//! A Port's status write is conditioned on its own resourceVersion, which does
//! not stop a second allocator from reading occupancy before the first write
//! lands. So every allocation runs inside an [`AllocationTransaction`]:
//! acquire, list occupancy, choose, write status, drop.
//!
//! The lock is process-wide. It only gives global exclusion while exactly one
//! controller replica is active; running several replicas needs leader
//! election or a store-level compare-and-swap on the port number instead.

use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;

/// Process-wide allocation lock, cheap to clone
#[derive(Debug, Clone, Default)]
pub struct AllocationLock {
    inner: Arc<Mutex<()>>,
}

impl AllocationLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access. The lock is released when the returned
    /// transaction is dropped, including on early `?` returns.
    pub async fn begin(&self, port: &str) -> AllocationTransaction {
        let guard = Arc::clone(&self.inner).lock_owned().await;
        debug!("Allocation lock acquired for Port {}", port);
        AllocationTransaction {
            port: port.to_string(),
            _guard: guard,
        }
    }
}

/// Scope guard for one allocation
#[derive(Debug)]
pub struct AllocationTransaction {
    port: String,
    _guard: OwnedMutexGuard<()>,
}

impl Drop for AllocationTransaction {
    fn drop(&mut self) {
        debug!("Allocation lock released for Port {}", self.port);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_second_transaction_waits_for_first() {
        let lock = AllocationLock::new();
        let first = lock.begin("a").await;

        let contender = lock.clone();
        let waiter = tokio::spawn(async move {
            let _second = contender.begin("b").await;
        });

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        drop(first);
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_released_on_error_path() {
        async fn failing(lock: &AllocationLock) -> Result<(), &'static str> {
            let _txn = lock.begin("a").await;
            Err("exhausted")
        }

        let lock = AllocationLock::new();
        assert!(failing(&lock).await.is_err());

        tokio::time::timeout(Duration::from_secs(1), lock.begin("b"))
            .await
            .unwrap();
    }
}
