//! Reconciliation logic for the hostport CRDs.
//!
//! One submodule per kind:
//! - `class`: PortClass (Pending -> Ready)
//! - `pool`: PortPool (overlap check, Pending -> Ready)
//! - `claim`: PortClaim (backing Port creation, Pending -> Bound)
//! - `port`: Port (allocation, Pending -> Allocated, reclaim)
//!
//! Every reconcile reads fresh state from the store, issues at most one status
//! or finalizer write and returns. Watches bring the object back for its next
//! step, so a pass that finds nothing to do writes nothing.

pub mod class;
pub mod claim;
pub mod pool;
pub mod port;

#[cfg(test)]
mod pool_test;

use crate::allocation::AllocationLock;
use crate::backoff::FibonacciBackoff;
use crate::config::{AnnotationPrefixes, Config};
use resource_store::{ResourceStore, StoreError};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::warn;

/// Backoff state for a resource
#[derive(Debug, Clone)]
struct BackoffState {
    backoff: FibonacciBackoff,
    error_count: u32,
}

impl BackoffState {
    fn new(min_seconds: u64, max_seconds: u64) -> Self {
        Self {
            backoff: FibonacciBackoff::new(min_seconds, max_seconds),
            error_count: 0,
        }
    }
}

/// Reconciles hostport resources.
pub struct Reconciler {
    pub(crate) store: Arc<dyn ResourceStore>,
    pub(crate) allocation_lock: AllocationLock,
    pub(crate) annotations: AnnotationPrefixes,
    backoff_min_seconds: u64,
    backoff_max_seconds: u64,
    conflict_requeue: Duration,
    /// Error tracking per resource (kind/namespace/name -> BackoffState)
    backoff_states: Arc<Mutex<HashMap<String, BackoffState>>>,
}

impl Reconciler {
    /// Creates a new reconciler instance.
    pub fn new(store: Arc<dyn ResourceStore>, config: &Config) -> Self {
        Self {
            store,
            allocation_lock: AllocationLock::new(),
            annotations: config.annotations.clone(),
            backoff_min_seconds: config.backoff_min_seconds,
            backoff_max_seconds: config.backoff_max_seconds,
            conflict_requeue: config.conflict_requeue,
            backoff_states: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Next requeue delay for a failing resource. Advances its Fibonacci
    /// sequence and returns the delay with the resource's error count.
    pub fn backoff_for(&self, resource_key: &str) -> (Duration, u32) {
        match self.backoff_states.lock() {
            Ok(mut states) => {
                let state = states
                    .entry(resource_key.to_string())
                    .or_insert_with(|| BackoffState::new(self.backoff_min_seconds, self.backoff_max_seconds));
                state.error_count += 1;
                (state.backoff.next_backoff(), state.error_count)
            }
            Err(e) => {
                warn!("Failed to lock backoff_states: {}, using minimum backoff", e);
                (Duration::from_secs(self.backoff_min_seconds), 0)
            }
        }
    }

    /// Forget a resource's failures (on successful reconciliation)
    pub fn reset_backoff(&self, resource_key: &str) {
        if let Ok(mut states) = self.backoff_states.lock() {
            states.remove(resource_key);
        }
    }

    /// Requeue delay after an optimistic concurrency conflict
    pub fn conflict_requeue(&self) -> Duration {
        self.conflict_requeue
    }
}

/// Backoff key for a resource: `kind/namespace/name`, namespace empty when
/// cluster-scoped.
pub fn resource_key(kind: &str, namespace: Option<&str>, name: &str) -> String {
    format!("{}/{}/{}", kind, namespace.unwrap_or_default(), name)
}

/// Turn `NotFound` into `None`; every other error passes through
pub(crate) fn found<T>(result: Result<T, StoreError>) -> Result<Option<T>, StoreError> {
    match result {
        Ok(obj) => Ok(Some(obj)),
        Err(e) if e.is_not_found() => Ok(None),
        Err(e) => Err(e),
    }
}
