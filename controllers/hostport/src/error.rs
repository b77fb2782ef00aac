//! Controller-specific error types.
//!
//! Store and Kubernetes errors are wrapped rather than re-modelled so the
//! error policy can still tell a conflict (retry now) from anything else
//! (retry with backoff).

use crate::allocator::AllocationError;
use kube::Error as KubeError;
use resource_store::StoreError;
use thiserror::Error;

/// Errors that can occur in the hostport controller.
#[derive(Debug, Error)]
pub enum ControllerError {
    /// Kubernetes API error outside the resource store (client setup, watches)
    #[error("Kubernetes error: {0}")]
    Kube(#[from] KubeError),

    /// Resource store error
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// No free port for a Port object; transient, retried with backoff
    #[error("Port allocation failed: {0}")]
    Exhausted(#[from] AllocationError),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Object is missing a field the reconciler needs
    #[error("{0} is missing {1}")]
    MissingField(String, &'static str),

    /// Admission webhook server failed
    #[error("Webhook server error: {0}")]
    Webhook(String),

    /// Resource watch failed
    #[error("Resource watch failed: {0}")]
    Watch(String),
}

impl ControllerError {
    /// Optimistic concurrency failure; retried from a fresh read without backoff
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }
}
