//! Resource store errors

use thiserror::Error;

/// Errors returned by a [`ResourceStore`](crate::ResourceStore)
#[derive(Debug, Error)]
pub enum StoreError {
    /// Object does not exist
    #[error("{kind} {name} not found")]
    NotFound { kind: &'static str, name: String },

    /// Optimistic concurrency precondition failed (stale resourceVersion or uid)
    #[error("conflict writing {kind} {name}: object was modified")]
    Conflict { kind: &'static str, name: String },

    /// Create of an object whose name is taken
    #[error("{kind} {name} already exists")]
    AlreadyExists { kind: &'static str, name: String },

    /// Any other Kubernetes API failure
    #[error("Kubernetes error: {0}")]
    Kube(#[from] kube::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Object is missing a field the store needs (name, resourceVersion)
    #[error("Invalid object: {0}")]
    InvalidObject(String),
}

impl StoreError {
    /// Whether the error means the object is gone
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether the error is an optimistic concurrency failure
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Whether the error is a duplicate create
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Classify a raw API error for object `kind`/`name`.
    pub fn from_kube(err: kube::Error, kind: &'static str, name: &str) -> Self {
        match err {
            kube::Error::Api(ae) if ae.code == 404 => Self::NotFound {
                kind,
                name: name.to_string(),
            },
            kube::Error::Api(ae) if ae.code == 409 && ae.reason == "AlreadyExists" => {
                Self::AlreadyExists {
                    kind,
                    name: name.to_string(),
                }
            }
            kube::Error::Api(ae) if ae.code == 409 => Self::Conflict {
                kind,
                name: name.to_string(),
            },
            other => Self::Kube(other),
        }
    }
}
