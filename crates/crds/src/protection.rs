//! Protection tokens
//!
//! Each kind carries one finalizer that keeps the API server from purging the
//! object while dependents still point at it. The token is attached at
//! admission and released by the owning reconciler once dependents are gone.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use kube::Resource;

use crate::{Port, PortClaim, PortClass, PortPool};

/// Typed finalizer owned by one resource kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProtectionToken {
    /// Held by PortClass objects
    Class,
    /// Held by PortPool objects
    Pool,
    /// Held by PortClaim objects
    Claim,
    /// Held by Port objects
    Port,
}

impl ProtectionToken {
    /// Finalizer string as stored in `metadata.finalizers`
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Class => "hostport.microscaler.io/class-protection",
            Self::Pool => "hostport.microscaler.io/pool-protection",
            Self::Claim => "hostport.microscaler.io/claim-protection",
            Self::Port => "hostport.microscaler.io/port-protection",
        }
    }

    /// Whether the token is present on `meta`
    pub fn is_held_by(self, meta: &ObjectMeta) -> bool {
        meta.finalizers
            .as_ref()
            .is_some_and(|f| f.iter().any(|s| s == self.as_str()))
    }

    /// Add the token to `meta`. Returns `false` if it was already there.
    pub fn attach(self, meta: &mut ObjectMeta) -> bool {
        if self.is_held_by(meta) {
            return false;
        }
        meta.finalizers
            .get_or_insert_with(Vec::new)
            .push(self.as_str().to_string());
        true
    }

    /// Remove the token from `meta`, keeping the order of other finalizers.
    /// Returns `false` if it was not there.
    pub fn release(self, meta: &mut ObjectMeta) -> bool {
        let Some(finalizers) = meta.finalizers.as_mut() else {
            return false;
        };
        let before = finalizers.len();
        finalizers.retain(|s| s != self.as_str());
        finalizers.len() != before
    }
}

impl std::fmt::Display for ProtectionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resource kinds that carry a protection token
pub trait Protected: Resource {
    /// The token this kind holds
    const TOKEN: ProtectionToken;

    /// Whether the object still holds its token
    fn is_protected(&self) -> bool {
        Self::TOKEN.is_held_by(self.meta())
    }

    /// Whether deletion has been requested
    fn is_being_deleted(&self) -> bool {
        self.meta().deletion_timestamp.is_some()
    }
}

impl Protected for PortClass {
    const TOKEN: ProtectionToken = ProtectionToken::Class;
}

impl Protected for PortPool {
    const TOKEN: ProtectionToken = ProtectionToken::Pool;
}

impl Protected for PortClaim {
    const TOKEN: ProtectionToken = ProtectionToken::Claim;
}

impl Protected for Port {
    const TOKEN: ProtectionToken = ProtectionToken::Port;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta_with(finalizers: &[&str]) -> ObjectMeta {
        ObjectMeta {
            finalizers: Some(finalizers.iter().map(|s| s.to_string()).collect()),
            ..Default::default()
        }
    }

    #[test]
    fn test_attach_is_idempotent() {
        let mut meta = ObjectMeta::default();

        assert!(ProtectionToken::Pool.attach(&mut meta));
        assert!(!ProtectionToken::Pool.attach(&mut meta));
        assert_eq!(meta.finalizers.as_ref().map(Vec::len), Some(1));
        assert!(ProtectionToken::Pool.is_held_by(&meta));
        assert!(!ProtectionToken::Class.is_held_by(&meta));
    }

    #[test]
    fn test_release_keeps_other_finalizers_in_order() {
        let mut meta = meta_with(&[
            "example.com/first",
            ProtectionToken::Claim.as_str(),
            "example.com/last",
        ]);

        assert!(ProtectionToken::Claim.release(&mut meta));
        assert_eq!(
            meta.finalizers,
            Some(vec!["example.com/first".to_string(), "example.com/last".to_string()])
        );
        assert!(!ProtectionToken::Claim.release(&mut meta));
    }

    #[test]
    fn test_release_without_finalizers() {
        let mut meta = ObjectMeta::default();
        assert!(!ProtectionToken::Port.release(&mut meta));
    }
}
