//! Watch mappers
//!
//! A change to one object often means another object must be reconciled
//! again: a pool going away may unblock its class's deletion, a port being
//! allocated may unblock its pool's deletion, and so on. Each function here
//! maps a watched object to the set of objects to re-enqueue. They are pure
//! so they can be tested without a cluster.

use crds::{Port, PortClaim, PortClass, PortPool};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use kube_runtime::reflector::ObjectRef;

/// Class named by a pool's `classRef`
pub fn pool_to_class(pool: &PortPool) -> Option<ObjectRef<PortClass>> {
    non_empty(&pool.spec.class_ref).map(ObjectRef::new)
}

/// Class named by a port's `classRef`
pub fn port_to_class(port: &Port) -> Option<ObjectRef<PortClass>> {
    non_empty(&port.spec.class_ref).map(ObjectRef::new)
}

/// Pool that supplied a port
pub fn port_to_pool(port: &Port) -> Option<ObjectRef<PortPool>> {
    port.pool_name().and_then(non_empty).map(ObjectRef::new)
}

/// Claim a port is bound to
pub fn port_to_claim(port: &Port) -> Option<ObjectRef<PortClaim>> {
    let claim = port.spec.claim_ref.as_ref()?;
    Some(ObjectRef::new(non_empty(&claim.name)?).within(&claim.namespace))
}

/// Port backing a claim
pub fn claim_to_port(claim: &PortClaim) -> Option<ObjectRef<Port>> {
    claim.backing_port_name().map(|name| ObjectRef::new(&name))
}

/// Claims named by a pod's claim annotations (`<prefix>/<port-name>: <claim>`)
pub fn pod_to_claims(pod: &Pod, claim_prefix: &str) -> Vec<ObjectRef<PortClaim>> {
    let Some(namespace) = pod.namespace() else {
        return Vec::new();
    };
    let mut claims: Vec<ObjectRef<PortClaim>> = claim_annotations(pod, claim_prefix)
        .filter_map(|(_, claim)| non_empty(claim))
        .map(|claim| ObjectRef::new(claim).within(&namespace))
        .collect();
    claims.dedup();
    claims
}

/// Pod annotations under `claim_prefix`, as `(port name, claim name)` pairs
pub fn claim_annotations<'a>(
    pod: &'a Pod,
    claim_prefix: &'a str,
) -> impl Iterator<Item = (&'a str, &'a str)> + 'a {
    pod.annotations().iter().filter_map(move |(key, value)| {
        let port = key.strip_prefix(claim_prefix)?.strip_prefix('/')?;
        Some((port, value.as_str()))
    })
}

fn non_empty(s: &str) -> Option<&str> {
    (!s.is_empty()).then_some(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crds::{ClaimReference, PortClaimStatus, PortPhase};

    #[test]
    fn test_pool_and_port_to_class() {
        let pool = create_test_pool("a", "default", 5000, 5010, true, None);
        assert_eq!(pool_to_class(&pool), Some(ObjectRef::new("default")));

        let port = create_test_port("claim-1", "default", None);
        assert_eq!(port_to_class(&port), Some(ObjectRef::new("default")));
    }

    #[test]
    fn test_port_to_pool_requires_allocation() {
        let mut port = create_test_port("claim-1", "default", None);
        assert_eq!(port_to_pool(&port), None);

        set_port_allocated(&mut port, 5003, "a", PortPhase::Allocated);
        assert_eq!(port_to_pool(&port), Some(ObjectRef::new("a")));
    }

    #[test]
    fn test_port_to_claim() {
        let port = create_test_port(
            "claim-1",
            "default",
            Some(ClaimReference::new("team-a", "web", "1")),
        );
        assert_eq!(port_to_claim(&port), Some(ObjectRef::new("web").within("team-a")));

        let unbound = create_test_port("orphan", "default", None);
        assert_eq!(port_to_claim(&unbound), None);
    }

    #[test]
    fn test_claim_to_port_prefers_status() {
        let mut claim = create_test_claim("team-a", "web", "default");
        claim.metadata.uid = Some("abc".to_string());
        assert_eq!(claim_to_port(&claim), Some(ObjectRef::new("claim-abc")));

        claim.status = Some(PortClaimStatus {
            phase: None,
            bound_port_name: Some("recorded".to_string()),
        });
        assert_eq!(claim_to_port(&claim), Some(ObjectRef::new("recorded")));
    }

    #[test]
    fn test_pod_to_claims() {
        let pod = create_test_pod(
            "team-a",
            "web-0",
            &[
                ("hostport.example.com/web", "web-claim"),
                ("hostport.example.com/metrics", "metrics-claim"),
                ("hostport.example.com/empty", ""),
                ("other.example.com/web", "ignored"),
                ("hostport.example.comx/web", "ignored"),
            ],
            &[],
        );

        let mut claims = pod_to_claims(&pod, "hostport.example.com");
        claims.sort_by(|a, b| a.name.cmp(&b.name));
        assert_eq!(
            claims,
            vec![
                ObjectRef::new("metrics-claim").within("team-a"),
                ObjectRef::new("web-claim").within("team-a"),
            ]
        );
    }
}
