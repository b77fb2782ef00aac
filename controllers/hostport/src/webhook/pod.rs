//! Workload pod admission
//!
//! A pod asks for a host port by annotating `<claimPrefix>/<portName>` with the
//! name of a PortClaim in its namespace. On create, each claim is resolved to
//! its allocated Port and the number is written into the container port named
//! `<portName>`, plus a `<portPrefix>/<portName>` annotation recording it.
//! Host ports set any other way are rejected.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use axum::{Json, extract::State};
use crds::{PortClaimPhase, PortPhase, Protected};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use kube::core::admission::{AdmissionResponse, AdmissionReview, Operation};
use resource_store::{ResourceStore, StoreError};
use tracing::{debug, info};

use super::validation::{FieldError, respond};
use super::{AdmissionResult, WebhookState, into_request, with_diff};
use crate::config::AnnotationPrefixes;
use crate::mappers::claim_annotations;

pub async fn mutate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<Pod>>,
) -> AdmissionResult {
    let request = match into_request(review) {
        Ok(request) => request,
        Err(response) => return Ok(Json(response.into_review())),
    };
    let response = AdmissionResponse::from(&request);

    // Updates pass untouched so pods can always be finalized
    if !matches!(request.operation, Operation::Create) {
        return Ok(Json(response.into_review()));
    }
    let Some(pod) = request.object.as_ref() else {
        return Ok(Json(response.into_review()));
    };
    let namespace = request
        .namespace
        .clone()
        .or_else(|| pod.namespace())
        .unwrap_or_default();

    let response = match inject_claimed_ports(pod, &namespace, state.store.as_ref(), &state.annotations).await {
        Ok(mutated) => with_diff(response, pod, &mutated)?,
        Err(errors) => {
            info!(namespace = %namespace, errors = errors.len(), "Rejecting pod");
            respond(response, &errors)
        }
    };
    Ok(Json(response.into_review()))
}

/// Resolve every claim annotation of `pod` and return the pod with host
/// ports injected, or every problem found.
pub async fn inject_claimed_ports(
    pod: &Pod,
    namespace: &str,
    store: &dyn ResourceStore,
    prefixes: &AnnotationPrefixes,
) -> Result<Pod, Vec<FieldError>> {
    let mut errors = Vec::new();

    let mut claims: BTreeMap<&str, &str> = BTreeMap::new();
    for (port_name, claim_name) in claim_annotations(pod, &prefixes.claim) {
        let key = format!("{}/{}", prefixes.claim, port_name);
        if port_name.is_empty() {
            errors.push(FieldError::invalid(
                annotation_path(&key),
                &key,
                "annotation name must contain the port name",
            ));
            continue;
        }
        if claim_name.is_empty() {
            errors.push(FieldError::invalid(
                annotation_path(&key),
                claim_name,
                "annotation value must contain the claim name",
            ));
        }
        claims.insert(port_name, claim_name);
    }

    // (container index, port index) of every named port
    let mut located: HashMap<&str, (usize, usize)> = HashMap::new();
    let containers = pod.spec.as_ref().map(|s| s.containers.as_slice()).unwrap_or_default();
    for (ci, container) in containers.iter().enumerate() {
        for (pi, port) in container.ports.iter().flatten().enumerate() {
            let path = format!("spec.containers[{ci}].ports[{pi}]");
            let name = port.name.as_deref().unwrap_or_default();
            if !claims.is_empty() {
                if name.is_empty() {
                    errors.push(FieldError::invalid(format!("{path}.name"), name, "port name must be set"));
                } else if located.insert(name, (ci, pi)).is_some() {
                    errors.push(FieldError::duplicate(format!("{path}.name"), name));
                }
            }
            let host_port = port.host_port.unwrap_or(0);
            if host_port > 0 && !claims.contains_key(name) {
                errors.push(FieldError::invalid(
                    format!("{path}.hostPort"),
                    host_port,
                    "host ports cannot be set",
                ));
            }
        }
    }

    let mut mutated = pod.clone();
    for (port_name, claim_name) in &claims {
        if claim_name.is_empty() {
            continue;
        }
        let path = annotation_path(&format!("{}/{}", prefixes.claim, port_name));
        let number = match resolve_claimed_port(store, namespace, claim_name, &path).await {
            Ok(number) => number,
            Err(claim_errors) => {
                errors.extend(claim_errors);
                continue;
            }
        };

        let Some(&(ci, pi)) = located.get(port_name) else {
            debug!(port = %port_name, "No container port for claim, nothing to inject");
            continue;
        };
        mutated
            .annotations_mut()
            .insert(format!("{}/{}", prefixes.port, port_name), number.to_string());
        if let Some(port) = mutated
            .spec
            .as_mut()
            .and_then(|s| s.containers.get_mut(ci))
            .and_then(|c| c.ports.as_mut())
            .and_then(|p| p.get_mut(pi))
        {
            port.host_port = Some(i32::from(number));
        }
    }

    if errors.is_empty() { Ok(mutated) } else { Err(errors) }
}

/// Follow claim to Port and return the allocated number
async fn resolve_claimed_port(
    store: &dyn ResourceStore,
    namespace: &str,
    claim_name: &str,
    path: &str,
) -> Result<u16, Vec<FieldError>> {
    let claim = store
        .get_claim(namespace, claim_name)
        .await
        .map_err(|e| vec![lookup_error(path, claim_name, e)])?;

    let mut errors = Vec::new();
    if !matches!(claim.phase(), Some(PortClaimPhase::Bound | PortClaimPhase::Deleting)) {
        errors.push(FieldError::invalid(path, claim_name, "claim is not bound to a port yet"));
    }
    if !claim.is_protected() {
        errors.push(FieldError::invalid(path, claim_name, "claim is deleting"));
    }
    if !errors.is_empty() {
        return Err(errors);
    }

    let port_name = claim.backing_port_name().unwrap_or_default();
    let port = store
        .get_port(&port_name)
        .await
        .map_err(|e| vec![lookup_error(path, &port_name, e)])?;

    let number = port.allocated_port();
    if port.phase() != Some(PortPhase::Allocated) || number == 0 {
        return Err(vec![FieldError::invalid(path, &port_name, "port is not allocated yet")]);
    }
    Ok(number)
}

fn lookup_error(path: &str, name: &str, err: StoreError) -> FieldError {
    if err.is_not_found() {
        FieldError::not_found(path, name)
    } else {
        FieldError::internal(path, err)
    }
}

fn annotation_path(key: &str) -> String {
    format!("metadata.annotations[{key}]")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::webhook::validation::FieldErrorKind;
    use crds::{PortClaimStatus, port_name_for_claim};
    use resource_store::MockResourceStore;

    const CLAIM_KEY: &str = "claim.hostport.microscaler.io/http";

    /// Claim `web` in team-a, bound to a Port allocated `number`
    fn store_with_bound_claim(number: u16) -> MockResourceStore {
        let store = MockResourceStore::new();
        let mut claim = protected(create_test_claim("team-a", "web", "default"));
        claim.metadata.uid = Some("uid-1".to_string());
        claim.status = Some(PortClaimStatus {
            phase: Some(PortClaimPhase::Bound),
            bound_port_name: Some(port_name_for_claim("uid-1")),
        });
        store.insert_claim(&claim);
        let mut port = create_test_port(&port_name_for_claim("uid-1"), "default", None);
        set_port_allocated(&mut port, number, "a", PortPhase::Allocated);
        store.insert_port(&port);
        store
    }

    async fn inject(store: &MockResourceStore, pod: &Pod) -> Result<Pod, Vec<FieldError>> {
        inject_claimed_ports(pod, "team-a", store, &AnnotationPrefixes::default()).await
    }

    #[tokio::test]
    async fn test_pod_without_claims_is_untouched() {
        let store = MockResourceStore::new();
        let pod = create_test_pod("team-a", "web-0", &[], &[("app", "", 0), ("app", "", 0)]);
        assert_eq!(inject(&store, &pod).await.unwrap(), pod);
    }

    #[tokio::test]
    async fn test_injects_host_port() {
        let store = store_with_bound_claim(30050);
        let pod = create_test_pod("team-a", "web-0", &[(CLAIM_KEY, "web")], &[("app", "http", 0), ("app", "metrics", 0)]);

        let mutated = inject(&store, &pod).await.unwrap();
        assert_eq!(
            mutated.annotations().get("port.hostport.microscaler.io/http").map(String::as_str),
            Some("30050")
        );
        let ports = mutated.spec.unwrap().containers[0].ports.clone().unwrap();
        assert_eq!(ports[0].host_port, Some(30050));
        assert_eq!(ports[1].host_port, None);
    }

    #[tokio::test]
    async fn test_direct_host_port_rejected() {
        let store = MockResourceStore::new();
        let pod = create_test_pod("team-a", "web-0", &[], &[("app", "http", 8080)]);

        let errors = inject(&store, &pod).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].path, "spec.containers[0].ports[0].hostPort");
        assert_eq!(errors[0].detail, "host ports cannot be set");
    }

    #[tokio::test]
    async fn test_port_names_checked_when_claims_defined() {
        let store = store_with_bound_claim(30050);
        let pod = create_test_pod(
            "team-a",
            "web-0",
            &[(CLAIM_KEY, "web")],
            &[("app", "http", 0), ("app", "", 0), ("sidecar", "http", 0)],
        );

        let errors = inject(&store, &pod).await.unwrap_err();
        let found: Vec<_> = errors.iter().map(|e| (e.path.as_str(), e.kind)).collect();
        assert_eq!(
            found,
            vec![
                ("spec.containers[0].ports[1].name", FieldErrorKind::Invalid),
                ("spec.containers[1].ports[0].name", FieldErrorKind::Duplicate),
            ]
        );
    }

    #[tokio::test]
    async fn test_malformed_annotations() {
        let store = MockResourceStore::new();
        let pod = create_test_pod(
            "team-a",
            "web-0",
            &[("claim.hostport.microscaler.io/", "web"), (CLAIM_KEY, "")],
            &[("app", "http", 0)],
        );

        let errors = inject(&store, &pod).await.unwrap_err();
        let details: Vec<_> = errors.iter().map(|e| e.detail.as_str()).collect();
        assert_eq!(
            details,
            vec![
                "annotation name must contain the port name",
                "annotation value must contain the claim name",
            ]
        );
    }

    #[tokio::test]
    async fn test_unresolvable_claims() {
        // Missing claim
        let store = MockResourceStore::new();
        let pod = create_test_pod("team-a", "web-0", &[(CLAIM_KEY, "web")], &[("app", "http", 0)]);
        let errors = inject(&store, &pod).await.unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].kind, FieldErrorKind::NotFound);
        assert_eq!(errors[0].path, format!("metadata.annotations[{CLAIM_KEY}]"));

        // Pending and unprotected claim reports both problems
        store.insert_claim(&create_test_claim("team-a", "web", "default"));
        let details: Vec<_> = inject(&store, &pod)
            .await
            .unwrap_err()
            .into_iter()
            .map(|e| e.detail)
            .collect();
        assert_eq!(details, vec!["claim is not bound to a port yet", "claim is deleting"]);

        // Bound claim whose Port has no number yet
        let store = store_with_bound_claim(0);
        let errors = inject(&store, &pod).await.unwrap_err();
        assert_eq!(errors[0].detail, "port is not allocated yet");
    }
}
