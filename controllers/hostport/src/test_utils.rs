//! Test utilities for unit testing reconcilers and admission handlers
//!
//! This module provides helpers for creating test data and setting up test scenarios.

use crate::config::Config;
use crate::reconciler::Reconciler;
use crds::*;
use k8s_openapi::api::core::v1::{Container, ContainerPort, Pod, PodSpec};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use resource_store::MockResourceStore;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Helper to create test PortClass CRD
pub fn create_test_class(name: &str) -> PortClass {
    PortClass::new(name, PortClassSpec {})
}

/// Helper to create test PortPool CRD, optionally with a phase
pub fn create_test_pool(
    name: &str,
    class: &str,
    start: u16,
    end: u16,
    enabled: bool,
    phase: Option<PortPoolPhase>,
) -> PortPool {
    let mut pool = PortPool::new(
        name,
        PortPoolSpec {
            class_ref: class.to_string(),
            start,
            end,
            enabled,
        },
    );
    pool.status = phase.map(|phase| PortPoolStatus {
        phase: Some(phase),
        conditions: Vec::new(),
    });
    pool
}

/// Helper to create test PortClaim CRD
pub fn create_test_claim(namespace: &str, name: &str, class: &str) -> PortClaim {
    let mut claim = PortClaim::new(
        name,
        PortClaimSpec {
            class_ref: class.to_string(),
        },
    );
    claim.metadata.namespace = Some(namespace.to_string());
    claim
}

/// Helper to create test Port CRD
pub fn create_test_port(name: &str, class: &str, claim_ref: Option<ClaimReference>) -> Port {
    Port::new(
        name,
        PortSpec {
            claim_ref,
            class_ref: class.to_string(),
        },
    )
}

/// Helper to give a Port an allocation status
pub fn set_port_allocated(port: &mut Port, number: u16, pool: &str, phase: PortPhase) {
    port.status = Some(PortStatus {
        phase: Some(phase),
        port: number,
        pool_name: Some(pool.to_string()),
    });
}

/// Helper to attach the kind's protection token, as the mutating webhook would
pub fn protected<K: Protected>(mut obj: K) -> K {
    K::TOKEN.attach(obj.meta_mut());
    obj
}

/// Helper to create a test Pod.
///
/// `ports` lists `(container, port name, hostPort)`; ports sharing a
/// container name land in the same container. An empty port name leaves the
/// port unnamed.
pub fn create_test_pod(
    namespace: &str,
    name: &str,
    annotations: &[(&str, &str)],
    ports: &[(&str, &str, i32)],
) -> Pod {
    let mut containers: Vec<Container> = Vec::new();
    for (container, port_name, host_port) in ports {
        let port = ContainerPort {
            name: (!port_name.is_empty()).then(|| port_name.to_string()),
            container_port: 8080,
            host_port: (*host_port > 0).then_some(*host_port),
            ..Default::default()
        };
        match containers.iter_mut().find(|c| c.name == *container) {
            Some(existing) => existing.ports.get_or_insert_with(Vec::new).push(port),
            None => containers.push(Container {
                name: container.to_string(),
                ports: Some(vec![port]),
                ..Default::default()
            }),
        }
    }

    Pod {
        metadata: ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            annotations: Some(
                annotations
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect::<BTreeMap<_, _>>(),
            ),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers,
            ..Default::default()
        }),
        status: None,
    }
}

/// Helper to create a Reconciler over a mock store, with default configuration
pub fn create_test_reconciler(store: &MockResourceStore) -> Reconciler {
    Reconciler::new(Arc::new(store.clone()), &Config::default())
}
