//! Mock ResourceStore for unit testing
//!
//! This module provides an in-memory implementation of `ResourceStore` that
//! behaves like the API server where the controller depends on it:
//! - create assigns uid, resourceVersion and creationTimestamp
//! - writes with a stale resourceVersion fail with `Conflict`
//! - deleting an object that holds finalizers only sets `deletionTimestamp`
//! - an object with a deletion timestamp is purged once its finalizers are empty
//!
//! Setup helpers (`insert_*`, `delete_*`, `add_pod`) do not count as writes;
//! trait calls do, so tests can assert that a reconcile pass wrote nothing.

mod table;

use crate::error::StoreError;
use crate::store_trait::ResourceStore;
use crds::{Port, PortClaim, PortClass, PortPool};
use k8s_openapi::api::core::v1::Pod;
use kube::ResourceExt;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use table::{Table, key};

/// Mock ResourceStore for testing
#[derive(Debug, Clone)]
pub struct MockResourceStore {
    classes: Table<PortClass>,
    pools: Table<PortPool>,
    claims: Table<PortClaim>,
    ports: Table<Port>,
    pods: Table<Pod>,
    writes: Arc<AtomicUsize>,
    fail_next_status_write: Arc<AtomicBool>,
}

impl Default for MockResourceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockResourceStore {
    /// Create an empty store
    pub fn new() -> Self {
        let versions = Arc::new(Mutex::new(0));
        Self {
            classes: Table::new("PortClass", Arc::clone(&versions)),
            pools: Table::new("PortPool", Arc::clone(&versions)),
            claims: Table::new("PortClaim", Arc::clone(&versions)),
            ports: Table::new("Port", Arc::clone(&versions)),
            pods: Table::new("Pod", versions),
            writes: Arc::new(AtomicUsize::new(0)),
            fail_next_status_write: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Number of writes issued through the `ResourceStore` trait so far
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make the next status write of any kind fail with `Conflict`,
    /// simulating a crash between two steps of a reconcile.
    pub fn fail_next_status_write(&self) {
        self.fail_next_status_write.store(true, Ordering::SeqCst);
    }

    fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }

    fn check_injected_failure(&self, kind: &'static str, name: String) -> Result<(), StoreError> {
        if self.fail_next_status_write.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Conflict { kind, name });
        }
        Ok(())
    }

    /// Store a PortClass as if created by a user
    pub fn insert_class(&self, class: &PortClass) -> PortClass {
        self.classes.create(class).unwrap_or_else(|_| class.clone())
    }

    /// Store a PortPool as if created by a user
    pub fn insert_pool(&self, pool: &PortPool) -> PortPool {
        self.pools.create(pool).unwrap_or_else(|_| pool.clone())
    }

    /// Store a PortClaim as if created by a user
    pub fn insert_claim(&self, claim: &PortClaim) -> PortClaim {
        self.claims.create(claim).unwrap_or_else(|_| claim.clone())
    }

    /// Store a Port as if created by a user
    pub fn insert_port(&self, port: &Port) -> Port {
        self.ports.create(port).unwrap_or_else(|_| port.clone())
    }

    /// Store a workload pod
    pub fn add_pod(&self, pod: &Pod) -> Pod {
        self.pods.create(pod).unwrap_or_else(|_| pod.clone())
    }

    /// Remove a workload pod
    pub fn remove_pod(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.pods.delete(&key(Some(namespace), name), None)
    }

    /// Request deletion of a PortClass
    pub fn delete_class(&self, name: &str) -> Result<(), StoreError> {
        self.classes.delete(name, None)
    }

    /// Request deletion of a PortPool
    pub fn delete_pool(&self, name: &str) -> Result<(), StoreError> {
        self.pools.delete(name, None)
    }

    /// Request deletion of a PortClaim
    pub fn delete_claim(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.claims.delete(&key(Some(namespace), name), None)
    }

    /// Request deletion of a Port
    pub fn delete_port_as_user(&self, name: &str) -> Result<(), StoreError> {
        self.ports.delete(name, None)
    }

    /// All stored PortClaims
    pub fn claims(&self) -> Vec<PortClaim> {
        self.claims.list()
    }

    /// All stored Ports
    pub fn ports(&self) -> Vec<Port> {
        self.ports.list()
    }

    /// Number of stored Ports
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Whether a PortClass is still stored
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.get(name).is_ok()
    }

    /// Whether a PortPool is still stored
    pub fn has_pool(&self, name: &str) -> bool {
        self.pools.get(name).is_ok()
    }

    /// Whether a PortClaim is still stored
    pub fn has_claim(&self, namespace: &str, name: &str) -> bool {
        self.claims.get(&key(Some(namespace), name)).is_ok()
    }
}

#[async_trait::async_trait]
impl ResourceStore for MockResourceStore {
    async fn get_class(&self, name: &str) -> Result<PortClass, StoreError> {
        self.classes.get(name)
    }

    async fn update_class_status(&self, class: &PortClass) -> Result<PortClass, StoreError> {
        self.check_injected_failure("PortClass", class.name_any())?;
        self.record_write();
        self.classes.update(class, |current, incoming| current.status = incoming.status.clone())
    }

    async fn update_class_finalizers(&self, class: &PortClass) -> Result<PortClass, StoreError> {
        self.record_write();
        self.classes.update(class, |current, incoming| {
            current.metadata.finalizers = incoming.metadata.finalizers.clone();
        })
    }

    async fn get_pool(&self, name: &str) -> Result<PortPool, StoreError> {
        self.pools.get(name)
    }

    async fn list_pools(&self) -> Result<Vec<PortPool>, StoreError> {
        Ok(self.pools.list())
    }

    async fn update_pool_status(&self, pool: &PortPool) -> Result<PortPool, StoreError> {
        self.check_injected_failure("PortPool", pool.name_any())?;
        self.record_write();
        self.pools.update(pool, |current, incoming| current.status = incoming.status.clone())
    }

    async fn update_pool_finalizers(&self, pool: &PortPool) -> Result<PortPool, StoreError> {
        self.record_write();
        self.pools.update(pool, |current, incoming| {
            current.metadata.finalizers = incoming.metadata.finalizers.clone();
        })
    }

    async fn get_claim(&self, namespace: &str, name: &str) -> Result<PortClaim, StoreError> {
        self.claims.get(&key(Some(namespace), name))
    }

    async fn update_claim_status(&self, claim: &PortClaim) -> Result<PortClaim, StoreError> {
        self.check_injected_failure("PortClaim", claim.name_any())?;
        self.record_write();
        self.claims.update(claim, |current, incoming| current.status = incoming.status.clone())
    }

    async fn update_claim_finalizers(&self, claim: &PortClaim) -> Result<PortClaim, StoreError> {
        self.record_write();
        self.claims.update(claim, |current, incoming| {
            current.metadata.finalizers = incoming.metadata.finalizers.clone();
        })
    }

    async fn get_port(&self, name: &str) -> Result<Port, StoreError> {
        self.ports.get(name)
    }

    async fn list_ports(&self) -> Result<Vec<Port>, StoreError> {
        Ok(self.ports.list())
    }

    async fn create_port(&self, port: &Port) -> Result<Port, StoreError> {
        self.record_write();
        self.ports.create(port)
    }

    async fn update_port_status(&self, port: &Port) -> Result<Port, StoreError> {
        self.check_injected_failure("Port", port.name_any())?;
        self.record_write();
        self.ports.update(port, |current, incoming| current.status = incoming.status.clone())
    }

    async fn update_port_finalizers(&self, port: &Port) -> Result<Port, StoreError> {
        self.record_write();
        self.ports.update(port, |current, incoming| {
            current.metadata.finalizers = incoming.metadata.finalizers.clone();
        })
    }

    async fn delete_port(&self, port: &Port) -> Result<(), StoreError> {
        self.record_write();
        self.ports
            .delete(&port.name_any(), Some((port.uid(), port.resource_version())))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, StoreError> {
        Ok(self
            .pods
            .list()
            .into_iter()
            .filter(|p| p.namespace().as_deref() == Some(namespace))
            .collect())
    }
}
