//! ResourceStore trait for mocking
//!
//! This trait abstracts the Kubernetes API so reconcilers and admission
//! handlers can be unit tested against an in-memory store.
//!
//! Status and finalizer writes carry the object's last-observed
//! `resourceVersion`; a stale version fails with `StoreError::Conflict`
//! instead of overwriting a concurrent change.

use crate::error::StoreError;
use crds::{Port, PortClaim, PortClass, PortPool};
use k8s_openapi::api::core::v1::Pod;

/// Trait for hostport resource access
///
/// All async methods must be `Send` to work with Tokio's work-stealing runtime.
#[async_trait::async_trait]
pub trait ResourceStore: Send + Sync {
    // PortClass
    async fn get_class(&self, name: &str) -> Result<PortClass, StoreError>;
    async fn update_class_status(&self, class: &PortClass) -> Result<PortClass, StoreError>;
    async fn update_class_finalizers(&self, class: &PortClass) -> Result<PortClass, StoreError>;

    // PortPool
    async fn get_pool(&self, name: &str) -> Result<PortPool, StoreError>;
    async fn list_pools(&self) -> Result<Vec<PortPool>, StoreError>;
    async fn update_pool_status(&self, pool: &PortPool) -> Result<PortPool, StoreError>;
    async fn update_pool_finalizers(&self, pool: &PortPool) -> Result<PortPool, StoreError>;

    // PortClaim
    async fn get_claim(&self, namespace: &str, name: &str) -> Result<PortClaim, StoreError>;
    async fn update_claim_status(&self, claim: &PortClaim) -> Result<PortClaim, StoreError>;
    async fn update_claim_finalizers(&self, claim: &PortClaim) -> Result<PortClaim, StoreError>;

    // Port
    async fn get_port(&self, name: &str) -> Result<Port, StoreError>;
    async fn list_ports(&self) -> Result<Vec<Port>, StoreError>;
    async fn create_port(&self, port: &Port) -> Result<Port, StoreError>;
    async fn update_port_status(&self, port: &Port) -> Result<Port, StoreError>;
    async fn update_port_finalizers(&self, port: &Port) -> Result<Port, StoreError>;
    /// Delete a Port, preconditioned on its uid and resourceVersion
    async fn delete_port(&self, port: &Port) -> Result<(), StoreError>;

    // Workload pods
    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, StoreError>;

    // Field-indexed lookups

    /// Pools whose `spec.classRef` names `class`
    async fn list_pools_for_class(&self, class: &str) -> Result<Vec<PortPool>, StoreError> {
        Ok(self
            .list_pools()
            .await?
            .into_iter()
            .filter(|p| p.spec.class_ref == class)
            .collect())
    }

    /// Ports whose `spec.classRef` names `class`
    async fn list_ports_for_class(&self, class: &str) -> Result<Vec<Port>, StoreError> {
        Ok(self
            .list_ports()
            .await?
            .into_iter()
            .filter(|p| p.spec.class_ref == class)
            .collect())
    }

    /// Ports holding a non-zero port taken from `pool`
    async fn list_ports_for_pool(&self, pool: &str) -> Result<Vec<Port>, StoreError> {
        Ok(self
            .list_ports()
            .await?
            .into_iter()
            .filter(|p| p.pool_name() == Some(pool) && p.allocated_port() != 0)
            .collect())
    }

    /// Ports holding a non-zero port, across all classes
    async fn list_occupied_ports(&self) -> Result<Vec<Port>, StoreError> {
        Ok(self
            .list_ports()
            .await?
            .into_iter()
            .filter(|p| p.allocated_port() != 0)
            .collect())
    }
}
