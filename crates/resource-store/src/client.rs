//! Kubernetes-backed ResourceStore

use crate::error::StoreError;
use crate::store_trait::ResourceStore;
use crds::{Port, PortClaim, PortClass, PortPool};
use k8s_openapi::api::core::v1::Pod;
use kube::api::{DeleteParams, ListParams, Patch, PatchParams, PostParams, Preconditions};
use kube::{Api, Client, Resource, ResourceExt};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use tracing::debug;

/// ResourceStore talking to the Kubernetes API server
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    /// Create a new store from an existing client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn claims(&self, namespace: &str) -> Api<PortClaim> {
        Api::namespaced(self.client.clone(), namespace)
    }
}

fn object_name<K: Resource>(obj: &K, kind: &str) -> Result<String, StoreError> {
    obj.meta()
        .name
        .clone()
        .ok_or_else(|| StoreError::InvalidObject(format!("{kind} without metadata.name")))
}

fn resource_version<K: Resource>(obj: &K, name: &str) -> Result<String, StoreError> {
    obj.resource_version().ok_or_else(|| {
        StoreError::InvalidObject(format!("{name} has no resourceVersion; re-read before writing"))
    })
}

async fn get<K>(api: &Api<K>, kind: &'static str, name: &str) -> Result<K, StoreError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.get(name)
        .await
        .map_err(|e| StoreError::from_kube(e, kind, name))
}

async fn list<K>(api: &Api<K>, kind: &'static str) -> Result<Vec<K>, StoreError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    api.list(&ListParams::default())
        .await
        .map(|list| list.items)
        .map_err(|e| StoreError::from_kube(e, kind, "*"))
}

/// Merge-patch the status subresource. The resourceVersion in the body makes
/// the API server reject the write if the object changed since it was read.
async fn patch_status<K, S>(
    api: &Api<K>,
    kind: &'static str,
    obj: &K,
    status: &S,
) -> Result<K, StoreError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
    S: Serialize,
{
    let name = object_name(obj, kind)?;
    let body = serde_json::json!({
        "metadata": { "resourceVersion": resource_version(obj, &name)? },
        "status": status,
    });
    debug!("Patching {} {} status", kind, name);
    api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&body))
        .await
        .map_err(|e| StoreError::from_kube(e, kind, &name))
}

async fn patch_finalizers<K>(api: &Api<K>, kind: &'static str, obj: &K) -> Result<K, StoreError>
where
    K: Resource + Clone + DeserializeOwned + Debug,
{
    let name = object_name(obj, kind)?;
    let body = serde_json::json!({
        "metadata": {
            "resourceVersion": resource_version(obj, &name)?,
            "finalizers": obj.finalizers(),
        },
    });
    debug!("Patching {} {} finalizers", kind, name);
    api.patch(&name, &PatchParams::default(), &Patch::Merge(&body))
        .await
        .map_err(|e| StoreError::from_kube(e, kind, &name))
}

#[async_trait::async_trait]
impl ResourceStore for KubeStore {
    async fn get_class(&self, name: &str) -> Result<PortClass, StoreError> {
        get(&Api::all(self.client.clone()), "PortClass", name).await
    }

    async fn update_class_status(&self, class: &PortClass) -> Result<PortClass, StoreError> {
        patch_status(&Api::all(self.client.clone()), "PortClass", class, &class.status).await
    }

    async fn update_class_finalizers(&self, class: &PortClass) -> Result<PortClass, StoreError> {
        patch_finalizers(&Api::all(self.client.clone()), "PortClass", class).await
    }

    async fn get_pool(&self, name: &str) -> Result<PortPool, StoreError> {
        get(&Api::all(self.client.clone()), "PortPool", name).await
    }

    async fn list_pools(&self) -> Result<Vec<PortPool>, StoreError> {
        list(&Api::all(self.client.clone()), "PortPool").await
    }

    async fn update_pool_status(&self, pool: &PortPool) -> Result<PortPool, StoreError> {
        patch_status(&Api::all(self.client.clone()), "PortPool", pool, &pool.status).await
    }

    async fn update_pool_finalizers(&self, pool: &PortPool) -> Result<PortPool, StoreError> {
        patch_finalizers(&Api::all(self.client.clone()), "PortPool", pool).await
    }

    async fn get_claim(&self, namespace: &str, name: &str) -> Result<PortClaim, StoreError> {
        get(&self.claims(namespace), "PortClaim", name).await
    }

    async fn update_claim_status(&self, claim: &PortClaim) -> Result<PortClaim, StoreError> {
        let namespace = claim.namespace().unwrap_or_default();
        patch_status(&self.claims(&namespace), "PortClaim", claim, &claim.status).await
    }

    async fn update_claim_finalizers(&self, claim: &PortClaim) -> Result<PortClaim, StoreError> {
        let namespace = claim.namespace().unwrap_or_default();
        patch_finalizers(&self.claims(&namespace), "PortClaim", claim).await
    }

    async fn get_port(&self, name: &str) -> Result<Port, StoreError> {
        get(&Api::all(self.client.clone()), "Port", name).await
    }

    async fn list_ports(&self) -> Result<Vec<Port>, StoreError> {
        list(&Api::all(self.client.clone()), "Port").await
    }

    async fn create_port(&self, port: &Port) -> Result<Port, StoreError> {
        let name = object_name(port, "Port")?;
        let api: Api<Port> = Api::all(self.client.clone());
        api.create(&PostParams::default(), port)
            .await
            .map_err(|e| StoreError::from_kube(e, "Port", &name))
    }

    async fn update_port_status(&self, port: &Port) -> Result<Port, StoreError> {
        patch_status(&Api::all(self.client.clone()), "Port", port, &port.status).await
    }

    async fn update_port_finalizers(&self, port: &Port) -> Result<Port, StoreError> {
        patch_finalizers(&Api::all(self.client.clone()), "Port", port).await
    }

    async fn delete_port(&self, port: &Port) -> Result<(), StoreError> {
        let name = object_name(port, "Port")?;
        let api: Api<Port> = Api::all(self.client.clone());
        let params = DeleteParams {
            preconditions: Some(Preconditions {
                uid: port.uid(),
                resource_version: port.resource_version(),
            }),
            ..DeleteParams::default()
        };
        api.delete(&name, &params)
            .await
            .map(|_| ())
            .map_err(|e| StoreError::from_kube(e, "Port", &name))
    }

    async fn list_pods(&self, namespace: &str) -> Result<Vec<Pod>, StoreError> {
        list(&Api::namespaced(self.client.clone(), namespace), "Pod").await
    }
}
