//! Kubernetes resource watchers.
//!
//! One `kube_runtime::Controller` per kind. Each controller also watches the
//! kinds that can unblock or invalidate its objects, mapped back through the
//! functions in [`crate::mappers`]:
//!
//! - PortClass: its pools and ports (deletion waits on them)
//! - PortPool: ports allocated from it
//! - PortClaim: its backing Port and the pods that reference it
//! - Port: its claim
//!
//! All of them share one retry policy: conflicts requeue after a short fixed
//! delay, anything else backs off per object.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use crds::{Port, PortClaim, PortClass, PortPool};
use futures::StreamExt;
use futures::future::BoxFuture;
use k8s_openapi::api::core::v1::Pod;
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::controller::{Action, Config as ControllerConfig};
use kube_runtime::{Controller, watcher};
use serde::de::DeserializeOwned;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::error::ControllerError;
use crate::mappers;
use crate::reconciler::{Reconciler, resource_key};

/// Drive `controller` until its watch streams end.
///
/// `reconcile_fn` runs one reconcile pass for an object. Success resets the
/// object's backoff and waits for the next change.
async fn run_controller<K, F>(
    controller: Controller<K>,
    reconciler: Arc<Reconciler>,
    kind: &'static str,
    reconcile_fn: F,
) -> Result<(), ControllerError>
where
    K: Resource + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
    K::DynamicType: Eq + Hash + Clone + Debug + Unpin,
    F: Fn(Arc<Reconciler>, Arc<K>) -> BoxFuture<'static, Result<(), ControllerError>> + Send + Sync + Clone + 'static,
{
    info!("Starting {} watcher", kind);

    let reconcile = move |obj: Arc<K>, ctx: Arc<Reconciler>| {
        let reconcile_fn = reconcile_fn.clone();
        async move {
            let key = resource_key(kind, obj.namespace().as_deref(), &obj.name_any());
            debug!("Reconciling {}", key);
            reconcile_fn(ctx.clone(), obj).await?;
            ctx.reset_backoff(&key);
            Ok::<_, ControllerError>(Action::await_change())
        }
    };

    let error_policy = move |obj: Arc<K>, error: &ControllerError, ctx: Arc<Reconciler>| {
        let key = resource_key(kind, obj.namespace().as_deref(), &obj.name_any());
        if error.is_conflict() {
            warn!("Conflict while reconciling {}, retrying: {}", key, error);
            return Action::requeue(ctx.conflict_requeue());
        }
        let (delay, errors) = ctx.backoff_for(&key);
        error!(
            "Reconciliation failed for {} ({} consecutive errors), retrying in {:?}: {}",
            key, errors, delay, error
        );
        Action::requeue(delay)
    };

    controller
        .run(reconcile, error_policy, reconciler)
        .for_each(|res| async move {
            match res {
                Ok((obj, _)) => debug!("Reconciled {} {}", kind, obj.name),
                Err(e) => warn!("{} controller error: {}", kind, e),
            }
        })
        .await;

    Err(ControllerError::Watch(format!("{kind} watch stream ended")))
}

/// Watches the hostport kinds and the pods that reference claims.
pub struct Watcher {
    reconciler: Arc<Reconciler>,
    class_api: Api<PortClass>,
    pool_api: Api<PortPool>,
    claim_api: Api<PortClaim>,
    port_api: Api<Port>,
    pod_api: Api<Pod>,
    claim_prefix: String,
    concurrency: u16,
}

impl Watcher {
    pub fn new(client: Client, reconciler: Arc<Reconciler>, config: &Config) -> Self {
        Self {
            reconciler,
            class_api: Api::all(client.clone()),
            pool_api: Api::all(client.clone()),
            claim_api: Api::all(client.clone()),
            port_api: Api::all(client.clone()),
            pod_api: Api::all(client),
            claim_prefix: config.annotations.claim.clone(),
            concurrency: config.concurrency,
        }
    }

    fn controller<K>(&self, api: &Api<K>) -> Controller<K>
    where
        K: Resource + Clone + Debug + DeserializeOwned + Send + Sync + 'static,
        K::DynamicType: Default + Eq + Hash + Clone + Debug + Unpin,
    {
        Controller::new(api.clone(), watcher::Config::default())
            .with_config(ControllerConfig::default().concurrency(self.concurrency))
    }

    pub async fn watch_port_classes(&self) -> Result<(), ControllerError> {
        let controller = self
            .controller(&self.class_api)
            .watches(self.pool_api.clone(), watcher::Config::default(), |pool| {
                mappers::pool_to_class(&pool)
            })
            .watches(self.port_api.clone(), watcher::Config::default(), |port| {
                mappers::port_to_class(&port)
            });

        run_controller(controller, self.reconciler.clone(), "PortClass", |reconciler, class| {
            Box::pin(async move { reconciler.reconcile_port_class(&class.name_any()).await })
        })
        .await
    }

    pub async fn watch_port_pools(&self) -> Result<(), ControllerError> {
        let controller = self
            .controller(&self.pool_api)
            .watches(self.port_api.clone(), watcher::Config::default(), |port| {
                mappers::port_to_pool(&port)
            });

        run_controller(controller, self.reconciler.clone(), "PortPool", |reconciler, pool| {
            Box::pin(async move { reconciler.reconcile_port_pool(&pool.name_any()).await })
        })
        .await
    }

    pub async fn watch_port_claims(&self) -> Result<(), ControllerError> {
        let prefix = self.claim_prefix.clone();
        let controller = self
            .controller(&self.claim_api)
            .watches(self.port_api.clone(), watcher::Config::default(), |port| {
                mappers::port_to_claim(&port)
            })
            .watches(self.pod_api.clone(), watcher::Config::default(), move |pod| {
                mappers::pod_to_claims(&pod, &prefix)
            });

        run_controller(controller, self.reconciler.clone(), "PortClaim", |reconciler, claim| {
            Box::pin(async move {
                let namespace = claim.namespace().unwrap_or_default();
                reconciler.reconcile_port_claim(&namespace, &claim.name_any()).await
            })
        })
        .await
    }

    pub async fn watch_ports(&self) -> Result<(), ControllerError> {
        let controller = self
            .controller(&self.port_api)
            .watches(self.claim_api.clone(), watcher::Config::default(), |claim| {
                mappers::claim_to_port(&claim)
            });

        run_controller(controller, self.reconciler.clone(), "Port", |reconciler, port| {
            Box::pin(async move { reconciler.reconcile_port(&port.name_any()).await })
        })
        .await
    }
}
