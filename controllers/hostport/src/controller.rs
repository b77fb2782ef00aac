//! Main controller implementation.
//!
//! Wires the Kubernetes client into the resource store, starts one watcher per
//! kind and, when enabled, the admission webhook server. Exits as soon as any
//! of those tasks stops.

use std::sync::Arc;

use kube::Client;
use resource_store::{KubeStore, ResourceStore};
use tokio::task::JoinHandle;
use tracing::info;

use crate::config::Config;
use crate::error::ControllerError;
use crate::reconciler::Reconciler;
use crate::watcher::Watcher;
use crate::webhook::{self, WebhookState};

type Task = JoinHandle<Result<(), ControllerError>>;

/// Hostport controller process
pub struct Controller {
    class_watcher: Task,
    pool_watcher: Task,
    claim_watcher: Task,
    port_watcher: Task,
    webhook_server: Option<Task>,
}

impl Controller {
    pub async fn new(config: Config) -> Result<Self, ControllerError> {
        info!("Initializing hostport controller");

        let client = Client::try_default().await?;
        let store: Arc<dyn ResourceStore> = Arc::new(KubeStore::new(client.clone()));
        let reconciler = Arc::new(Reconciler::new(store.clone(), &config));
        let watcher = Arc::new(Watcher::new(client, reconciler, &config));

        let class_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch_port_classes().await })
        };
        let pool_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch_port_pools().await })
        };
        let claim_watcher = {
            let watcher = watcher.clone();
            tokio::spawn(async move { watcher.watch_port_claims().await })
        };
        let port_watcher = tokio::spawn(async move { watcher.watch_ports().await });

        let webhook_server = if config.webhook_enabled {
            let state = Arc::new(WebhookState {
                store,
                annotations: config.annotations.clone(),
            });
            Some(tokio::spawn(async move { webhook::serve(&config, state).await }))
        } else {
            info!("Admission webhooks disabled");
            None
        };

        Ok(Self {
            class_watcher,
            pool_watcher,
            claim_watcher,
            port_watcher,
            webhook_server,
        })
    }

    /// Runs until a watcher or the webhook server exits
    pub async fn run(mut self) -> Result<(), ControllerError> {
        info!("Hostport controller running");

        let mut webhook_task = self.webhook_server.take();
        let webhook_server = async {
            match webhook_task.as_mut() {
                Some(task) => task.await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            result = &mut self.class_watcher => joined("PortClass watcher", result),
            result = &mut self.pool_watcher => joined("PortPool watcher", result),
            result = &mut self.claim_watcher => joined("PortClaim watcher", result),
            result = &mut self.port_watcher => joined("Port watcher", result),
            result = webhook_server => joined("Webhook server", result),
        }
    }
}

fn joined(
    task: &str,
    result: Result<Result<(), ControllerError>, tokio::task::JoinError>,
) -> Result<(), ControllerError> {
    result.map_err(|e| ControllerError::Watch(format!("{task} panicked: {e}")))??;
    info!("{} exited", task);
    Ok(())
}
