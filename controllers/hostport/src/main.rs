//! Hostport Controller
//!
//! Hands out cluster-unique host ports to workloads:
//! - PortClass: groups pools under a name claims can ask for
//! - PortPool: a range of port numbers belonging to one class
//! - PortClaim: a namespaced request for one port of a class
//! - Port: the cluster-scoped allocation backing a claim
//!
//! Pods consume ports through claim annotations resolved by the pod webhook.

mod allocation;
mod allocator;
mod backoff;
mod config;
mod controller;
mod error;
mod finalizer;
mod mappers;
mod overlap;
mod reconciler;
mod watcher;
mod webhook;

#[cfg(test)]
mod test_utils;

use crate::config::Config;
use crate::controller::Controller;
use crate::error::ControllerError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ControllerError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        warn!("A rustls crypto provider was already installed");
    }

    info!("Starting hostport controller");

    let config = Config::from_env()?;
    info!("Configuration:");
    info!("  Claim annotation prefix: {}", config.annotations.claim);
    info!("  Port annotation prefix: {}", config.annotations.port);
    if config.webhook_enabled {
        info!("  Webhook address: {}", config.webhook_addr);
    }
    info!("  Concurrency per kind: {}", config.concurrency);

    let controller = Controller::new(config).await?;
    controller.run().await?;

    Ok(())
}
