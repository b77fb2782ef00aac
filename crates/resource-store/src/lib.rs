//! Resource Store Client
//!
//! Typed get/list/create/update/delete access to the four hostport resource
//! kinds and to workload pods, behind a trait so the controller can be tested
//! without a cluster.
//!
//! # Example
//!
//! ```no_run
//! use resource_store::{KubeStore, ResourceStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = kube::Client::try_default().await?;
//! let store = KubeStore::new(client);
//!
//! // Pools that belong to the "default" class
//! let pools = store.list_pools_for_class("default").await?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod error;
#[path = "trait.rs"]
pub mod store_trait;
#[cfg(any(test, feature = "test-util"))]
pub mod mock;

pub use client::KubeStore;
pub use error::StoreError;
pub use store_trait::ResourceStore;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockResourceStore;
