//! Port reconciler
//!
//! Allocation runs inside an allocation transaction that spans the occupancy
//! listing and the status write. Releasing the lock before the write lands
//! would let a second Port pick the same number from the same snapshot.

use super::{Reconciler, found};
use crate::allocator::{allocate, eligible_pools};
use crate::error::ControllerError;
use crate::finalizer::{DeletionStep, plan_deletion};
use crds::{Port, PortPhase, PortStatus, Protected};
use kube::ResourceExt;
use std::collections::BTreeSet;
use tracing::{debug, info};

impl Reconciler {
    pub async fn reconcile_port(&self, name: &str) -> Result<(), ControllerError> {
        let Some(port) = found(self.store.get_port(name).await)? else {
            debug!("Port {} is gone", name);
            return Ok(());
        };

        if port.is_being_deleted() {
            return self.finalize_port(port).await;
        }

        match port.phase() {
            None => {
                let mut port = port;
                port.status = Some(PortStatus {
                    phase: Some(PortPhase::Pending),
                    ..Default::default()
                });
                self.store.update_port_status(&port).await?;
                info!("Port {} is Pending", name);
                Ok(())
            }
            Some(PortPhase::Pending) => self.allocate_port(port).await,
            Some(PortPhase::Allocated) => self.reclaim_orphaned_port(&port).await,
            Some(PortPhase::Deleting) => {
                debug!("Port {} is up to date", name);
                Ok(())
            }
        }
    }

    async fn allocate_port(&self, mut port: Port) -> Result<(), ControllerError> {
        let name = port.name_any();
        let class = port.spec.class_ref.clone();

        // A missing class fails the pass; the error policy retries with backoff.
        self.store.get_class(&class).await?;

        let _txn = self.allocation_lock.begin(&name).await;

        let pools = self.store.list_pools().await?;
        let eligible = eligible_pools(&pools, &class);
        let occupied: BTreeSet<u16> = self
            .store
            .list_occupied_ports()
            .await?
            .iter()
            .filter(|p| p.name_any() != name)
            .map(Port::allocated_port)
            .collect();

        let allocation = allocate(&class, &eligible, &occupied)?;

        port.status = Some(PortStatus {
            phase: Some(PortPhase::Allocated),
            port: allocation.port,
            pool_name: Some(allocation.pool.clone()),
        });
        self.store.update_port_status(&port).await?;
        info!(
            "Port {} allocated {} from pool {} (class {})",
            name, allocation.port, allocation.pool, class
        );
        Ok(())
    }

    /// Ports are single-owner: once the claim they were made for is gone, or
    /// replaced by a new claim under the same name, the Port deletes itself.
    async fn reclaim_orphaned_port(&self, port: &Port) -> Result<(), ControllerError> {
        let name = port.name_any();
        let Some(claim_ref) = &port.spec.claim_ref else {
            debug!("Port {} has no claim, nothing to reclaim", name);
            return Ok(());
        };

        if self.claim_is_live(port).await? {
            debug!("Port {} is up to date", name);
            return Ok(());
        }

        info!(
            "Port {} lost PortClaim {}/{} ({}), deleting it",
            name, claim_ref.namespace, claim_ref.name, claim_ref.uid
        );
        self.store.delete_port(port).await?;
        Ok(())
    }

    /// Whether the claim the Port references still exists with the same uid
    async fn claim_is_live(&self, port: &Port) -> Result<bool, ControllerError> {
        let Some(claim_ref) = &port.spec.claim_ref else {
            return Ok(false);
        };
        let claim = found(self.store.get_claim(&claim_ref.namespace, &claim_ref.name).await)?;
        Ok(claim.is_some_and(|c| c.uid().as_deref() == Some(claim_ref.uid.as_str())))
    }

    async fn finalize_port(&self, mut port: Port) -> Result<(), ControllerError> {
        let name = port.name_any();

        match plan_deletion(port.phase() == Some(PortPhase::Deleting), port.is_protected()) {
            DeletionStep::MarkDeleting => {
                port.status.get_or_insert_with(Default::default).phase = Some(PortPhase::Deleting);
                self.store.update_port_status(&port).await?;
                info!("Port {} is Deleting", name);
            }
            DeletionStep::Converged => {
                debug!("Port {} released, waiting for removal", name);
            }
            DeletionStep::CheckDependents => {
                if self.claim_is_live(&port).await? {
                    info!("Port {} deletion blocked by its PortClaim", name);
                    return Ok(());
                }

                Port::TOKEN.release(&mut port.metadata);
                self.store.update_port_finalizers(&port).await?;
                info!("Port {} released its protection token", name);
            }
        }
        Ok(())
    }
}
