//! PortPool reconciler
//!
//! The overlap check runs once. Its verdict is cached in the `Overlap`
//! condition and never re-evaluated: a pool that is `Ready` stays `Ready` even
//! if an overlapping pool slips in later, and a pool found to overlap stays
//! `Pending` until an operator deletes or fixes it. Admission rejects most
//! overlapping pools before they get here.

use super::{Reconciler, found};
use crate::error::ControllerError;
use crate::finalizer::{DeletionStep, plan_deletion};
use crate::overlap::find_overlap;
use crds::{
    Condition, ConditionStatus, OVERLAP_CONDITION, OVERLAP_REASON_NO_OVERLAP, OVERLAP_REASON_NOT_CHECKED,
    OVERLAP_REASON_OVERLAP, PortPool, PortPoolPhase, Protected, set_condition,
};
use kube::ResourceExt;
use tracing::{debug, info, warn};

impl Reconciler {
    pub async fn reconcile_port_pool(&self, name: &str) -> Result<(), ControllerError> {
        let Some(pool) = found(self.store.get_pool(name).await)? else {
            debug!("PortPool {} is gone", name);
            return Ok(());
        };

        if pool.is_being_deleted() {
            return self.finalize_port_pool(pool).await;
        }

        match pool.phase() {
            None => {
                let mut pool = pool;
                set_pool_phase(&mut pool, PortPoolPhase::Pending);
                self.store.update_pool_status(&pool).await?;
                info!("PortPool {} is Pending", name);
                Ok(())
            }
            Some(PortPoolPhase::Pending) => self.check_pool_overlap(pool).await,
            Some(PortPoolPhase::Ready) | Some(PortPoolPhase::Deleting) => {
                debug!("PortPool {} is up to date", name);
                Ok(())
            }
        }
    }

    async fn check_pool_overlap(&self, mut pool: PortPool) -> Result<(), ControllerError> {
        let name = pool.name_any();

        match pool.overlap_condition().map(|c| c.status) {
            None => {
                set_overlap(
                    &mut pool,
                    ConditionStatus::Unknown,
                    OVERLAP_REASON_NOT_CHECKED,
                    "overlap check has not run yet".to_string(),
                );
                self.store.update_pool_status(&pool).await?;
                debug!("PortPool {} queued for overlap check", name);
            }
            Some(ConditionStatus::False) => {
                debug!("PortPool {} overlaps another pool, waiting for an operator", name);
            }
            Some(ConditionStatus::Unknown) => {
                let pools = self.store.list_pools().await?;
                match find_overlap(&pool, &pools) {
                    Some(other) => {
                        let message = format!(
                            "range {}-{} overlaps pool {} ({}-{})",
                            pool.spec.start,
                            pool.spec.end,
                            other.name_any(),
                            other.spec.start,
                            other.spec.end
                        );
                        warn!("PortPool {}: {}", name, message);
                        set_overlap(&mut pool, ConditionStatus::False, OVERLAP_REASON_OVERLAP, message);
                        self.store.update_pool_status(&pool).await?;
                    }
                    None => {
                        set_overlap(
                            &mut pool,
                            ConditionStatus::True,
                            OVERLAP_REASON_NO_OVERLAP,
                            "range does not overlap any other pool".to_string(),
                        );
                        set_pool_phase(&mut pool, PortPoolPhase::Ready);
                        self.store.update_pool_status(&pool).await?;
                        info!("PortPool {} is Ready ({}-{})", name, pool.spec.start, pool.spec.end);
                    }
                }
            }
            Some(ConditionStatus::True) => {
                set_pool_phase(&mut pool, PortPoolPhase::Ready);
                self.store.update_pool_status(&pool).await?;
                info!("PortPool {} is Ready", name);
            }
        }
        Ok(())
    }

    async fn finalize_port_pool(&self, mut pool: PortPool) -> Result<(), ControllerError> {
        let name = pool.name_any();

        match plan_deletion(pool.phase() == Some(PortPoolPhase::Deleting), pool.is_protected()) {
            DeletionStep::MarkDeleting => {
                set_pool_phase(&mut pool, PortPoolPhase::Deleting);
                self.store.update_pool_status(&pool).await?;
                info!("PortPool {} is Deleting", name);
            }
            DeletionStep::Converged => {
                debug!("PortPool {} released, waiting for removal", name);
            }
            DeletionStep::CheckDependents => {
                let ports = self.store.list_ports_for_pool(&name).await?;
                if !ports.is_empty() {
                    info!("PortPool {} deletion blocked by {} allocated port(s)", name, ports.len());
                    return Ok(());
                }

                PortPool::TOKEN.release(&mut pool.metadata);
                self.store.update_pool_finalizers(&pool).await?;
                info!("PortPool {} released its protection token", name);
            }
        }
        Ok(())
    }
}

fn set_pool_phase(pool: &mut PortPool, phase: PortPoolPhase) {
    pool.status.get_or_insert_with(Default::default).phase = Some(phase);
}

fn set_overlap(pool: &mut PortPool, status: ConditionStatus, reason: &str, message: String) {
    let conditions = &mut pool.status.get_or_insert_with(Default::default).conditions;
    set_condition(conditions, Condition::new(OVERLAP_CONDITION, status, reason, message));
}
