//! PortClass reconciler

use super::{Reconciler, found};
use crate::error::ControllerError;
use crate::finalizer::{DeletionStep, plan_deletion};
use crds::{PortClass, PortClassPhase, PortClassStatus, Protected};
use tracing::{debug, info};

impl Reconciler {
    pub async fn reconcile_port_class(&self, name: &str) -> Result<(), ControllerError> {
        let Some(class) = found(self.store.get_class(name).await)? else {
            debug!("PortClass {} is gone", name);
            return Ok(());
        };

        if class.is_being_deleted() {
            return self.finalize_port_class(class).await;
        }

        match class.phase() {
            None => self.set_class_phase(class, PortClassPhase::Pending).await,
            Some(PortClassPhase::Pending) => self.set_class_phase(class, PortClassPhase::Ready).await,
            Some(PortClassPhase::Ready) | Some(PortClassPhase::Deleting) => {
                debug!("PortClass {} is up to date", name);
                Ok(())
            }
        }
    }

    async fn set_class_phase(&self, mut class: PortClass, phase: PortClassPhase) -> Result<(), ControllerError> {
        info!("PortClass {}: {:?} -> {:?}", class.metadata.name.as_deref().unwrap_or_default(), class.phase(), phase);
        class.status = Some(PortClassStatus { phase: Some(phase) });
        self.store.update_class_status(&class).await?;
        Ok(())
    }

    async fn finalize_port_class(&self, mut class: PortClass) -> Result<(), ControllerError> {
        let name = class.metadata.name.clone().unwrap_or_default();

        match plan_deletion(class.phase() == Some(PortClassPhase::Deleting), class.is_protected()) {
            DeletionStep::MarkDeleting => self.set_class_phase(class, PortClassPhase::Deleting).await,
            DeletionStep::Converged => {
                debug!("PortClass {} released, waiting for removal", name);
                Ok(())
            }
            DeletionStep::CheckDependents => {
                let pools = self.store.list_pools_for_class(&name).await?;
                let ports = self.store.list_ports_for_class(&name).await?;
                if !pools.is_empty() || !ports.is_empty() {
                    info!(
                        "PortClass {} deletion blocked by {} pool(s) and {} port(s)",
                        name,
                        pools.len(),
                        ports.len()
                    );
                    return Ok(());
                }

                PortClass::TOKEN.release(&mut class.metadata);
                self.store.update_class_finalizers(&class).await?;
                info!("PortClass {} released its protection token", name);
                Ok(())
            }
        }
    }
}
