//! PortClaim reconciler
//!
//! A claim is backed by exactly one Port named `claim-<uid>`. Creating it is
//! idempotent: if the create went through but the status write after it did
//! not, the next pass finds the Port already there and only writes status.

use super::{Reconciler, found};
use crate::error::ControllerError;
use crate::finalizer::{DeletionStep, plan_deletion};
use crate::mappers::claim_annotations;
use crds::{
    ClaimReference, Port, PortClaim, PortClaimPhase, PortClaimStatus, PortSpec, Protected, port_name_for_claim,
};
use kube::ResourceExt;
use tracing::{debug, info, warn};

impl Reconciler {
    pub async fn reconcile_port_claim(&self, namespace: &str, name: &str) -> Result<(), ControllerError> {
        let Some(claim) = found(self.store.get_claim(namespace, name).await)? else {
            debug!("PortClaim {}/{} is gone", namespace, name);
            return Ok(());
        };

        if claim.is_being_deleted() {
            return self.finalize_port_claim(claim).await;
        }

        match claim.phase() {
            None => {
                let mut claim = claim;
                claim.status = Some(PortClaimStatus {
                    phase: Some(PortClaimPhase::Pending),
                    bound_port_name: None,
                });
                self.store.update_claim_status(&claim).await?;
                info!("PortClaim {}/{} is Pending", namespace, name);
                Ok(())
            }
            Some(PortClaimPhase::Pending) => self.bind_port_claim(claim).await,
            Some(PortClaimPhase::Bound) => self.heal_port_claim(&claim).await,
            Some(PortClaimPhase::Deleting) => {
                debug!("PortClaim {}/{} is up to date", namespace, name);
                Ok(())
            }
        }
    }

    /// Create (or find) the backing Port, then record it and move to `Bound`.
    async fn bind_port_claim(&self, mut claim: PortClaim) -> Result<(), ControllerError> {
        let port_name = self.ensure_backing_port(&claim).await?;

        claim.status = Some(PortClaimStatus {
            phase: Some(PortClaimPhase::Bound),
            bound_port_name: Some(port_name.clone()),
        });
        self.store.update_claim_status(&claim).await?;
        info!(
            "PortClaim {}/{} is Bound to Port {}",
            claim.namespace().unwrap_or_default(),
            claim.name_any(),
            port_name
        );
        Ok(())
    }

    /// A Bound claim whose Port vanished gets it back under the same name.
    async fn heal_port_claim(&self, claim: &PortClaim) -> Result<(), ControllerError> {
        let Some(port_name) = claim.backing_port_name() else {
            return Err(ControllerError::MissingField(claim.name_any(), "metadata.uid"));
        };
        if found(self.store.get_port(&port_name).await)?.is_some() {
            debug!("PortClaim {}/{} is up to date", claim.namespace().unwrap_or_default(), claim.name_any());
            return Ok(());
        }

        warn!(
            "Port {} backing PortClaim {}/{} is missing, recreating it",
            port_name,
            claim.namespace().unwrap_or_default(),
            claim.name_any()
        );
        self.ensure_backing_port(claim).await?;
        Ok(())
    }

    async fn ensure_backing_port(&self, claim: &PortClaim) -> Result<String, ControllerError> {
        let name = claim.name_any();
        let namespace = claim
            .namespace()
            .ok_or_else(|| ControllerError::MissingField(name.clone(), "metadata.namespace"))?;
        let uid = claim
            .uid()
            .ok_or_else(|| ControllerError::MissingField(name.clone(), "metadata.uid"))?;
        let port_name = port_name_for_claim(&uid);

        let mut port = Port::new(
            &port_name,
            PortSpec {
                claim_ref: Some(ClaimReference::new(&namespace, &name, &uid)),
                class_ref: claim.spec.class_ref.clone(),
            },
        );
        Port::TOKEN.attach(&mut port.metadata);

        match self.store.create_port(&port).await {
            Ok(_) => info!("Created Port {} for PortClaim {}/{}", port_name, namespace, name),
            Err(e) if e.is_already_exists() => {
                debug!("Port {} for PortClaim {}/{} already exists", port_name, namespace, name);
            }
            Err(e) => return Err(e.into()),
        }
        Ok(port_name)
    }

    async fn finalize_port_claim(&self, mut claim: PortClaim) -> Result<(), ControllerError> {
        let name = claim.name_any();
        let namespace = claim.namespace().unwrap_or_default();

        match plan_deletion(claim.phase() == Some(PortClaimPhase::Deleting), claim.is_protected()) {
            DeletionStep::MarkDeleting => {
                claim.status.get_or_insert_with(Default::default).phase = Some(PortClaimPhase::Deleting);
                self.store.update_claim_status(&claim).await?;
                info!("PortClaim {}/{} is Deleting", namespace, name);
            }
            DeletionStep::Converged => {
                debug!("PortClaim {}/{} released, waiting for removal", namespace, name);
            }
            DeletionStep::CheckDependents => {
                let pods = self.store.list_pods(&namespace).await?;
                let prefix = self.annotations.claim.as_str();
                let users: Vec<String> = pods
                    .iter()
                    .filter(|pod| claim_annotations(pod, prefix).any(|(_, claimed)| claimed == name))
                    .map(|pod| pod.name_any())
                    .collect();
                if !users.is_empty() {
                    info!(
                        "PortClaim {}/{} deletion blocked by pod(s) {}",
                        namespace,
                        name,
                        users.join(", ")
                    );
                    return Ok(());
                }

                PortClaim::TOKEN.release(&mut claim.metadata);
                self.store.update_claim_finalizers(&claim).await?;
                info!("PortClaim {}/{} released its protection token", namespace, name);
            }
        }
        Ok(())
    }
}
