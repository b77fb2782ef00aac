//! PortClaim CRD
//!
//! Namespaced request for one port from a class. The claim reconciler backs
//! every claim with exactly one Port whose name is derived from the claim UID.

use kube::{CustomResource, ResourceExt};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "hostport.microscaler.io",
    version = "v1alpha1",
    kind = "PortClaim",
    namespaced,
    status = "PortClaimStatus",
    shortname = "hpc",
    printcolumn = r#"{"name":"Class","type":"string","jsonPath":".spec.classRef"}"#,
    printcolumn = r#"{"name":"Port","type":"string","jsonPath":".status.boundPortName"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PortClaimSpec {
    /// Name of the PortClass to allocate from
    pub class_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortClaimStatus {
    /// Lifecycle phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PortClaimPhase>,

    /// Name of the backing Port, set together with the `Bound` phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bound_port_name: Option<String>,
}

/// PortClaim lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PortClaimPhase {
    /// Backing Port not created yet
    Pending,
    /// Backing Port exists
    Bound,
    /// Deletion requested, waiting for pods to drop their annotations
    Deleting,
}

/// Deterministic Port name for a claim UID
pub fn port_name_for_claim(uid: &str) -> String {
    format!("claim-{uid}")
}

impl PortClaim {
    /// Current phase, if one has been recorded
    pub fn phase(&self) -> Option<PortClaimPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Name of the Port backing this claim.
    ///
    /// Prefers the name recorded in status and falls back to the name derived
    /// from the UID. `None` only for objects that have not been persisted yet.
    pub fn backing_port_name(&self) -> Option<String> {
        self.status
            .as_ref()
            .and_then(|s| s.bound_port_name.clone())
            .or_else(|| self.uid().map(|uid| port_name_for_claim(&uid)))
    }
}
