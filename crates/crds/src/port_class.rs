//! PortClass CRD
//!
//! Named allocation policy. Pools join a class by naming it in `spec.classRef`.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[kube(
    group = "hostport.microscaler.io",
    version = "v1alpha1",
    kind = "PortClass",
    status = "PortClassStatus",
    shortname = "hpcl",
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PortClassSpec {}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortClassStatus {
    /// Lifecycle phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PortClassPhase>,
}

/// PortClass lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PortClassPhase {
    /// Created, not yet ready
    Pending,
    /// Pools may reference this class
    Ready,
    /// Deletion requested, waiting for pools and ports to go away
    Deleting,
}

impl PortClass {
    /// Current phase, if one has been recorded
    pub fn phase(&self) -> Option<PortClassPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }
}
