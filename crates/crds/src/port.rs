//! Port CRD
//!
//! Record of one allocated host port. Created by the claim reconciler,
//! allocated by the port reconciler. Once `status.port` is non-zero it never
//! changes for the lifetime of the object.

use crate::references::ClaimReference;
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "hostport.microscaler.io",
    version = "v1alpha1",
    kind = "Port",
    status = "PortStatus",
    shortname = "hp",
    printcolumn = r#"{"name":"Class","type":"string","jsonPath":".spec.classRef"}"#,
    printcolumn = r#"{"name":"Port","type":"integer","jsonPath":".status.port"}"#,
    printcolumn = r#"{"name":"Pool","type":"string","jsonPath":".status.poolName"}"#,
    printcolumn = r#"{"name":"Claim","type":"string","jsonPath":".spec.claimRef.name"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PortSpec {
    /// Claim this port is bound to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claim_ref: Option<ClaimReference>,

    /// Name of the PortClass to allocate from
    pub class_ref: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortStatus {
    /// Lifecycle phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PortPhase>,

    /// Allocated port, 0 while unset
    #[serde(default)]
    pub port: u16,

    /// Pool the port was taken from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool_name: Option<String>,
}

/// Port lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PortPhase {
    /// Waiting for allocation
    Pending,
    /// `status.port` holds the allocated number
    Allocated,
    /// Deletion requested, waiting for the claim to go away
    Deleting,
}

impl Port {
    /// Current phase, if one has been recorded
    pub fn phase(&self) -> Option<PortPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Allocated port number, 0 when unset
    pub fn allocated_port(&self) -> u16 {
        self.status.as_ref().map_or(0, |s| s.port)
    }

    /// Pool that supplied the port, if allocated
    pub fn pool_name(&self) -> Option<&str> {
        self.status.as_ref().and_then(|s| s.pool_name.as_deref())
    }
}
