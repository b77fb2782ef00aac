//! PortPool CRD
//!
//! An inclusive range of host ports that a class may allocate from.
//! A pool only becomes `Ready` once its `Overlap` condition confirms that the
//! range does not intersect any other pool.

use crate::condition::{Condition, find_condition};
use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition type recording the result of the overlap check
pub const OVERLAP_CONDITION: &str = "Overlap";
/// Reason while the overlap check has not run
pub const OVERLAP_REASON_NOT_CHECKED: &str = "NotChecked";
/// Reason when the range is disjoint from every other pool
pub const OVERLAP_REASON_NO_OVERLAP: &str = "NoOverlap";
/// Reason when the range intersects another pool
pub const OVERLAP_REASON_OVERLAP: &str = "Overlap";

#[derive(CustomResource, Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[kube(
    group = "hostport.microscaler.io",
    version = "v1alpha1",
    kind = "PortPool",
    status = "PortPoolStatus",
    shortname = "hpp",
    printcolumn = r#"{"name":"Class","type":"string","jsonPath":".spec.classRef"}"#,
    printcolumn = r#"{"name":"Start","type":"integer","jsonPath":".spec.start"}"#,
    printcolumn = r#"{"name":"End","type":"integer","jsonPath":".spec.end"}"#,
    printcolumn = r#"{"name":"Enabled","type":"boolean","jsonPath":".spec.enabled"}"#,
    printcolumn = r#"{"name":"Phase","type":"string","jsonPath":".status.phase"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct PortPoolSpec {
    /// Name of the owning PortClass
    pub class_ref: String,

    /// First port of the range (inclusive)
    #[schemars(range(min = 1, max = 65535))]
    pub start: u16,

    /// Last port of the range (inclusive)
    #[schemars(range(min = 1, max = 65535))]
    pub end: u16,

    /// Disabled pools stay Ready but are skipped by the allocator
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortPoolStatus {
    /// Lifecycle phase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<PortPoolPhase>,

    /// Status conditions (currently only `Overlap`)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<Condition>,
}

/// PortPool lifecycle phase
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub enum PortPoolPhase {
    /// Waiting for the overlap check
    Pending,
    /// Eligible for allocation (when enabled)
    Ready,
    /// Deletion requested, waiting for allocated ports to go away
    Deleting,
}

impl PortPool {
    /// Current phase, if one has been recorded
    pub fn phase(&self) -> Option<PortPoolPhase> {
        self.status.as_ref().and_then(|s| s.phase)
    }

    /// Status conditions, empty when no status has been written
    pub fn conditions(&self) -> &[Condition] {
        self.status.as_ref().map_or(&[], |s| s.conditions.as_slice())
    }

    /// The `Overlap` condition, if present
    pub fn overlap_condition(&self) -> Option<&Condition> {
        find_condition(self.conditions(), OVERLAP_CONDITION)
    }
}
