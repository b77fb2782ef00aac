//! Cross-resource references

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Identity of the PortClaim a Port is bound to.
///
/// The `uid` pins the reference to one incarnation of the claim: a claim that
/// is deleted and recreated under the same name does not inherit the Port.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub struct ClaimReference {
    /// Namespace of the claim
    pub namespace: String,

    /// Name of the claim
    pub name: String,

    /// UID of the claim at the time the Port was created
    pub uid: String,
}

impl ClaimReference {
    /// Create a new claim reference
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, uid: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            uid: uid.into(),
        }
    }
}
