//! Protection token injection
//!
//! Every hostport object gets its kind's token when it is created, so the
//! owning reconciler decides when the API server may purge it.

use axum::Json;
use crds::Protected;
use kube::ResourceExt;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use super::{AdmissionResult, WebhookError, into_request, with_diff};

/// Mutating handler shared by the four hostport kinds
pub async fn mutate_handler<K>(Json(review): Json<AdmissionReview<K>>) -> AdmissionResult
where
    K: Protected + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let request = match into_request(review) {
        Ok(request) => request,
        Err(response) => return Ok(Json(response.into_review())),
    };
    Ok(Json(attach_protection(&request)?.into_review()))
}

/// Patch the token onto objects being created
pub fn attach_protection<K>(request: &AdmissionRequest<K>) -> Result<AdmissionResponse, WebhookError>
where
    K: Protected + Clone + Serialize,
{
    let response = AdmissionResponse::from(request);
    if !matches!(request.operation, Operation::Create) {
        return Ok(response);
    }
    let Some(object) = request.object.as_ref() else {
        return Ok(response);
    };
    if object.is_being_deleted() {
        return Ok(response);
    }

    let mut protected = object.clone();
    if !K::TOKEN.attach(protected.meta_mut()) {
        return Ok(response);
    }
    debug!(name = %object.name_any(), token = %K::TOKEN, "Attaching protection token");
    with_diff(response, object, &protected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use crate::webhook::testing::{admission_request, patch_ops};
    use crds::{PortClaim, PortClass, ProtectionToken};

    #[test]
    fn test_create_attaches_token() {
        let class = serde_json::to_value(create_test_class("default")).unwrap();
        let request = admission_request::<PortClass>("CREATE", Some(class), None);

        let response = attach_protection(&request).unwrap();
        assert!(response.allowed);
        let ops = patch_ops(&response);
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["op"], "add");
        assert_eq!(ops[0]["path"], "/metadata/finalizers");
        assert_eq!(ops[0]["value"][0], ProtectionToken::Class.as_str());
    }

    #[test]
    fn test_existing_finalizers_are_kept() {
        let mut claim = create_test_claim("team-a", "web", "default");
        claim.metadata.finalizers = Some(vec!["example.com/other".to_string()]);
        let request = admission_request::<PortClaim>("CREATE", Some(serde_json::to_value(claim).unwrap()), None);

        let ops = patch_ops(&attach_protection(&request).unwrap());
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0]["path"], "/metadata/finalizers/1");
        assert_eq!(ops[0]["value"], ProtectionToken::Claim.as_str());
    }

    #[test]
    fn test_already_protected_and_updates_unpatched() {
        let class = serde_json::to_value(protected(create_test_class("default"))).unwrap();
        let request = admission_request::<PortClass>("CREATE", Some(class), None);
        assert!(patch_ops(&attach_protection(&request).unwrap()).is_empty());

        // Token removal by the reconciler must not be undone
        let class = serde_json::to_value(create_test_class("default")).unwrap();
        let request = admission_request::<PortClass>("UPDATE", Some(class.clone()), Some(class));
        let response = attach_protection(&request).unwrap();
        assert!(response.allowed);
        assert!(patch_ops(&response).is_empty());
    }
}
