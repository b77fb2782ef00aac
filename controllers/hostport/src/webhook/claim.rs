//! PortClaim validation

use axum::Json;
use crds::PortClaim;
use kube::core::admission::{AdmissionResponse, AdmissionReview, Operation};

use super::validation::{FieldError, respond};
use super::{AdmissionResult, into_request};

pub async fn validate_handler(Json(review): Json<AdmissionReview<PortClaim>>) -> AdmissionResult {
    let request = match into_request(review) {
        Ok(request) => request,
        Err(response) => return Ok(Json(response.into_review())),
    };
    let response = AdmissionResponse::from(&request);

    let errors = match (&request.operation, &request.object, &request.old_object) {
        (Operation::Update, Some(new), Some(old)) => validate_claim_update(new, old),
        _ => Vec::new(),
    };
    Ok(Json(respond(response, &errors).into_review()))
}

/// Fields frozen after creation, or once set
pub fn validate_claim_update(new: &PortClaim, old: &PortClaim) -> Vec<FieldError> {
    let mut errors = Vec::new();

    if new.spec.class_ref != old.spec.class_ref {
        errors.push(FieldError::forbidden("spec.classRef", "cannot change classRef"));
    }

    let bound = |claim: &PortClaim| claim.status.as_ref().and_then(|s| s.bound_port_name.clone());
    if bound(old).is_some_and(|old_name| bound(new).as_ref() != Some(&old_name)) {
        errors.push(FieldError::forbidden(
            "status.boundPortName",
            "cannot change boundPortName once set",
        ));
    }
    errors
}
