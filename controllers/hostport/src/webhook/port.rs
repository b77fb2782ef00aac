//! Port validation
//!
//! A Port's identity and its allocated number never change once set. The
//! number may only appear together with the `Allocated` phase.

use axum::Json;
use crds::{Port, PortPhase};
use kube::core::admission::{AdmissionResponse, AdmissionReview, Operation};

use super::validation::{FieldError, respond};
use super::{AdmissionResult, into_request};

pub async fn validate_handler(Json(review): Json<AdmissionReview<Port>>) -> AdmissionResult {
    let request = match into_request(review) {
        Ok(request) => request,
        Err(response) => return Ok(Json(response.into_review())),
    };
    let response = AdmissionResponse::from(&request);

    let errors = match (&request.operation, &request.object) {
        (Operation::Create, Some(new)) => validate_port(new, None),
        (Operation::Update, Some(new)) => validate_port(new, request.old_object.as_ref()),
        _ => Vec::new(),
    };
    Ok(Json(respond(response, &errors).into_review()))
}

/// Validate `new` against `old`, which is `None` on create
pub fn validate_port(new: &Port, old: Option<&Port>) -> Vec<FieldError> {
    let mut errors = Vec::new();
    let old_port = old.map_or(0, Port::allocated_port);
    let new_port = new.allocated_port();

    if let Some(old) = old {
        if new.spec.class_ref != old.spec.class_ref {
            errors.push(FieldError::forbidden("spec.classRef", "cannot change classRef"));
        }
        if new.spec.claim_ref != old.spec.claim_ref {
            errors.push(FieldError::forbidden("spec.claimRef", "cannot change claimRef"));
        }
        if old_port != 0 && new_port != old_port {
            errors.push(FieldError::forbidden("status.port", "cannot change port once allocated"));
        }
    }

    if new_port != 0 && new_port != old_port && new.phase() != Some(PortPhase::Allocated) {
        errors.push(FieldError::invalid(
            "status.port",
            new_port,
            "port can only be set together with phase Allocated",
        ));
    }
    errors
}
