//! PortPool validation

use std::sync::Arc;

use axum::{Json, extract::State};
use crds::PortPool;
use kube::ResourceExt;
use kube::core::admission::{AdmissionResponse, AdmissionReview, Operation};
use tracing::info;

use super::validation::{FieldError, respond};
use super::{AdmissionResult, WebhookState, into_request};
use crate::overlap::find_overlap;

pub async fn validate_handler(
    State(state): State<Arc<WebhookState>>,
    Json(review): Json<AdmissionReview<PortPool>>,
) -> AdmissionResult {
    let request = match into_request(review) {
        Ok(request) => request,
        Err(response) => return Ok(Json(response.into_review())),
    };
    let response = AdmissionResponse::from(&request);

    let pool = match (&request.operation, &request.object) {
        (Operation::Create | Operation::Update, Some(pool)) => pool,
        _ => return Ok(Json(response.into_review())),
    };

    let errors = match state.store.list_pools().await {
        Ok(pools) => validate_pool(pool, &pools),
        Err(e) => vec![FieldError::internal("spec", e)],
    };
    if !errors.is_empty() {
        info!(pool = %pool.name_any(), errors = errors.len(), "Rejecting PortPool");
    }
    Ok(Json(respond(response, &errors).into_review()))
}

/// Range checks first, then the overlap check against `existing`
pub fn validate_pool(pool: &PortPool, existing: &[PortPool]) -> Vec<FieldError> {
    let spec = &pool.spec;
    let mut errors = Vec::new();

    if spec.start == 0 {
        errors.push(FieldError::invalid("spec.start", spec.start, "must be greater than 0"));
    }
    if spec.end == 0 {
        errors.push(FieldError::invalid("spec.end", spec.end, "must be greater than 0"));
    }
    if spec.start > spec.end {
        errors.push(FieldError::invalid(
            "spec.start",
            spec.start,
            "must be less than or equal to spec.end",
        ));
    }
    if !errors.is_empty() {
        return errors;
    }

    if let Some(other) = find_overlap(pool, existing) {
        errors.push(FieldError::invalid(
            "spec",
            format!("{}-{}", spec.start, spec.end),
            format!(
                "overlaps pool {} ({}-{})",
                other.name_any(),
                other.spec.start,
                other.spec.end
            ),
        ));
    }
    errors
}
