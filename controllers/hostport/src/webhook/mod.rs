//! Admission webhooks
//!
//! Mutating webhooks attach protection tokens to new hostport objects and
//! inject allocated ports into pods. Validating webhooks guard the fields
//! that must not change once set, and reject overlapping pools early.
//!
//! All handlers answer with an `AdmissionReview`; mutations travel as
//! RFC 6902 patches computed by diffing the object before and after.

pub mod claim;
pub mod pod;
pub mod pool;
pub mod port;
pub mod protection;
pub mod validation;

use std::sync::Arc;

use axum::{
    Json, Router,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_server::tls_rustls::RustlsConfig;
use crds::{Port, PortClaim, PortClass, PortPool};
use kube::{
    Resource,
    api::DynamicObject,
    core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, ConvertAdmissionReviewError},
};
use resource_store::ResourceStore;
use serde::{Serialize, de::DeserializeOwned};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, warn};

use crate::config::{AnnotationPrefixes, Config};
use crate::error::ControllerError;

/// Shared state for webhook handlers
pub struct WebhookState {
    pub store: Arc<dyn ResourceStore>,
    pub annotations: AnnotationPrefixes,
}

/// Error type for webhook operations
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The admission review request was invalid or malformed
    #[error("invalid admission review: {0}")]
    InvalidReview(String),

    /// An error occurred during JSON serialization/deserialization
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The computed patch could not be attached to the response
    #[error("patch error: {0}")]
    Patch(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let status = match &self {
            WebhookError::InvalidReview(_) => StatusCode::BAD_REQUEST,
            WebhookError::Serialization(_) | WebhookError::Patch(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        error!(error = %self, "Admission webhook failed");
        (status, Json(serde_json::json!({"error": self.to_string()}))).into_response()
    }
}

/// Result type of every admission handler
pub type AdmissionResult = Result<Json<AdmissionReview<DynamicObject>>, WebhookError>;

/// Build the webhook router
pub fn webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route("/mutate/portclasses", post(protection::mutate_handler::<PortClass>))
        .route("/mutate/portpools", post(protection::mutate_handler::<PortPool>))
        .route("/mutate/portclaims", post(protection::mutate_handler::<PortClaim>))
        .route("/mutate/ports", post(protection::mutate_handler::<Port>))
        .route("/mutate/pods", post(pod::mutate_handler))
        .route("/validate/portclasses", post(allow_handler::<PortClass>))
        .route("/validate/portpools", post(pool::validate_handler))
        .route("/validate/portclaims", post(claim::validate_handler))
        .route("/validate/ports", post(port::validate_handler))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Serve the webhook router until the process exits
pub async fn serve(config: &Config, state: Arc<WebhookState>) -> Result<(), ControllerError> {
    let app = webhook_router(state);
    let addr = config.webhook_addr;

    let served = match &config.webhook_tls {
        Some(tls) => {
            let rustls = RustlsConfig::from_pem_file(&tls.cert, &tls.key)
                .await
                .map_err(|e| ControllerError::Webhook(format!("failed to load TLS material: {e}")))?;
            info!("Serving admission webhooks on https://{}", addr);
            axum_server::bind_rustls(addr, rustls)
                .serve(app.into_make_service())
                .await
        }
        None => {
            warn!("No webhook certificate configured, serving plain HTTP on {}", addr);
            axum_server::bind(addr).serve(app.into_make_service()).await
        }
    };
    served.map_err(|e| ControllerError::Webhook(e.to_string()))
}

async fn healthz() -> &'static str {
    "ok"
}

/// Validation for kinds without rules: always allowed
async fn allow_handler<K>(Json(review): Json<AdmissionReview<K>>) -> AdmissionResult
where
    K: Resource + DeserializeOwned + Send + Sync + 'static,
{
    let request = match into_request(review) {
        Ok(request) => request,
        Err(response) => return Ok(Json(response.into_review())),
    };
    Ok(Json(AdmissionResponse::from(&request).into_review()))
}

/// Unwrap a review into its request, or an `invalid` response to send back
pub(crate) fn into_request<K: Resource>(review: AdmissionReview<K>) -> Result<AdmissionRequest<K>, AdmissionResponse> {
    review.try_into().map_err(|e: ConvertAdmissionReviewError| {
        error!(error = %e, "Failed to parse admission request");
        AdmissionResponse::invalid(e.to_string())
    })
}

/// Attach the difference between `before` and `after` as a JSON patch.
/// An empty difference leaves the response untouched.
pub(crate) fn with_diff<K: Serialize>(
    response: AdmissionResponse,
    before: &K,
    after: &K,
) -> Result<AdmissionResponse, WebhookError> {
    let patch = json_patch::diff(&serde_json::to_value(before)?, &serde_json::to_value(after)?);
    if patch.0.is_empty() {
        return Ok(response);
    }
    debug!(operations = patch.0.len(), "Returning admission patch");
    response
        .with_patch(patch)
        .map_err(|e| WebhookError::Patch(e.to_string()))
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::*;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use resource_store::MockResourceStore;
    use tower::ServiceExt;

    fn router(store: &MockResourceStore) -> Router {
        webhook_router(Arc::new(WebhookState {
            store: Arc::new(store.clone()),
            annotations: AnnotationPrefixes::default(),
        }))
    }

    async fn post_review(app: Router, uri: &str, review: serde_json::Value) -> serde_json::Value {
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(Body::from(review.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_healthz() {
        let app = router(&MockResourceStore::new());
        let response = app
            .oneshot(Request::builder().uri("/healthz").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_mutate_route_attaches_token() {
        let store = MockResourceStore::new();
        let class = serde_json::to_value(create_test_class("default")).unwrap();
        let review = serde_json::to_value(testing::admission_review::<PortClass>("CREATE", Some(class), None)).unwrap();

        let answer = post_review(router(&store), "/mutate/portclasses", review).await;
        assert_eq!(answer["response"]["allowed"], true);
        assert_eq!(answer["response"]["patchType"], "JSONPatch");
    }

    #[tokio::test]
    async fn test_validate_pool_route_denies_overlap() {
        let store = MockResourceStore::new();
        store.insert_pool(&create_test_pool("a", "default", 5000, 5010, true, None));
        let pool = serde_json::to_value(create_test_pool("b", "default", 5005, 5020, true, None)).unwrap();
        let review = serde_json::to_value(testing::admission_review::<PortPool>("CREATE", Some(pool), None)).unwrap();

        let answer = post_review(router(&store), "/validate/portpools", review).await;
        assert_eq!(answer["response"]["allowed"], false);
        let message = answer["response"]["status"]["message"].as_str().unwrap();
        assert!(message.contains("overlaps pool a"));
    }

    #[tokio::test]
    async fn test_malformed_review_is_invalid() {
        let review = serde_json::json!({
            "apiVersion": "admission.k8s.io/v1",
            "kind": "AdmissionReview"
        });
        let answer = post_review(router(&MockResourceStore::new()), "/validate/portclasses", review).await;
        assert_eq!(answer["response"]["allowed"], false);
    }
}
