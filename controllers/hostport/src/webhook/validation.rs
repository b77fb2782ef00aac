//! Admission field errors
//!
//! Handlers collect every problem they find before answering, so a denial
//! lists all offending fields at once.

use kube::core::admission::AdmissionResponse;
use std::fmt;

/// Kind of a field error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldErrorKind {
    Invalid,
    Forbidden,
    Duplicate,
    NotFound,
    Internal,
}

impl fmt::Display for FieldErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "Invalid",
            Self::Forbidden => "Forbidden",
            Self::Duplicate => "Duplicate",
            Self::NotFound => "NotFound",
            Self::Internal => "Internal",
        })
    }
}

/// One rejected field
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Field path, e.g. `spec.start` or `metadata.annotations[x/y]`
    pub path: String,
    pub kind: FieldErrorKind,
    /// Offending value as text
    pub value: String,
    pub detail: String,
}

impl FieldError {
    fn new(path: impl Into<String>, kind: FieldErrorKind, value: impl ToString, detail: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            kind,
            value: value.to_string(),
            detail: detail.into(),
        }
    }

    pub fn invalid(path: impl Into<String>, value: impl ToString, detail: impl Into<String>) -> Self {
        Self::new(path, FieldErrorKind::Invalid, value, detail)
    }

    pub fn forbidden(path: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::new(path, FieldErrorKind::Forbidden, "", detail)
    }

    pub fn duplicate(path: impl Into<String>, value: impl ToString) -> Self {
        Self::new(path, FieldErrorKind::Duplicate, value, "duplicate value")
    }

    pub fn not_found(path: impl Into<String>, value: impl ToString) -> Self {
        Self::new(path, FieldErrorKind::NotFound, value, "not found")
    }

    pub fn internal(path: impl Into<String>, err: impl fmt::Display) -> Self {
        Self::new(path, FieldErrorKind::Internal, "", err.to_string())
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} value {:?}: {}", self.path, self.kind, self.value, self.detail)
    }
}

/// All errors joined into one denial message
pub fn denial_message(errors: &[FieldError]) -> String {
    errors.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

/// Allow `response` if there are no errors, deny it with every error otherwise
pub fn respond(response: AdmissionResponse, errors: &[FieldError]) -> AdmissionResponse {
    if errors.is_empty() {
        response
    } else {
        response.deny(denial_message(errors))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::webhook::testing::admission_request;
    use serde_json::json;

    #[test]
    fn test_denial_message_format() {
        let errors = vec![
            FieldError::invalid("spec.start", 10, "must be less than or equal to spec.end"),
            FieldError::forbidden("spec.classRef", "cannot change classRef"),
        ];

        assert_eq!(
            denial_message(&errors),
            "spec.start: Invalid value \"10\": must be less than or equal to spec.end; \
             spec.classRef: Forbidden value \"\": cannot change classRef"
        );
    }

    #[test]
    fn test_respond() {
        let request = admission_request::<crds::PortClass>("CREATE", Some(json!({"metadata": {"name": "a"}, "spec": {}})), None);

        assert!(respond(AdmissionResponse::from(&request), &[]).allowed);

        let denied = respond(
            AdmissionResponse::from(&request),
            &[FieldError::not_found("spec.classRef", "missing")],
        );
        assert!(!denied.allowed);
        assert!(denied.result.message.contains("spec.classRef: NotFound"));
    }
}
