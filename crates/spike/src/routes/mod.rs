// Route handlers. Each module implements one or more API operations and is
// framework-agnostic: handlers take the shared context plus already-parsed
// inputs and return typed responses or an `ApiError`.

pub mod access;
pub mod invoice;
pub mod login;
pub mod ok;
pub mod payment_callback;
pub mod session;
pub mod sign_out;
pub mod sign_up;

use std::fmt::Display;

use serde::Serialize;

use spike_core::error::{ApiError, ErrorCode};

/// `{"success": true}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

impl SuccessResponse {
    pub fn ok() -> Self {
        Self { success: true }
    }
}

/// Trimmed value of a required text field, or `InvalidInput` naming it.
pub(crate) fn required<'a>(field: &str, value: Option<&'a str>) -> Result<&'a str, ApiError> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::invalid_input(format!("{field} is required")))
}

/// Log an internal failure and hide it behind a generic 500.
pub(crate) fn upstream_failure(code: ErrorCode, what: &str, error: impl Display) -> ApiError {
    tracing::error!(error = %error, "{what}");
    ApiError::upstream(code)
}

pub(crate) fn store_failure(what: &str, error: impl Display) -> ApiError {
    upstream_failure(ErrorCode::InternalServerError, what, error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use spike_core::error::HttpStatus;

    #[test]
    fn test_required() {
        assert_eq!(required("username", Some("  admin ")).unwrap(), "admin");
        let err = required("username", Some("   ")).unwrap_err();
        assert_eq!(err.status, HttpStatus::BadRequest);
        assert_eq!(err.code, ErrorCode::InvalidInput);
        assert_eq!(err.message, "username is required");
        assert!(required("deviceId", None).is_err());
    }

    #[test]
    fn test_success_response_json() {
        let json = serde_json::to_string(&SuccessResponse::ok()).unwrap();
        assert_eq!(json, r#"{"success":true}"#);
    }
}
