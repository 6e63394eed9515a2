// Error taxonomy shared by every spike crate.
//
// `ApiError` is what leaves a route handler; `SpikeError` is for internal
// failures (configuration, storage, crypto, gateway) that get logged and
// translated at the route boundary.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable error codes carried in every error response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    InvalidUsernameOrPassword,
    UsernameTaken,
    PasswordTooShort,
    PasswordTooLong,
    UnsupportedDuration,
    DeviceIdRequired,
    NotFound,
    RateLimitExceeded,
    PaymentGatewayError,
    InternalServerError,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            Self::InvalidInput => "Invalid input",
            Self::InvalidUsernameOrPassword => "Invalid username or password",
            Self::UsernameTaken => "Username is already taken",
            Self::PasswordTooShort => "Password too short",
            Self::PasswordTooLong => "Password too long",
            Self::UnsupportedDuration => "Unsupported subscription duration",
            Self::DeviceIdRequired => "deviceId is required",
            Self::NotFound => "Not found",
            Self::RateLimitExceeded => "Too many requests. Please try again later.",
            Self::PaymentGatewayError => "Payment service is unavailable",
            Self::InternalServerError => "Internal server error",
        };
        write!(f, "{msg}")
    }
}

/// HTTP status codes used by the API error system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpStatus {
    BadRequest = 400,
    NotFound = 404,
    TooManyRequests = 429,
    InternalServerError = 500,
}

impl HttpStatus {
    pub fn status_code(&self) -> u16 {
        *self as u16
    }
}

impl fmt::Display for HttpStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

/// API error: an HTTP status, an error code, a human-readable message and,
/// for rate-limit rejections, the number of seconds until a retry can succeed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{status} {code:?}: {message}")]
pub struct ApiError {
    pub status: HttpStatus,
    pub code: ErrorCode,
    pub message: String,
    pub retry_after: Option<u64>,
}

impl ApiError {
    pub fn new(status: HttpStatus, code: ErrorCode) -> Self {
        Self {
            message: code.to_string(),
            status,
            code,
            retry_after: None,
        }
    }

    pub fn with_message(status: HttpStatus, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            retry_after: None,
        }
    }

    /// Missing or malformed required field (400).
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::with_message(HttpStatus::BadRequest, ErrorCode::InvalidInput, message)
    }

    pub fn bad_request(code: ErrorCode) -> Self {
        Self::new(HttpStatus::BadRequest, code)
    }

    /// Login failure. Same status and message whether the user exists or not.
    pub fn invalid_credentials() -> Self {
        Self::new(HttpStatus::BadRequest, ErrorCode::InvalidUsernameOrPassword)
    }

    pub fn not_found(code: ErrorCode) -> Self {
        Self::new(HttpStatus::NotFound, code)
    }

    pub fn too_many_requests(retry_after: u64) -> Self {
        Self {
            retry_after: Some(retry_after),
            ..Self::new(HttpStatus::TooManyRequests, ErrorCode::RateLimitExceeded)
        }
    }

    /// Database, counter store or payment gateway failure (500). The detail
    /// stays in the logs; callers only see the code's generic message.
    pub fn upstream(code: ErrorCode) -> Self {
        Self::new(HttpStatus::InternalServerError, code)
    }

    /// Build a JSON body for the error response.
    pub fn to_json(&self) -> serde_json::Value {
        let mut body = serde_json::json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(retry_after) = self.retry_after {
            body["retryAfter"] = serde_json::json!(retry_after);
        }
        body
    }
}

/// Internal (non-HTTP) error.
#[derive(Debug, thiserror::Error)]
pub enum SpikeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(String),

    /// A unique key (username, device id, invoice reference) already exists.
    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Api(#[from] ApiError),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
}

/// Unified result type for spike operations.
pub type Result<T> = std::result::Result<T, SpikeError>;
