// Request guards: fixed-window rate limiting.

pub mod rate_limiter;

use std::fmt;

use spike_core::error::{ApiError, ErrorCode};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiddlewareError {
    /// 429 Too Many Requests: rate limit exceeded.
    TooManyRequests { retry_after: u64, message: String },
    /// The counter store could not be reached.
    Store(String),
}

impl fmt::Display for MiddlewareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooManyRequests { retry_after, message } => {
                write!(f, "Too Many Requests (retry after {}s): {}", retry_after, message)
            }
            Self::Store(e) => write!(f, "Counter store failure: {}", e),
        }
    }
}

impl std::error::Error for MiddlewareError {}

impl From<MiddlewareError> for ApiError {
    fn from(e: MiddlewareError) -> Self {
        match e {
            MiddlewareError::TooManyRequests { retry_after, .. } => {
                ApiError::too_many_requests(retry_after)
            }
            MiddlewareError::Store(_) => ApiError::upstream(ErrorCode::InternalServerError),
        }
    }
}
