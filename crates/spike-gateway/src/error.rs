//! Gateway errors.

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway configuration error: {0}")]
    Config(String),

    /// Connection failure or timeout.
    #[error("Gateway request failed: {0}")]
    Http(String),

    /// The gateway rejected the bearer token. The cached token has been dropped.
    #[error("Gateway rejected the access token")]
    Unauthorized,

    #[error("Gateway returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Failed to decode gateway response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Http(e.to_string())
        }
    }
}
