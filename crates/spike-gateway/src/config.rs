//! Gateway configuration.

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// Credentials and endpoint for the payment gateway.
#[derive(Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayOptions {
    /// API root, e.g. `https://merchant.example.mn/v2`.
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
    /// Merchant invoice template code issued by the gateway.
    pub invoice_code: String,
    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// A cached token is refreshed this many seconds before it expires.
    #[serde(default = "default_token_margin_secs")]
    pub token_margin_secs: u64,
}

fn default_timeout_secs() -> u64 { 10 }
fn default_token_margin_secs() -> u64 { 60 }

impl GatewayOptions {
    pub fn new(
        base_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        invoice_code: impl Into<String>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            invoice_code: invoice_code.into(),
            timeout_secs: default_timeout_secs(),
            token_margin_secs: default_token_margin_secs(),
        }
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Join `path` onto the base URL.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), GatewayError> {
        let missing = [
            ("baseUrl", &self.base_url),
            ("clientId", &self.client_id),
            ("clientSecret", &self.client_secret),
            ("invoiceCode", &self.invoice_code),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty());

        if let Some((name, _)) = missing {
            return Err(GatewayError::Config(format!("gateway.{name} must be set")));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(GatewayError::Config(format!(
                "gateway.baseUrl must be an http(s) URL: {}",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(GatewayError::Config("gateway.timeoutSecs must be positive".into()));
        }
        Ok(())
    }
}

// Keep the secret out of logs.
impl std::fmt::Debug for GatewayOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewayOptions")
            .field("base_url", &self.base_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("invoice_code", &self.invoice_code)
            .field("timeout_secs", &self.timeout_secs)
            .field("token_margin_secs", &self.token_margin_secs)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let opts = GatewayOptions::new("https://pay.example/v2/", "id", "secret", "INV");
        assert_eq!(opts.endpoint("/auth/token"), "https://pay.example/v2/auth/token");
        assert_eq!(opts.endpoint("invoice"), "https://pay.example/v2/invoice");
    }

    #[test]
    fn test_defaults_from_json() {
        let opts: GatewayOptions = serde_json::from_value(serde_json::json!({
            "baseUrl": "https://pay.example",
            "clientId": "id",
            "clientSecret": "secret",
            "invoiceCode": "INV"
        }))
        .unwrap();
        assert_eq!(opts.timeout_secs, 10);
        assert_eq!(opts.token_margin_secs, 60);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_missing_fields() {
        let opts = GatewayOptions::new("https://pay.example", "", "secret", "INV");
        assert!(matches!(opts.validate(), Err(GatewayError::Config(_))));
        let opts = GatewayOptions::new("ftp://pay.example", "id", "secret", "INV");
        assert!(opts.validate().is_err());
    }

    #[test]
    fn test_debug_redacts_secret() {
        let opts = GatewayOptions::new("https://pay.example", "id", "hunter2", "INV");
        assert!(!format!("{opts:?}").contains("hunter2"));
    }
}
