// SpikeOptions: the main configuration struct.
//
// Every section deserializes with per-field defaults, so a config file only
// needs to name what it changes.

use serde::{Deserialize, Serialize};

use crate::error::SpikeError;

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpikeOptions {
    /// Secret key for signing session tokens (min 32 chars in production).
    #[serde(default)]
    pub secret: String,

    /// Public base URL (e.g., "https://league.example.com").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Path prefix for all routes (default: "/api").
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// App name used in payment descriptions.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_name: Option<String>,

    #[serde(default)]
    pub session: SessionOptions,

    #[serde(default)]
    pub password: PasswordOptions,

    #[serde(default)]
    pub username: UsernameOptions,

    #[serde(default)]
    pub rate_limit: RateLimitOptions,

    /// Request headers that carry the client address, set by a reverse proxy
    /// in front of the server (e.g. `["x-forwarded-for"]`). Checked in order.
    /// Empty: the socket peer address is the client.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub trusted_ip_headers: Vec<String>,

    #[serde(default)]
    pub payment: PaymentOptions,
}

fn default_base_path() -> String {
    "/api".to_string()
}

impl Default for SpikeOptions {
    fn default() -> Self {
        Self {
            secret: String::new(),
            base_url: None,
            base_path: default_base_path(),
            app_name: None,
            session: SessionOptions::default(),
            password: PasswordOptions::default(),
            username: UsernameOptions::default(),
            rate_limit: RateLimitOptions::default(),
            trusted_ip_headers: Vec::new(),
            payment: PaymentOptions::default(),
        }
    }
}

impl SpikeOptions {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            ..Default::default()
        }
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn base_path(mut self, path: impl Into<String>) -> Self {
        self.base_path = path.into();
        self
    }

    pub fn enforce_device_binding(mut self, enforce: bool) -> Self {
        self.session.enforce_device_binding = enforce;
        self
    }

    pub fn trust_ip_headers<I, S>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.trusted_ip_headers = headers.into_iter().map(Into::into).collect();
        self
    }

    pub fn disable_rate_limit(mut self) -> Self {
        self.rate_limit.enabled = false;
        self
    }

    /// Whether cookies must carry the `Secure` attribute.
    pub fn uses_https(&self) -> bool {
        self.base_url
            .as_deref()
            .map(|u| u.starts_with("https://"))
            .unwrap_or(false)
    }

    /// Reject configurations that cannot work at runtime.
    ///
    /// `production` tightens the secret length requirement.
    pub fn validate(&self, production: bool) -> Result<(), SpikeError> {
        if self.secret.is_empty() {
            return Err(SpikeError::Config("secret must be set".into()));
        }
        if production && self.secret.len() < 32 {
            return Err(SpikeError::Config(
                "secret must be at least 32 characters in production".into(),
            ));
        }
        if !self.base_path.starts_with('/') {
            return Err(SpikeError::Config(format!(
                "basePath must start with '/': {}",
                self.base_path
            )));
        }
        if self.payment.tiers.is_empty() {
            return Err(SpikeError::Config("payment.tiers must not be empty".into()));
        }
        if self.password.min_length > self.password.max_length {
            return Err(SpikeError::Config(
                "password.minLength exceeds password.maxLength".into(),
            ));
        }
        for rule in [&self.rate_limit.signup_ip, &self.rate_limit.signup_device] {
            if rule.window == 0 || rule.max == 0 {
                return Err(SpikeError::Config(
                    "rate limit window and max must be positive".into(),
                ));
            }
        }
        Ok(())
    }
}

// ─── Session Options ─────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionOptions {
    /// Session token and cookie lifetime in seconds (default: 30 days).
    #[serde(default = "default_session_expires_in")]
    pub expires_in: u64,

    /// Cookie name prefix; the session cookie is `<prefix>.session_token`.
    #[serde(default = "default_cookie_prefix")]
    pub cookie_prefix: String,

    /// Offset from UTC, in minutes, of the calendar used to decide whether a
    /// login happens on a new day.
    #[serde(default)]
    pub day_boundary_offset_minutes: i32,

    /// When enabled, the session token carries the login device and
    /// sessions from a displaced device resolve as anonymous.
    ///
    /// @default false
    #[serde(default)]
    pub enforce_device_binding: bool,
}

fn default_session_expires_in() -> u64 { 2_592_000 } // 30 days
fn default_cookie_prefix() -> String { "spike".to_string() }

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            expires_in: default_session_expires_in(),
            cookie_prefix: default_cookie_prefix(),
            day_boundary_offset_minutes: 0,
            enforce_device_binding: false,
        }
    }
}

// ─── Credential Options ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordOptions {
    #[serde(default = "default_password_min")]
    pub min_length: usize,
    #[serde(default = "default_password_max")]
    pub max_length: usize,
}

fn default_password_min() -> usize { 6 }
fn default_password_max() -> usize { 128 }

impl Default for PasswordOptions {
    fn default() -> Self {
        Self {
            min_length: default_password_min(),
            max_length: default_password_max(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsernameOptions {
    #[serde(default = "default_username_min")]
    pub min_length: usize,
    #[serde(default = "default_username_max")]
    pub max_length: usize,
}

fn default_username_min() -> usize { 3 }
fn default_username_max() -> usize { 32 }

impl Default for UsernameOptions {
    fn default() -> Self {
        Self {
            min_length: default_username_min(),
            max_length: default_username_max(),
        }
    }
}

// ─── Rate Limit Options ──────────────────────────────────────────

/// A fixed-window rule: at most `max` requests per `window` seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitRule {
    pub window: u64,
    pub max: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitOptions {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Signup attempts per client IP (default: 5 per 60 seconds).
    #[serde(default = "default_signup_ip_rule")]
    pub signup_ip: RateLimitRule,

    /// Signup attempts per device (default: 3 per 24 hours).
    #[serde(default = "default_signup_device_rule")]
    pub signup_device: RateLimitRule,
}

fn default_true() -> bool { true }
fn default_signup_ip_rule() -> RateLimitRule { RateLimitRule { window: 60, max: 5 } }
fn default_signup_device_rule() -> RateLimitRule { RateLimitRule { window: 86_400, max: 3 } }

impl Default for RateLimitOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            signup_ip: default_signup_ip_rule(),
            signup_device: default_signup_device_rule(),
        }
    }
}

// ─── Payment Options ─────────────────────────────────────────────

/// Price of one subscription duration, in the gateway's smallest unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub months: u32,
    pub amount: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOptions {
    /// Supported durations and their prices.
    #[serde(default = "default_tiers")]
    pub tiers: Vec<PriceTier>,

    /// Invoice description shown by the gateway.
    #[serde(default = "default_description")]
    pub description: String,

    /// URL the gateway calls on settlement. Defaults to
    /// `<baseUrl><basePath>/payment/callback`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

fn default_tiers() -> Vec<PriceTier> {
    vec![
        PriceTier { months: 1, amount: 10_000 },
        PriceTier { months: 6, amount: 50_000 },
        PriceTier { months: 12, amount: 90_000 },
    ]
}

fn default_description() -> String {
    "Live stream access".to_string()
}

impl Default for PaymentOptions {
    fn default() -> Self {
        Self {
            tiers: default_tiers(),
            description: default_description(),
            callback_url: None,
        }
    }
}

impl PaymentOptions {
    /// Look up the price for a duration. `None` for unsupported durations.
    pub fn price_for(&self, months: u32) -> Option<u64> {
        self.tiers.iter().find(|t| t.months == months).map(|t| t.amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let opts = SpikeOptions::new("s");
        assert_eq!(opts.base_path, "/api");
        assert_eq!(opts.session.expires_in, 30 * 24 * 60 * 60);
        assert_eq!(opts.session.cookie_prefix, "spike");
        assert!(!opts.session.enforce_device_binding);
        assert_eq!(opts.rate_limit.signup_ip, RateLimitRule { window: 60, max: 5 });
        assert_eq!(opts.rate_limit.signup_device, RateLimitRule { window: 86_400, max: 3 });
        assert!(opts.trusted_ip_headers.is_empty());
    }

    #[test]
    fn test_price_lookup() {
        let payment = PaymentOptions::default();
        assert_eq!(payment.price_for(1), Some(10_000));
        assert_eq!(payment.price_for(12), Some(90_000));
        assert_eq!(payment.price_for(3), None);
    }

    #[test]
    fn test_deserialize_partial_camel_case() {
        let json = serde_json::json!({
            "secret": "abc",
            "session": { "enforceDeviceBinding": true },
            "rateLimit": { "signupIp": { "window": 30, "max": 2 } }
        });
        let opts: SpikeOptions = serde_json::from_value(json).unwrap();
        assert!(opts.session.enforce_device_binding);
        assert_eq!(opts.session.expires_in, 2_592_000);
        assert_eq!(opts.rate_limit.signup_ip.max, 2);
        assert_eq!(opts.rate_limit.signup_device.max, 3);
        assert_eq!(opts.payment.tiers.len(), 3);

        let json = serde_json::json!({ "secret": "abc", "trustedIpHeaders": ["x-real-ip"] });
        let opts: SpikeOptions = serde_json::from_value(json).unwrap();
        assert_eq!(opts.trusted_ip_headers, vec!["x-real-ip".to_string()]);
    }

    #[test]
    fn test_uses_https() {
        assert!(!SpikeOptions::new("s").uses_https());
        assert!(SpikeOptions::new("s").base_url("https://x.mn").uses_https());
    }

    #[test]
    fn test_validate() {
        assert!(SpikeOptions::default().validate(false).is_err());
        assert!(SpikeOptions::new("short").validate(false).is_ok());
        assert!(SpikeOptions::new("short").validate(true).is_err());
        assert!(SpikeOptions::new("a".repeat(32)).validate(true).is_ok());
        assert!(SpikeOptions::new("s").base_path("api").validate(false).is_err());

        let mut opts = SpikeOptions::new("s");
        opts.payment.tiers.clear();
        assert!(opts.validate(false).is_err());
    }
}
