// Environment detection and logger configuration.

use std::sync::OnceLock;

/// Cached environment mode.
static ENV_MODE: OnceLock<EnvMode> = OnceLock::new();

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvMode {
    Production,
    Development,
    Test,
}

impl EnvMode {
    fn parse(value: &str) -> Self {
        match value.trim().to_lowercase().as_str() {
            "production" | "prod" => EnvMode::Production,
            "test" | "testing" => EnvMode::Test,
            _ => EnvMode::Development,
        }
    }
}

/// Detect the current environment mode. Checks `SPIKE_ENV`, then `RUST_ENV`.
pub fn detect_env_mode() -> EnvMode {
    *ENV_MODE.get_or_init(|| {
        let env_val = std::env::var("SPIKE_ENV")
            .or_else(|_| std::env::var("RUST_ENV"))
            .unwrap_or_default();
        EnvMode::parse(&env_val)
    })
}

pub fn is_production() -> bool {
    detect_env_mode() == EnvMode::Production
}

/// `SPIKE_SECRET`, the token signing secret.
pub fn get_secret_from_env() -> Option<String> {
    non_empty_var("SPIKE_SECRET")
}

/// `SPIKE_URL`, the public base URL.
pub fn get_url_from_env() -> Option<String> {
    non_empty_var("SPIKE_URL")
}

pub fn get_mongodb_uri_from_env() -> Option<String> {
    non_empty_var("SPIKE_MONGODB_URI")
}

pub fn get_redis_url_from_env() -> Option<String> {
    non_empty_var("SPIKE_REDIS_URL")
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Default `EnvFilter` directive when `RUST_LOG` is unset.
pub fn default_log_filter(mode: EnvMode) -> &'static str {
    match mode {
        EnvMode::Production => "spike=info,spike_axum=info,spike_gateway=info,tower_http=warn",
        _ => "spike=debug,spike_axum=debug,spike_gateway=debug,spike_core=debug,tower_http=debug",
    }
}

/// Initialize the `tracing` subscriber. `RUST_LOG` wins over the defaults.
///
/// Safe to call more than once; later calls are ignored.
pub fn init_logger() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_log_filter(detect_env_mode())));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
