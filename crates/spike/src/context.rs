// Access context: everything a request handler needs, built once at startup
// and shared as `Arc<AccessContext>`.

use std::sync::Arc;

use spike_core::db::counter_store::CounterStore;
use spike_core::env::is_production;
use spike_core::error::SpikeError;
use spike_core::options::SpikeOptions;
use spike_gateway::PaymentGateway;

use crate::cookies::{AuthCookie, session_cookie};
use crate::internal_adapter::InternalAdapter;
use crate::middleware::rate_limiter::RateLimiter;

const DEFAULT_APP_NAME: &str = "Spike";

pub struct AccessContext {
    pub options: SpikeOptions,

    pub app_name: String,

    /// HS256 key for session tokens.
    pub secret: String,

    pub base_url: Option<String>,

    /// Route prefix, e.g. "/api".
    pub base_path: String,

    pub session_cookie: AuthCookie,

    pub adapter: Arc<dyn InternalAdapter>,

    pub rate_limiter: RateLimiter,

    pub gateway: Arc<dyn PaymentGateway>,
}

impl std::fmt::Debug for AccessContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessContext")
            .field("app_name", &self.app_name)
            .field("secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .field("base_path", &self.base_path)
            .field("session_cookie", &self.session_cookie.name)
            .field("adapter", &self.adapter)
            .field("rate_limiter", &self.rate_limiter)
            .field("gateway", &self.gateway)
            .finish()
    }
}

impl AccessContext {
    /// Assemble a context without touching any backend.
    pub fn new(
        options: SpikeOptions,
        adapter: Arc<dyn InternalAdapter>,
        counters: Arc<dyn CounterStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Arc<Self> {
        let app_name = options
            .app_name
            .clone()
            .unwrap_or_else(|| DEFAULT_APP_NAME.to_string());

        Arc::new(Self {
            secret: options.secret.clone(),
            base_url: options.base_url.clone(),
            base_path: options.base_path.clone(),
            session_cookie: session_cookie(&options),
            rate_limiter: RateLimiter::new(counters, options.rate_limit.clone()),
            app_name,
            adapter,
            gateway,
            options,
        })
    }

    /// Validate the options, create the store's unique indexes and build the
    /// context.
    pub async fn init(
        options: SpikeOptions,
        adapter: Arc<dyn InternalAdapter>,
        counters: Arc<dyn CounterStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Arc<Self>, SpikeError> {
        options.validate(is_production())?;
        adapter
            .init()
            .await
            .map_err(|e| SpikeError::Database(format!("Failed to create indexes: {e}")))?;

        let ctx = Self::new(options, adapter, counters, gateway);
        tracing::info!(
            app = %ctx.app_name,
            base_path = %ctx.base_path,
            rate_limit = ctx.rate_limiter.is_enabled(),
            enforce_device_binding = ctx.options.session.enforce_device_binding,
            "Access context initialized"
        );
        Ok(ctx)
    }

    /// Where the gateway should report settlements.
    pub fn callback_url(&self) -> String {
        if let Some(url) = &self.options.payment.callback_url {
            return url.clone();
        }
        format!(
            "{}{}/payment/callback",
            self.base_url.as_deref().unwrap_or("").trim_end_matches('/'),
            self.base_path
        )
    }
}
