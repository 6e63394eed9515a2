//! Payment gateway trait and its HTTP implementation.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;

use crate::config::GatewayOptions;
use crate::error::GatewayError;
use crate::token_cache::TokenCache;
use crate::types::{CreateInvoiceBody, CreatedInvoice, InvoiceRequest, PaymentCheck, TokenResponse};

/// The two gateway calls the access policies depend on.
#[async_trait]
pub trait PaymentGateway: Send + Sync + std::fmt::Debug {
    /// Create a hosted invoice and return its payment link.
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<CreatedInvoice, GatewayError>;

    /// Ask the gateway for the authoritative status of a payment.
    async fn check_payment(&self, payment_id: &str) -> Result<PaymentCheck, GatewayError>;
}

/// [`PaymentGateway`] over HTTPS with a cached bearer token.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    options: GatewayOptions,
    client: reqwest::Client,
    tokens: Arc<TokenCache>,
}

impl HttpPaymentGateway {
    pub fn new(options: GatewayOptions) -> Result<Self, GatewayError> {
        Self::with_token_cache(options, Arc::new(TokenCache::new()))
    }

    /// Build a client that shares an existing token cache.
    pub fn with_token_cache(
        options: GatewayOptions,
        tokens: Arc<TokenCache>,
    ) -> Result<Self, GatewayError> {
        options.validate()?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            options,
            client,
            tokens,
        })
    }

    pub fn token_cache(&self) -> &Arc<TokenCache> {
        &self.tokens
    }

    async fn fetch_token(&self) -> Result<TokenResponse, GatewayError> {
        let credentials = format!("{}:{}", self.options.client_id, self.options.client_secret);
        let encoded = STANDARD.encode(credentials.as_bytes());

        let response = self
            .client
            .post(self.options.endpoint("auth/token"))
            .header(reqwest::header::AUTHORIZATION, format!("Basic {encoded}"))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        decode(response).await
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let margin = Duration::from_secs(self.options.token_margin_secs);
        self.tokens.get_or_fetch(margin, || self.fetch_token()).await
    }

    /// Send an authenticated request. A 401 drops the cached token so the next
    /// call logs in again.
    async fn send_authorized<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, GatewayError> {
        let token = self.access_token().await?;
        let response = request
            .bearer_auth(token)
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            tracing::warn!("Gateway returned 401, dropping cached token");
            self.tokens.invalidate().await;
            return Err(GatewayError::Unauthorized);
        }

        decode(response).await
    }
}

async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Status {
            status: status.as_u16(),
            body,
        });
    }
    response
        .json::<T>()
        .await
        .map_err(|e| GatewayError::Decode(e.to_string()))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_invoice(&self, request: &InvoiceRequest) -> Result<CreatedInvoice, GatewayError> {
        let body = CreateInvoiceBody {
            invoice_code: self.options.invoice_code.clone(),
            sender_invoice_no: request.reference.clone(),
            amount: request.amount,
            description: request.description.clone(),
            callback_url: request.callback_url.clone(),
        };
        let created: CreatedInvoice = self
            .send_authorized(self.client.post(self.options.endpoint("invoice")).json(&body))
            .await?;
        tracing::debug!(
            reference = %request.reference,
            invoice_id = %created.invoice_id,
            "Gateway invoice created"
        );
        Ok(created)
    }

    async fn check_payment(&self, payment_id: &str) -> Result<PaymentCheck, GatewayError> {
        // The id arrives from an unauthenticated callback; push it as a single
        // escaped segment.
        let mut url = reqwest::Url::parse(&self.options.endpoint("payment"))
            .map_err(|e| GatewayError::Config(format!("invalid gateway.baseUrl: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| GatewayError::Config("gateway.baseUrl cannot carry a path".into()))?
            .push(payment_id);
        self.send_authorized(self.client.get(url)).await
    }
}
