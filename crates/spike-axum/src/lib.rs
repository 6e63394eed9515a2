//! # spike-axum
//!
//! Axum bindings for the live-stream access endpoints.
//!
//! ```rust,ignore
//! let spike = Spike::init(options, adapter, counters, gateway).await?;
//! let app = axum::Router::new().merge(spike.router());
//! axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, FromRequest, Query, Request, State},
    http::{header, Extensions, HeaderMap, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::Deserialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use spike::context::AccessContext;
use spike::cookies::ResponseCookies;
use spike::internal_adapter::InternalAdapter;
use spike::routes;
use spike::utils::ip::client_ip;
use spike_core::db::counter_store::CounterStore;
use spike_core::error::{ApiError, SpikeError};
use spike_core::options::SpikeOptions;
use spike_gateway::PaymentGateway;

// ─── Response with Cookies ──────────────────────────────────────

/// A JSON response that also carries Set-Cookie headers.
pub struct CookieResponse {
    body: Response,
    cookies: ResponseCookies,
}

impl CookieResponse {
    pub fn json<T: serde::Serialize>(data: T, cookies: ResponseCookies) -> Self {
        Self {
            body: Json(data).into_response(),
            cookies,
        }
    }
}

impl IntoResponse for CookieResponse {
    fn into_response(self) -> Response {
        let (mut parts, body) = self.body.into_parts();

        for (_, header_value) in self.cookies.into_headers() {
            if let Ok(val) = HeaderValue::from_str(&header_value) {
                parts.headers.append(header::SET_COOKIE, val);
            }
        }

        Response::from_parts(parts, body)
    }
}

// ─── Error Handling ──────────────────────────────────────────────

/// HTTP rendering of an [`ApiError`].
#[derive(Debug)]
pub struct HttpError(pub ApiError);

impl From<ApiError> for HttpError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, Json(self.0.to_json())).into_response();
        if let Some(retry_after) = self.0.retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(retry_after));
        }
        response
    }
}

/// `Json<T>` whose rejection is reported as an `InvalidInput` error.
pub struct JsonBody<T>(pub T);

impl<S, T> FromRequest<S> for JsonBody<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = HttpError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(HttpError(ApiError::invalid_input(rejection.body_text()))),
        }
    }
}

// ─── Request Extraction ──────────────────────────────────────────

/// All `Cookie` headers joined into one header value.
fn cookie_header(headers: &HeaderMap) -> Option<String> {
    let values: Vec<&str> = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .collect();
    if values.is_empty() {
        None
    } else {
        Some(values.join("; "))
    }
}

/// Caller address: a trusted proxy header when configured, otherwise the
/// socket peer (requires serving with connect info).
fn request_ip(headers: &HeaderMap, extensions: &Extensions, trusted_headers: &[String]) -> String {
    let peer = extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    client_ip(
        |name| headers.get(name).and_then(|v| v.to_str().ok()).map(str::to_string),
        trusted_headers,
        peer,
    )
}

// ─── Spike Builder ──────────────────────────────────────────────

/// Entry point for mounting the access endpoints on an Axum app.
#[derive(Debug, Clone)]
pub struct Spike {
    ctx: Arc<AccessContext>,
}

impl Spike {
    /// Build without touching any backend.
    pub fn new(
        options: SpikeOptions,
        adapter: Arc<dyn InternalAdapter>,
        counters: Arc<dyn CounterStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ctx: AccessContext::new(options, adapter, counters, gateway),
        }
    }

    /// Validate options and prepare the store before serving.
    pub async fn init(
        options: SpikeOptions,
        adapter: Arc<dyn InternalAdapter>,
        counters: Arc<dyn CounterStore>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Result<Self, SpikeError> {
        let ctx = AccessContext::init(options, adapter, counters, gateway).await?;
        Ok(Self { ctx })
    }

    pub fn context(&self) -> &Arc<AccessContext> {
        &self.ctx
    }

    /// All endpoints, nested under the configured `base_path` (default `/api`).
    pub fn router(&self) -> Router {
        let base_path = self.ctx.base_path.trim_end_matches('/');
        let routes = self.access_routes();

        let router = if base_path.is_empty() {
            Router::new().merge(routes)
        } else {
            Router::new().nest(base_path, routes)
        };
        router.layer(TraceLayer::new_for_http())
    }

    /// Same as [`Spike::router`] with permissive CORS.
    pub fn router_with_cors(&self) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        self.router().layer(cors)
    }

    fn access_routes(&self) -> Router {
        Router::new()
            .route("/ok", get(handle_ok))
            // Accounts
            .route("/signup", post(handle_sign_up))
            .route("/login", post(handle_login))
            .route("/logout", post(handle_logout))
            .route("/session", get(handle_get_session))
            // Entitlement
            .route("/access/check", get(handle_check_access))
            .route("/access/live", get(handle_live_access))
            // Payments
            .route("/payment/invoice", post(handle_create_invoice))
            .route("/payment/callback", get(handle_payment_callback))
            .with_state(self.ctx.clone())
    }
}

// ─── Route Handlers ─────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DeviceQuery {
    #[serde(default, alias = "device_id")]
    device_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct CallbackQuery {
    #[serde(default, alias = "paymentId")]
    payment_id: Option<String>,
}

async fn handle_ok() -> impl IntoResponse {
    Json(routes::ok::handle_ok())
}

async fn handle_sign_up(
    State(ctx): State<Arc<AccessContext>>,
    headers: HeaderMap,
    extensions: Extensions,
    JsonBody(body): JsonBody<routes::sign_up::SignUpRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let ip = request_ip(&headers, &extensions, &ctx.options.trusted_ip_headers);
    let result = routes::sign_up::handle_sign_up(ctx, body, &ip).await?;
    Ok((StatusCode::CREATED, Json(result)))
}

async fn handle_login(
    State(ctx): State<Arc<AccessContext>>,
    JsonBody(body): JsonBody<routes::login::LoginRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let result = routes::login::handle_login(ctx, body).await?;
    Ok(CookieResponse::json(result.response, result.cookies))
}

async fn handle_logout(State(ctx): State<Arc<AccessContext>>) -> impl IntoResponse {
    let result = routes::sign_out::handle_sign_out(ctx);
    CookieResponse::json(result.response, result.cookies)
}

async fn handle_get_session(
    State(ctx): State<Arc<AccessContext>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let cookies = cookie_header(&headers);
    Json(routes::session::handle_get_session(ctx, cookies.as_deref()).await)
}

async fn handle_check_access(
    State(ctx): State<Arc<AccessContext>>,
    Query(query): Query<DeviceQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let result = routes::access::handle_check_access(ctx, query.device_id.as_deref()).await?;
    Ok(Json(result))
}

async fn handle_live_access(
    State(ctx): State<Arc<AccessContext>>,
    headers: HeaderMap,
    Query(query): Query<DeviceQuery>,
) -> Result<impl IntoResponse, HttpError> {
    let cookies = cookie_header(&headers);
    let result =
        routes::access::handle_live_access(ctx, cookies.as_deref(), query.device_id.as_deref())
            .await?;
    Ok(Json(result))
}

async fn handle_create_invoice(
    State(ctx): State<Arc<AccessContext>>,
    headers: HeaderMap,
    JsonBody(body): JsonBody<routes::invoice::CreateInvoiceRequest>,
) -> Result<impl IntoResponse, HttpError> {
    let cookies = cookie_header(&headers);
    let result = routes::invoice::handle_create_invoice(ctx, body, cookies.as_deref()).await?;
    Ok(Json(result))
}

/// Always 200 with the literal ack, whatever happened.
async fn handle_payment_callback(
    State(ctx): State<Arc<AccessContext>>,
    uri: Uri,
) -> impl IntoResponse {
    // A malformed query string still gets the ack.
    let payment_id = Query::<CallbackQuery>::try_from_uri(&uri)
        .ok()
        .and_then(|Query(q)| q.payment_id);
    let ack = routes::payment_callback::handle_payment_callback(ctx, payment_id.as_deref()).await;
    (StatusCode::OK, ack)
}

// ─── Tests ──────────────────────────────────────────────────────
