//! Gateway client integration tests.
//!
//! Runs `HttpPaymentGateway` against a local Axum server that speaks the
//! gateway's wire contract.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};

use spike_gateway::*;

const CLIENT_ID: &str = "league";
const CLIENT_SECRET: &str = "s3cret";

#[derive(Default)]
struct FakeGateway {
    token_calls: AtomicUsize,
    /// The only bearer token the fake currently accepts.
    current_token: Mutex<String>,
    invoices: Mutex<Vec<Value>>,
}

impl FakeGateway {
    fn rotate_token(&self, token: &str) {
        *self.current_token.lock().unwrap() = token.to_string();
    }

    fn authorized(&self, headers: &HeaderMap) -> bool {
        let expected = format!("Bearer {}", self.current_token.lock().unwrap());
        headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v == expected)
    }
}

type Shared = Arc<FakeGateway>;

async fn token(State(state): State<Shared>, headers: HeaderMap) -> Response {
    let expected = format!(
        "Basic {}",
        STANDARD.encode(format!("{CLIENT_ID}:{CLIENT_SECRET}"))
    );
    let auth = headers.get("authorization").and_then(|v| v.to_str().ok());
    if auth != Some(expected.as_str()) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    state.token_calls.fetch_add(1, Ordering::SeqCst);
    let token = state.current_token.lock().unwrap().clone();
    Json(json!({ "access_token": token, "expires_in": 3600 })).into_response()
}

async fn invoice(State(state): State<Shared>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if body["amount"] == 0 {
        return (StatusCode::UNPROCESSABLE_ENTITY, "amount must be positive").into_response();
    }
    let n = {
        let mut invoices = state.invoices.lock().unwrap();
        invoices.push(body);
        invoices.len()
    };
    Json(json!({
        "invoice_id": format!("inv-{n}"),
        "payment_url": format!("https://pay.example/i/inv-{n}")
    }))
    .into_response()
}

async fn payment(State(state): State<Shared>, headers: HeaderMap, Path(id): Path<String>) -> Response {
    if !state.authorized(&headers) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    if id == "slow" {
        tokio::time::sleep(Duration::from_secs(3)).await;
    }
    let status = if id.starts_with("paid") { "PAID" } else { "NEW" };
    Json(json!({
        "payment_id": id,
        "payment_status": status,
        "sender_invoice_no": "dev:1:abc12345:dev-123",
        "amount": 10000
    }))
    .into_response()
}

async fn start_fake() -> (String, Shared) {
    let state: Shared = Arc::new(FakeGateway::default());
    state.rotate_token("token-1");

    let app = Router::new()
        .route("/v2/auth/token", post(token))
        .route("/v2/invoice", post(invoice))
        .route("/v2/payment/{id}", get(payment))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v2"), state)
}

fn gateway(base_url: &str) -> HttpPaymentGateway {
    HttpPaymentGateway::new(GatewayOptions::new(base_url, CLIENT_ID, CLIENT_SECRET, "LEAGUE_INV"))
        .unwrap()
}

fn request(reference: &str, amount: u64) -> InvoiceRequest {
    InvoiceRequest {
        reference: reference.to_string(),
        amount,
        description: "Live stream access".to_string(),
        callback_url: "https://league.example/api/payment/callback".to_string(),
    }
}

#[tokio::test]
async fn create_invoice_sends_wire_body() {
    let (base, state) = start_fake().await;
    let gw = gateway(&base);

    let created = gw.create_invoice(&request("dev:1:abc:dev-123", 10_000)).await.unwrap();
    assert_eq!(created.invoice_id, "inv-1");
    assert_eq!(created.payment_url, "https://pay.example/i/inv-1");

    let sent = state.invoices.lock().unwrap()[0].clone();
    assert_eq!(sent["invoice_code"], "LEAGUE_INV");
    assert_eq!(sent["sender_invoice_no"], "dev:1:abc:dev-123");
    assert_eq!(sent["amount"], 10_000);
    assert_eq!(sent["callback_url"], "https://league.example/api/payment/callback");
}

#[tokio::test]
async fn token_is_fetched_once_and_reused() {
    let (base, state) = start_fake().await;
    let gw = gateway(&base);

    gw.create_invoice(&request("dev:1:a:d1", 10_000)).await.unwrap();
    gw.check_payment("paid-1").await.unwrap();
    gw.check_payment("new-1").await.unwrap();

    assert_eq!(state.token_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn check_payment_reports_status_and_reference() {
    let (base, _state) = start_fake().await;
    let gw = gateway(&base);

    let paid = gw.check_payment("paid-42").await.unwrap();
    assert!(paid.is_paid());
    assert_eq!(paid.payment_id, "paid-42");
    assert_eq!(paid.sender_invoice_no.as_deref(), Some("dev:1:abc12345:dev-123"));

    let pending = gw.check_payment("new-7").await.unwrap();
    assert!(!pending.is_paid());
}

#[tokio::test]
async fn payment_id_is_sent_as_one_segment() {
    let (base, _state) = start_fake().await;
    let gw = gateway(&base);

    let check = gw.check_payment("paid 1/../x").await.unwrap();
    assert_eq!(check.payment_id, "paid 1/../x");
}

#[tokio::test]
async fn unauthorized_drops_cached_token() {
    let (base, state) = start_fake().await;
    let gw = gateway(&base);

    gw.check_payment("paid-1").await.unwrap();
    assert!(!gw.token_cache().is_empty().await);

    // The gateway revokes the token we hold.
    state.rotate_token("token-2");
    let err = gw.check_payment("paid-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Unauthorized));
    assert!(gw.token_cache().is_empty().await);

    // Next call logs in again and succeeds.
    gw.check_payment("paid-1").await.unwrap();
    assert_eq!(state.token_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn error_status_is_surfaced() {
    let (base, _state) = start_fake().await;
    let gw = gateway(&base);

    let err = gw.create_invoice(&request("dev:1:a:d1", 0)).await.unwrap_err();
    match err {
        GatewayError::Status { status, body } => {
            assert_eq!(status, 422);
            assert!(body.contains("amount"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn bad_credentials_fail_token_fetch() {
    let (base, _state) = start_fake().await;
    let gw = HttpPaymentGateway::new(GatewayOptions::new(&base, CLIENT_ID, "wrong", "LEAGUE_INV"))
        .unwrap();

    let err = gw.check_payment("paid-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Status { status: 401, .. }));
}

#[tokio::test]
async fn slow_gateway_times_out() {
    let (base, _state) = start_fake().await;
    let gw = HttpPaymentGateway::new(
        GatewayOptions::new(&base, CLIENT_ID, CLIENT_SECRET, "LEAGUE_INV").timeout_secs(1),
    )
    .unwrap();

    let err = gw.check_payment("slow").await.unwrap_err();
    assert!(matches!(err, GatewayError::Http(_)));
}

#[tokio::test]
async fn unreachable_gateway_is_http_error() {
    let gw = gateway("http://127.0.0.1:1/v2");
    let err = gw.check_payment("paid-1").await.unwrap_err();
    assert!(matches!(err, GatewayError::Http(_)));
}
