// Invoice creation: POST /payment/invoice
//
// Buys `months` of access for a device, or for the signed-in account when no
// device id is given. The price comes only from the configured tiers; the
// request cannot name an amount.
//
// The reference sent to the gateway encodes what was bought:
//
//   <kind>:<months>:<nonce>:<id>
//
// kind is `dev` or `usr`; the id goes last so it may itself contain ':'.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};

use spike_core::db::models::{Invoice, InvoiceStatus, Purchaser};
use spike_core::error::{ApiError, ErrorCode};
use spike_core::utils::generate_id;
use spike_gateway::InvoiceRequest;

use crate::context::AccessContext;
use crate::crypto::random::generate_random_string;
use crate::routes::session::resolve_session;
use crate::routes::{store_failure, upstream_failure};

const DEVICE_KIND: &str = "dev";
const USER_KIND: &str = "usr";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceRequest {
    pub months: u32,
    #[serde(default)]
    pub device_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateInvoiceResponse {
    pub invoice_id: String,
    pub payment_url: String,
    pub reference: String,
    pub amount: u64,
    pub months: u32,
}

fn to_base36(mut n: u64) -> String {
    const DIGITS: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
    if n == 0 {
        return "0".to_string();
    }
    let mut out = Vec::new();
    while n > 0 {
        out.push(DIGITS[(n % 36) as usize]);
        n /= 36;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}

/// Build a fresh reference for this purchase.
pub fn build_reference(purchaser: &Purchaser, months: u32) -> String {
    let kind = match purchaser {
        Purchaser::Device(_) => DEVICE_KIND,
        Purchaser::User(_) => USER_KIND,
    };
    let millis = Utc::now().timestamp_millis().max(0) as u64;
    let nonce = format!("{}{}", to_base36(millis), generate_random_string(8));
    format!("{kind}:{months}:{nonce}:{}", purchaser.id())
}

/// Recover the purchaser and duration from a reference.
pub fn parse_reference(reference: &str) -> Option<(Purchaser, u32)> {
    let mut parts = reference.splitn(4, ':');
    let kind = parts.next()?;
    let months = parts.next()?.parse::<u32>().ok().filter(|m| *m > 0)?;
    let nonce = parts.next()?;
    let id = parts.next().filter(|id| !id.is_empty())?;
    if nonce.is_empty() {
        return None;
    }

    let purchaser = match kind {
        DEVICE_KIND => Purchaser::Device(id.to_string()),
        USER_KIND => Purchaser::User(id.to_string()),
        _ => return None,
    };
    Some((purchaser, months))
}

pub async fn handle_create_invoice(
    ctx: Arc<AccessContext>,
    body: CreateInvoiceRequest,
    cookie_header: Option<&str>,
) -> Result<CreateInvoiceResponse, ApiError> {
    let amount = ctx
        .options
        .payment
        .price_for(body.months)
        .ok_or_else(|| ApiError::bad_request(ErrorCode::UnsupportedDuration))?;

    let device_id = body
        .device_id
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty());
    let purchaser = match device_id {
        Some(device_id) => Purchaser::Device(device_id.to_string()),
        None => match resolve_session(&ctx, cookie_header).await.user() {
            Some(session) => Purchaser::User(session.user_id.clone()),
            None => return Err(ApiError::bad_request(ErrorCode::DeviceIdRequired)),
        },
    };

    let invoice = Invoice {
        id: generate_id(),
        reference: build_reference(&purchaser, body.months),
        gateway_invoice_id: None,
        purchaser,
        months: body.months,
        amount,
        status: InvoiceStatus::Pending,
        created_at: Utc::now(),
        paid_at: None,
    };
    let invoice = ctx
        .adapter
        .create_invoice(&invoice)
        .await
        .map_err(|e| store_failure("Invoice creation failed", e))?;

    let request = InvoiceRequest {
        reference: invoice.reference.clone(),
        amount,
        description: ctx.options.payment.description.clone(),
        callback_url: ctx.callback_url(),
    };
    let created = ctx.gateway.create_invoice(&request).await.map_err(|e| {
        upstream_failure(
            ErrorCode::PaymentGatewayError,
            "Gateway invoice creation failed",
            e,
        )
    })?;

    if let Err(e) = ctx
        .adapter
        .set_gateway_invoice_id(&invoice.id, &created.invoice_id)
        .await
    {
        tracing::warn!(invoice_id = %invoice.id, error = %e, "Failed to record gateway invoice id");
    }

    tracing::info!(
        invoice_id = %invoice.id,
        reference = %invoice.reference,
        months = invoice.months,
        amount,
        "Invoice created"
    );
    Ok(CreateInvoiceResponse {
        invoice_id: invoice.id,
        payment_url: created.payment_url,
        reference: invoice.reference,
        amount,
        months: invoice.months,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::tests::{FakeGateway, TEST_SECRET, test_ctx, test_ctx_with};
    use crate::routes::session::create_session_token;
    use spike_core::db::models::User;
    use spike_core::error::HttpStatus;
    use spike_core::options::SpikeOptions;

    #[test]
    fn test_reference_round_trip() {
        let reference = build_reference(&Purchaser::Device("dev-123".into()), 6);
        assert!(reference.starts_with("dev:6:"));
        assert!(reference.ends_with(":dev-123"));
        assert_eq!(
            parse_reference(&reference),
            Some((Purchaser::Device("dev-123".into()), 6))
        );
    }

    #[test]
    fn test_reference_id_may_contain_colons() {
        let id = "mac:aa:bb:cc";
        let reference = build_reference(&Purchaser::User(id.into()), 1);
        assert_eq!(parse_reference(&reference), Some((Purchaser::User(id.into()), 1)));
    }

    #[test]
    fn test_references_are_unique() {
        let p = Purchaser::Device("d".into());
        assert_ne!(build_reference(&p, 1), build_reference(&p, 1));
    }

    #[test]
    fn test_parse_reference_rejects_junk() {
        for junk in ["", "dev", "dev:1", "dev:1:n", "dev:1:n:", "xyz:1:n:id", "dev:0:n:id", "dev:x:n:id", "dev:1::id"] {
            assert!(parse_reference(junk).is_none(), "{junk}");
        }
    }

    #[test]
    fn test_base36() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
    }

    #[tokio::test]
    async fn test_create_device_invoice() {
        let (ctx, gateway) = test_ctx().await;
        let response = handle_create_invoice(
            ctx.clone(),
            CreateInvoiceRequest { months: 6, device_id: Some("dev-123".into()) },
            None,
        )
        .await
        .unwrap();
        assert_eq!(response.amount, 50_000);
        assert_eq!(response.payment_url, "https://pay.example/1");

        let sent = gateway.invoices.lock().unwrap()[0].clone();
        assert_eq!(sent.reference, response.reference);
        assert_eq!(sent.amount, 50_000);
        assert_eq!(sent.description, "Live stream access");
        assert_eq!(sent.callback_url, "/api/payment/callback");

        let stored = ctx
            .adapter
            .find_invoice_by_reference(&response.reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.status, InvoiceStatus::Pending);
        assert_eq!(stored.purchaser, Purchaser::Device("dev-123".into()));
        assert_eq!(stored.gateway_invoice_id.as_deref(), Some("gw-1"));
    }

    #[tokio::test]
    async fn test_unsupported_duration() {
        let (ctx, gateway) = test_ctx().await;
        let err = handle_create_invoice(
            ctx,
            CreateInvoiceRequest { months: 3, device_id: Some("dev-1".into()) },
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, HttpStatus::BadRequest);
        assert_eq!(err.code, ErrorCode::UnsupportedDuration);
        assert!(gateway.invoices.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_user_invoice_needs_session() {
        let (ctx, _) = test_ctx().await;
        let err = handle_create_invoice(
            ctx.clone(),
            CreateInvoiceRequest { months: 1, device_id: None },
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::DeviceIdRequired);

        let user = User::new("u1".into(), "fan".into(), "x:y".into());
        ctx.adapter.create_user(&user).await.unwrap();
        let token = create_session_token(&ctx, &user, "phone").unwrap();
        let cookie = format!("{}={}", ctx.session_cookie.name, token);
        let response = handle_create_invoice(
            ctx,
            CreateInvoiceRequest { months: 12, device_id: None },
            Some(&cookie),
        )
        .await
        .unwrap();
        assert!(response.reference.starts_with("usr:12:"));
        assert!(response.reference.ends_with(":u1"));
        assert_eq!(response.amount, 90_000);
    }

    #[tokio::test]
    async fn test_gateway_failure_is_generic_500() {
        let gateway = Arc::new(FakeGateway { fail: true, ..Default::default() });
        let ctx = test_ctx_with(SpikeOptions::new(TEST_SECRET), gateway).await;
        let err = handle_create_invoice(
            ctx,
            CreateInvoiceRequest { months: 1, device_id: Some("dev-1".into()) },
            None,
        )
        .await
        .unwrap_err();
        assert_eq!(err.status, HttpStatus::InternalServerError);
        assert_eq!(err.code, ErrorCode::PaymentGatewayError);
        assert!(!err.message.contains("refused"));
    }
}
