// Payment callback: GET /payment/callback?payment_id=...
//
// The callback only says "look at this payment". Status is always re-read
// from the gateway, and the gateway always gets a success ack so it stops
// retrying; failures are logged here instead.
//
// Replays are absorbed by claiming the invoice (pending -> paid) before
// granting: only the first claim writes an expiry. A paid reference without
// an invoice record is claimed by inserting a paid record under the unique
// reference. If the grant write fails the claim is released, so a later
// delivery of the same payment can still grant.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use spike_core::db::models::{Invoice, InvoiceStatus, Purchaser};
use spike_core::utils::generate_id;
use spike_gateway::{GatewayError, PaymentCheck};

use crate::context::AccessContext;
use crate::internal_adapter::AdapterError;
use crate::routes::invoice::parse_reference;
use crate::utils::date::add_months;

/// Literal body the gateway expects.
pub const CALLBACK_ACK: &str = "SUCCESS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// The gateway has not settled the payment yet.
    NotPaid,
    /// The invoice was already claimed by an earlier callback.
    Replay,
    /// The payment carries no reference we issued.
    UnparseableReference(Option<String>),
    /// Settled for less than the invoice asked. Nothing is granted and the
    /// invoice stays pending.
    Underpaid { expected: u64, paid: u64 },
    Granted {
        purchaser: Purchaser,
        expires_at: DateTime<Utc>,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    #[error("Payment lookup failed: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Store error: {0}")]
    Store(#[from] AdapterError),

    #[error("Expiry overflows the calendar")]
    DateOverflow,
}

/// How a paid reference was claimed.
enum Claim {
    Claimed,
    Replay,
    Underpaid { expected: u64, paid: u64 },
}

async fn claim(
    ctx: &AccessContext,
    payment: &PaymentCheck,
    reference: &str,
    purchaser: &Purchaser,
    months: u32,
    now: DateTime<Utc>,
) -> Result<Claim, AdapterError> {
    if let Some(invoice) = ctx.adapter.claim_invoice(reference, now).await? {
        match payment.amount {
            Some(paid) if paid < invoice.amount => {
                ctx.adapter.release_invoice(reference).await?;
                return Ok(Claim::Underpaid { expected: invoice.amount, paid });
            }
            Some(paid) if paid > invoice.amount => {
                tracing::warn!(
                    payment_id = %payment.payment_id,
                    expected = invoice.amount,
                    paid,
                    "Payment exceeds the invoice amount"
                );
            }
            _ => {}
        }
        return Ok(Claim::Claimed);
    }

    if ctx.adapter.find_invoice_by_reference(reference).await?.is_some() {
        return Ok(Claim::Replay);
    }

    tracing::warn!(
        payment_id = %payment.payment_id,
        reference,
        "Paid reference has no invoice record; recording it"
    );
    let record = Invoice {
        id: generate_id(),
        reference: reference.to_string(),
        gateway_invoice_id: None,
        purchaser: purchaser.clone(),
        months,
        amount: payment
            .amount
            .or_else(|| ctx.options.payment.price_for(months))
            .unwrap_or_default(),
        status: InvoiceStatus::Paid,
        created_at: now,
        paid_at: Some(now),
    };
    match ctx.adapter.create_invoice(&record).await {
        Ok(_) => Ok(Claim::Claimed),
        // A concurrent delivery recorded it first.
        Err(AdapterError::Duplicate(_)) => Ok(Claim::Replay),
        Err(e) => Err(e),
    }
}

async fn grant(
    ctx: &AccessContext,
    purchaser: &Purchaser,
    expires_at: DateTime<Utc>,
) -> Result<(), AdapterError> {
    match purchaser {
        Purchaser::Device(device_id) => {
            ctx.adapter.upsert_device_access(device_id, expires_at).await?;
        }
        Purchaser::User(user_id) => {
            ctx.adapter.set_pro_expires(user_id, expires_at).await?;
        }
    }
    Ok(())
}

/// Verify `payment_id` with the gateway and grant what it paid for.
pub async fn reconcile_payment(
    ctx: &AccessContext,
    payment_id: &str,
) -> Result<ReconcileOutcome, ReconcileError> {
    let payment = ctx.gateway.check_payment(payment_id).await?;
    if !payment.is_paid() {
        tracing::info!(
            payment_id,
            status = %payment.payment_status,
            "Payment not settled yet"
        );
        return Ok(ReconcileOutcome::NotPaid);
    }

    let reference = payment.sender_invoice_no.clone();
    let Some((purchaser, months)) = reference.as_deref().and_then(parse_reference) else {
        return Ok(ReconcileOutcome::UnparseableReference(reference));
    };
    let reference = reference.unwrap_or_default();

    let now = Utc::now();
    let expires_at = add_months(now, months).ok_or(ReconcileError::DateOverflow)?;

    match claim(ctx, &payment, &reference, &purchaser, months, now).await? {
        Claim::Claimed => {}
        Claim::Replay => return Ok(ReconcileOutcome::Replay),
        Claim::Underpaid { expected, paid } => {
            return Ok(ReconcileOutcome::Underpaid { expected, paid });
        }
    }

    if let Err(e) = grant(ctx, &purchaser, expires_at).await {
        match ctx.adapter.release_invoice(&reference).await {
            Ok(_) => tracing::warn!(payment_id, reference = %reference, "Grant failed; invoice released"),
            Err(release) => tracing::error!(
                payment_id,
                reference = %reference,
                error = %release,
                "Grant failed and the invoice could not be released"
            ),
        }
        return Err(e.into());
    }

    tracing::info!(
        payment_id,
        purchaser = ?purchaser,
        months,
        expires_at = %expires_at,
        "Payment reconciled"
    );
    Ok(ReconcileOutcome::Granted { purchaser, expires_at })
}

/// Always acknowledges; the outcome only reaches the logs.
pub async fn handle_payment_callback(
    ctx: Arc<AccessContext>,
    payment_id: Option<&str>,
) -> &'static str {
    let Some(payment_id) = payment_id.map(str::trim).filter(|p| !p.is_empty()) else {
        tracing::warn!("Payment callback without a payment id");
        return CALLBACK_ACK;
    };

    match reconcile_payment(&ctx, payment_id).await {
        Ok(ReconcileOutcome::Replay) => {
            tracing::info!(payment_id, "Ignoring replayed payment callback");
        }
        Ok(ReconcileOutcome::UnparseableReference(reference)) => {
            tracing::error!(payment_id, reference = ?reference, "Paid payment has an unknown reference");
        }
        Ok(ReconcileOutcome::Underpaid { expected, paid }) => {
            tracing::error!(payment_id, expected, paid, "Payment is short of the invoice amount; not granted");
        }
        Ok(_) => {}
        Err(e) => {
            tracing::error!(payment_id, error = %e, "Payment reconciliation failed");
        }
    }
    CALLBACK_ACK
}
