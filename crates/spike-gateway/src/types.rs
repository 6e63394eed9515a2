//! Gateway request and response types.
//!
//! Wire structs use the gateway's snake_case field names.

use serde::{Deserialize, Serialize};

/// Response of `POST /auth/token`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// What the caller wants invoiced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceRequest {
    /// Our correlation key; echoed back by `check_payment`.
    pub reference: String,
    pub amount: u64,
    pub description: String,
    pub callback_url: String,
}

/// Body of `POST /invoice`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateInvoiceBody {
    pub invoice_code: String,
    pub sender_invoice_no: String,
    pub amount: u64,
    pub description: String,
    pub callback_url: String,
}

/// Response of `POST /invoice`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedInvoice {
    pub invoice_id: String,
    pub payment_url: String,
}

/// Response of `GET /payment/{id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentCheck {
    pub payment_id: String,
    pub payment_status: String,
    /// The reference we sent as `sender_invoice_no`.
    #[serde(default)]
    pub sender_invoice_no: Option<String>,
    #[serde(default)]
    pub amount: Option<u64>,
}

/// Status string the gateway uses for a settled payment.
pub const PAID_STATUS: &str = "PAID";

impl PaymentCheck {
    pub fn is_paid(&self) -> bool {
        self.payment_status.eq_ignore_ascii_case(PAID_STATUS)
    }
}
