// Persisted documents: users, device access grants and payment invoices.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::db::adapter::UniqueIndex;

pub const USER_MODEL: &str = "user";
pub const DEVICE_ACCESS_MODEL: &str = "deviceAccess";
pub const INVOICE_MODEL: &str = "invoice";

/// Unique keys every backend must enforce.
pub const UNIQUE_INDEXES: &[UniqueIndex] = &[
    UniqueIndex { model: USER_MODEL, field: "username" },
    UniqueIndex { model: DEVICE_ACCESS_MODEL, field: "deviceId" },
    UniqueIndex { model: INVOICE_MODEL, field: "reference" },
];

/// A registered account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    /// scrypt hash in `hex(salt):hex(key)` form.
    pub password_hash: String,
    /// The single device currently allowed to hold this account's session.
    #[serde(default)]
    pub active_device_id: Option<String>,
    /// Calendar day of the last successful login.
    #[serde(default)]
    pub last_login_date: Option<NaiveDate>,
    /// Subscription end; the account is entitled while this is in the future.
    #[serde(default)]
    pub pro_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: String, username: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            username,
            password_hash,
            active_device_id: None,
            last_login_date: None,
            pro_expires: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_entitled_at(&self, now: DateTime<Utc>) -> bool {
        self.pro_expires.is_some_and(|exp| exp > now)
    }
}

/// Paid viewing rights for an anonymous device.
///
/// A grant whose `expires_at` has passed is treated exactly like a missing
/// one; expired grants are never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceAccessGrant {
    pub device_id: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DeviceAccessGrant {
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Who a payment grants access to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum Purchaser {
    Device(String),
    User(String),
}

impl Purchaser {
    pub fn id(&self) -> &str {
        match self {
            Purchaser::Device(id) | Purchaser::User(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Paid,
}

impl InvoiceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InvoiceStatus::Pending => "pending",
            InvoiceStatus::Paid => "paid",
        }
    }
}

/// A payment request sent to the gateway, keyed by its `reference`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invoice {
    pub id: String,
    pub reference: String,
    #[serde(default)]
    pub gateway_invoice_id: Option<String>,
    pub purchaser: Purchaser,
    pub months: u32,
    pub amount: u64,
    pub status: InvoiceStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub paid_at: Option<DateTime<Utc>>,
}
