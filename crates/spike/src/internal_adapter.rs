// Internal adapter: typed operations over the raw document `Adapter`.
//
// Every write the policy layer performs is a single adapter call, so it is
// atomic at document granularity on every backend.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use spike_core::db::adapter::{Adapter, WhereClause};
use spike_core::db::models::{
    DEVICE_ACCESS_MODEL, DeviceAccessGrant, INVOICE_MODEL, Invoice, InvoiceStatus, USER_MODEL,
    UNIQUE_INDEXES, User,
};
use spike_core::error::SpikeError;

/// Store access error.
#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found")]
    NotFound,

    #[error("Duplicate record: {0}")]
    Duplicate(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<SpikeError> for AdapterError {
    fn from(e: SpikeError) -> Self {
        match e {
            SpikeError::Duplicate(what) => Self::Duplicate(what),
            other => Self::Database(other.to_string()),
        }
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// High-level store operations used by the routes.
#[async_trait]
pub trait InternalAdapter: Send + Sync + std::fmt::Debug {
    /// Create the backend's unique indexes.
    async fn init(&self) -> Result<(), AdapterError>;

    // ─── Users ───────────────────────────────────────────────────

    /// Insert a user. A taken username yields `AdapterError::Duplicate`.
    async fn create_user(&self, user: &User) -> Result<User, AdapterError>;

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AdapterError>;

    /// Exact, case-sensitive match.
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AdapterError>;

    /// Bind `device_id` as the user's only active device for `today`.
    async fn bind_device(
        &self,
        user_id: &str,
        device_id: &str,
        today: NaiveDate,
    ) -> Result<User, AdapterError>;

    /// Replace the user's subscription end.
    async fn set_pro_expires(
        &self,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<User, AdapterError>;

    // ─── Device grants ───────────────────────────────────────────

    async fn find_device_access(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceAccessGrant>, AdapterError>;

    /// Create the device's grant or replace its `expiresAt`.
    async fn upsert_device_access(
        &self,
        device_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<DeviceAccessGrant, AdapterError>;

    // ─── Invoices ────────────────────────────────────────────────

    async fn create_invoice(&self, invoice: &Invoice) -> Result<Invoice, AdapterError>;

    async fn find_invoice_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Invoice>, AdapterError>;

    async fn set_gateway_invoice_id(
        &self,
        invoice_id: &str,
        gateway_invoice_id: &str,
    ) -> Result<(), AdapterError>;

    /// Flip an invoice from `pending` to `paid`.
    ///
    /// Returns `None` when no pending invoice has this reference, which is
    /// how a replayed callback is recognised.
    async fn claim_invoice(
        &self,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, AdapterError>;

    /// Undo [`claim_invoice`](Self::claim_invoice): a `paid` invoice goes
    /// back to `pending` so the next callback can grant again. Returns
    /// whether an invoice was released.
    async fn release_invoice(&self, reference: &str) -> Result<bool, AdapterError>;
}

/// Internal adapter backed by any raw [`Adapter`].
#[derive(Debug)]
pub struct ConcreteInternalAdapter {
    adapter: Arc<dyn Adapter>,
}

fn to_doc<T: Serialize>(value: &T) -> Result<Value, AdapterError> {
    Ok(serde_json::to_value(value)?)
}

fn from_doc<T: DeserializeOwned>(doc: Value) -> Result<T, AdapterError> {
    Ok(serde_json::from_value(doc)?)
}

fn from_opt_doc<T: DeserializeOwned>(doc: Option<Value>) -> Result<Option<T>, AdapterError> {
    doc.map(from_doc).transpose()
}

impl ConcreteInternalAdapter {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self { adapter }
    }

    async fn update_user(&self, user_id: &str, data: Value) -> Result<User, AdapterError> {
        let doc = self
            .adapter
            .update(USER_MODEL, &[WhereClause::eq("id", user_id)], data)
            .await?
            .ok_or(AdapterError::NotFound)?;
        from_doc(doc)
    }
}

#[async_trait]
impl InternalAdapter for ConcreteInternalAdapter {
    async fn init(&self) -> Result<(), AdapterError> {
        self.adapter.ensure_indexes(UNIQUE_INDEXES).await?;
        Ok(())
    }

    async fn create_user(&self, user: &User) -> Result<User, AdapterError> {
        let doc = self.adapter.create(USER_MODEL, to_doc(user)?).await?;
        from_doc(doc)
    }

    async fn find_user_by_id(&self, id: &str) -> Result<Option<User>, AdapterError> {
        let doc = self
            .adapter
            .find_one(USER_MODEL, &[WhereClause::eq("id", id)])
            .await?;
        from_opt_doc(doc)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AdapterError> {
        let doc = self
            .adapter
            .find_one(USER_MODEL, &[WhereClause::eq("username", username)])
            .await?;
        from_opt_doc(doc)
    }

    async fn bind_device(
        &self,
        user_id: &str,
        device_id: &str,
        today: NaiveDate,
    ) -> Result<User, AdapterError> {
        self.update_user(
            user_id,
            json!({
                "activeDeviceId": device_id,
                "lastLoginDate": today,
                "updatedAt": Utc::now(),
            }),
        )
        .await
    }

    async fn set_pro_expires(
        &self,
        user_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<User, AdapterError> {
        self.update_user(
            user_id,
            json!({
                "proExpires": expires_at,
                "updatedAt": Utc::now(),
            }),
        )
        .await
    }

    async fn find_device_access(
        &self,
        device_id: &str,
    ) -> Result<Option<DeviceAccessGrant>, AdapterError> {
        let doc = self
            .adapter
            .find_one(DEVICE_ACCESS_MODEL, &[WhereClause::eq("deviceId", device_id)])
            .await?;
        from_opt_doc(doc)
    }

    async fn upsert_device_access(
        &self,
        device_id: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<DeviceAccessGrant, AdapterError> {
        let now = Utc::now();
        let existing = self.find_device_access(device_id).await?;
        let created_at = existing.map_or(now, |g| g.created_at);

        let doc = self
            .adapter
            .upsert(
                DEVICE_ACCESS_MODEL,
                &[WhereClause::eq("deviceId", device_id)],
                json!({
                    "deviceId": device_id,
                    "expiresAt": expires_at,
                    "createdAt": created_at,
                    "updatedAt": now,
                }),
            )
            .await?;
        from_doc(doc)
    }

    async fn create_invoice(&self, invoice: &Invoice) -> Result<Invoice, AdapterError> {
        let doc = self.adapter.create(INVOICE_MODEL, to_doc(invoice)?).await?;
        from_doc(doc)
    }

    async fn find_invoice_by_reference(
        &self,
        reference: &str,
    ) -> Result<Option<Invoice>, AdapterError> {
        let doc = self
            .adapter
            .find_one(INVOICE_MODEL, &[WhereClause::eq("reference", reference)])
            .await?;
        from_opt_doc(doc)
    }

    async fn set_gateway_invoice_id(
        &self,
        invoice_id: &str,
        gateway_invoice_id: &str,
    ) -> Result<(), AdapterError> {
        self.adapter
            .update(
                INVOICE_MODEL,
                &[WhereClause::eq("id", invoice_id)],
                json!({ "gatewayInvoiceId": gateway_invoice_id }),
            )
            .await?
            .ok_or(AdapterError::NotFound)?;
        Ok(())
    }

    async fn claim_invoice(
        &self,
        reference: &str,
        paid_at: DateTime<Utc>,
    ) -> Result<Option<Invoice>, AdapterError> {
        let doc = self
            .adapter
            .update(
                INVOICE_MODEL,
                &[
                    WhereClause::eq("reference", reference),
                    WhereClause::eq("status", InvoiceStatus::Pending.as_str()),
                ],
                json!({
                    "status": InvoiceStatus::Paid,
                    "paidAt": paid_at,
                }),
            )
            .await?;
        from_opt_doc(doc)
    }

    async fn release_invoice(&self, reference: &str) -> Result<bool, AdapterError> {
        let doc = self
            .adapter
            .update(
                INVOICE_MODEL,
                &[
                    WhereClause::eq("reference", reference),
                    WhereClause::eq("status", InvoiceStatus::Paid.as_str()),
                ],
                json!({
                    "status": InvoiceStatus::Pending,
                    "paidAt": null,
                }),
            )
            .await?;
        Ok(doc.is_some())
    }
}
