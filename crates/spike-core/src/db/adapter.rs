// Document store adapter trait, the seam every storage backend implements.
//
// The adapter works with `serde_json::Value` documents so backends stay
// schema-agnostic; the typed layer lives in `spike::internal_adapter`.
// Every mutating operation touches exactly one document, which is the only
// atomicity the access policies rely on.

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::SpikeError;

/// Result type for adapter operations.
pub type AdapterResult<T> = std::result::Result<T, SpikeError>;

// ─── Where Clause ────────────────────────────────────────────────

/// Comparison operators for WHERE clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
}

/// A single WHERE condition. Multiple clauses are AND-ed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WhereClause {
    pub field: String,
    pub value: serde_json::Value,
    #[serde(default)]
    pub operator: Operator,
}

impl WhereClause {
    /// Simple equality filter.
    pub fn eq(field: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }

    pub fn new(
        field: impl Into<String>,
        operator: Operator,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator,
        }
    }
}

/// A unique index the backend should enforce.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueIndex {
    pub model: &'static str,
    pub field: &'static str,
}

// ─── Adapter Trait ───────────────────────────────────────────────

#[async_trait]
pub trait Adapter: Send + Sync + fmt::Debug {
    /// Insert a document. An `id` is generated when absent.
    ///
    /// Fails with [`SpikeError::Duplicate`] when a unique index is violated.
    async fn create(&self, model: &str, data: serde_json::Value) -> AdapterResult<serde_json::Value>;

    /// First document matching every clause.
    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<Option<serde_json::Value>>;

    /// Merge `data` into the first matching document and return the result,
    /// or `None` when nothing matched. Putting the expected current value in
    /// `where_clauses` turns this into a compare-and-set.
    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<Option<serde_json::Value>>;

    /// Merge `data` into the matching document, inserting a new one built from
    /// the equality clauses plus `data` when nothing matches.
    async fn upsert(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<serde_json::Value>;

    /// Prepare backend-side structures (unique indexes). A no-op by default.
    async fn ensure_indexes(&self, indexes: &[UniqueIndex]) -> AdapterResult<()> {
        let _ = indexes;
        Ok(())
    }
}
