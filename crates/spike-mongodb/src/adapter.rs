// MongoAdapter: the core Adapter trait over MongoDB.
//
// Models map to collections and `id` to `_id`. Updates and upserts go
// through `findOneAndUpdate`, so each is a single-document atomic operation
// that hands back the post-image.

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::{IndexOptions, ReturnDocument};
use mongodb::{Client, Collection, Database, IndexModel};

use spike_core::db::adapter::{Adapter, AdapterResult, UniqueIndex, WhereClause};
use spike_core::error::SpikeError;
use spike_core::utils::generate_id;

use crate::query;

const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Clone)]
pub struct MongoAdapter {
    db: Database,
}

impl MongoAdapter {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Connect to `uri` and use `db_name`.
    pub async fn connect(uri: &str, db_name: &str) -> Result<Self, SpikeError> {
        let client = Client::with_uri_str(uri)
            .await
            .map_err(|e| SpikeError::Database(format!("MongoDB connection failed: {e}")))?;
        Ok(Self {
            db: client.database(db_name),
        })
    }

    /// Round-trip to the server (used by startup checks).
    pub async fn ping(&self) -> Result<(), SpikeError> {
        self.db
            .run_command(doc! { "ping": 1 })
            .await
            .map(|_| ())
            .map_err(|e| SpikeError::Database(format!("MongoDB ping failed: {e}")))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    fn collection(&self, model: &str) -> Collection<Document> {
        self.db.collection(model)
    }
}

fn is_duplicate_key(e: &mongodb::error::Error) -> bool {
    match e.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(we)) => we.code == DUPLICATE_KEY,
        ErrorKind::Command(ce) => ce.code == DUPLICATE_KEY,
        _ => false,
    }
}

fn map_err(model: &str, op: &str, e: mongodb::error::Error) -> SpikeError {
    if is_duplicate_key(&e) {
        SpikeError::Duplicate(format!("{model}: {e}"))
    } else {
        SpikeError::Database(format!("MongoDB {op} on {model} failed: {e}"))
    }
}

#[async_trait]
impl Adapter for MongoAdapter {
    async fn create(&self, model: &str, data: serde_json::Value) -> AdapterResult<serde_json::Value> {
        let mut data = data;
        let obj = data
            .as_object_mut()
            .ok_or_else(|| SpikeError::Database(format!("{model}: document must be a JSON object")))?;
        if obj.get("id").map_or(true, serde_json::Value::is_null) {
            obj.insert("id".to_string(), serde_json::Value::String(generate_id()));
        }

        self.collection(model)
            .insert_one(query::build_insert_doc(&data))
            .await
            .map_err(|e| map_err(model, "insert", e))?;
        Ok(data)
    }

    async fn find_one(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
    ) -> AdapterResult<Option<serde_json::Value>> {
        let found = self
            .collection(model)
            .find_one(query::build_filter(where_clauses))
            .await
            .map_err(|e| map_err(model, "find_one", e))?;
        Ok(found.map(|doc| query::doc_to_json(&doc)))
    }

    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<Option<serde_json::Value>> {
        let updated = self
            .collection(model)
            .find_one_and_update(query::build_filter(where_clauses), query::build_update_doc(&data))
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_err(model, "update", e))?;
        Ok(updated.map(|doc| query::doc_to_json(&doc)))
    }

    async fn upsert(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: serde_json::Value,
    ) -> AdapterResult<serde_json::Value> {
        let update = query::build_upsert_doc(&data, &generate_id());
        let doc = self
            .collection(model)
            .find_one_and_update(query::build_filter(where_clauses), update)
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await
            .map_err(|e| map_err(model, "upsert", e))?
            .ok_or_else(|| SpikeError::Database(format!("MongoDB upsert on {model} returned nothing")))?;
        Ok(query::doc_to_json(&doc))
    }

    async fn ensure_indexes(&self, indexes: &[UniqueIndex]) -> AdapterResult<()> {
        for idx in indexes {
            let field = idx.field;
            let model = IndexModel::builder()
                .keys(doc! { field: 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build();
            self.collection(idx.model)
                .create_index(model)
                .await
                .map_err(|e| map_err(idx.model, "create_index", e))?;
            tracing::debug!(model = idx.model, field = idx.field, "Unique index ensured");
        }
        Ok(())
    }
}
