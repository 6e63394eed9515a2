// In-memory document store implementing the core Adapter trait.
//
// Documents live in `HashMap<String, Vec<serde_json::Value>>` keyed by model
// name. Every operation takes the single `tokio::sync::RwLock` once, so each
// create/update/upsert is atomic with respect to the others.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use spike_core::db::adapter::{Adapter, AdapterResult, Operator, UniqueIndex, WhereClause};
use spike_core::error::SpikeError;
use spike_core::utils::generate_id;

type Collections = HashMap<String, Vec<Value>>;

#[derive(Debug, Default)]
struct Store {
    collections: Collections,
    unique: Vec<UniqueIndex>,
}

impl Store {
    /// Name of the first unique field `candidate` would collide on, ignoring
    /// the document at `skip`.
    fn conflict(&self, model: &str, candidate: &Value, skip: Option<usize>) -> Option<&'static str> {
        let docs = self.collections.get(model)?;
        self.unique
            .iter()
            .filter(|idx| idx.model == model)
            .find(|idx| {
                let value = match candidate.get(idx.field) {
                    Some(v) if !v.is_null() => v,
                    _ => return false,
                };
                docs.iter()
                    .enumerate()
                    .any(|(i, d)| Some(i) != skip && d.get(idx.field) == Some(value))
            })
            .map(|idx| idx.field)
    }
}

/// In-memory adapter. Clones share the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryAdapter {
    store: Arc<RwLock<Store>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl MemoryAdapter {
    async fn dump(&self, model: &str) -> Vec<Value> {
        self.store
            .read()
            .await
            .collections
            .get(model)
            .cloned()
            .unwrap_or_default()
    }

    async fn model_count(&self, model: &str) -> usize {
        self.store
            .read()
            .await
            .collections
            .get(model)
            .map(|v| v.len())
            .unwrap_or(0)
    }

    async fn clear(&self) {
        self.store.write().await.collections.clear();
    }
}

/// Check if a document matches every clause.
fn matches_where(doc: &Value, clauses: &[WhereClause]) -> bool {
    clauses.iter().all(|clause| {
        let field_val = doc.get(&clause.field).unwrap_or(&Value::Null);
        match_operator(field_val, &clause.value, clause.operator)
    })
}

fn match_operator(field_val: &Value, target: &Value, op: Operator) -> bool {
    match op {
        Operator::Eq => field_val == target,
        Operator::Ne => field_val != target,
        Operator::Lt => compare_json(field_val, target) == Some(Ordering::Less),
        Operator::Lte => matches!(compare_json(field_val, target), Some(Ordering::Less | Ordering::Equal)),
        Operator::Gt => compare_json(field_val, target) == Some(Ordering::Greater),
        Operator::Gte => matches!(compare_json(field_val, target), Some(Ordering::Greater | Ordering::Equal)),
    }
}

/// Numbers compare numerically, strings lexicographically, anything else is
/// incomparable.
fn compare_json(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(an), Value::Number(bn)) => an.as_f64()?.partial_cmp(&bn.as_f64()?),
        (Value::String(a_s), Value::String(b_s)) => Some(a_s.cmp(b_s)),
        _ => None,
    }
}

fn merge_update(doc: &mut Value, data: &Value) {
    if let (Some(doc_obj), Some(data_obj)) = (doc.as_object_mut(), data.as_object()) {
        for (k, v) in data_obj {
            doc_obj.insert(k.clone(), v.clone());
        }
    }
}

fn require_object(model: &str, data: &Value) -> AdapterResult<()> {
    if data.is_object() {
        Ok(())
    } else {
        Err(SpikeError::Database(format!("{model}: document must be a JSON object")))
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    async fn create(&self, model: &str, data: Value) -> AdapterResult<Value> {
        require_object(model, &data)?;
        let mut doc = data;
        if doc.get("id").map_or(true, Value::is_null) {
            merge_update(&mut doc, &serde_json::json!({ "id": generate_id() }));
        }

        let mut store = self.store.write().await;
        if let Some(field) = store.conflict(model, &doc, None) {
            return Err(SpikeError::Duplicate(format!("{model}.{field}")));
        }
        store
            .collections
            .entry(model.to_string())
            .or_default()
            .push(doc.clone());
        Ok(doc)
    }

    async fn find_one(&self, model: &str, where_clauses: &[WhereClause]) -> AdapterResult<Option<Value>> {
        let store = self.store.read().await;
        Ok(store
            .collections
            .get(model)
            .and_then(|docs| docs.iter().find(|d| matches_where(d, where_clauses)))
            .cloned())
    }

    async fn update(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: Value,
    ) -> AdapterResult<Option<Value>> {
        require_object(model, &data)?;
        let mut store = self.store.write().await;
        let pos = match store
            .collections
            .get(model)
            .and_then(|docs| docs.iter().position(|d| matches_where(d, where_clauses)))
        {
            Some(pos) => pos,
            None => return Ok(None),
        };

        if let Some(field) = store.conflict(model, &data, Some(pos)) {
            return Err(SpikeError::Duplicate(format!("{model}.{field}")));
        }
        let docs = store
            .collections
            .get_mut(model)
            .ok_or_else(|| SpikeError::Database(format!("{model}: collection vanished")))?;
        merge_update(&mut docs[pos], &data);
        Ok(Some(docs[pos].clone()))
    }

    async fn upsert(
        &self,
        model: &str,
        where_clauses: &[WhereClause],
        data: Value,
    ) -> AdapterResult<Value> {
        require_object(model, &data)?;
        let mut store = self.store.write().await;
        let docs = store.collections.entry(model.to_string()).or_default();

        if let Some(doc) = docs.iter_mut().find(|d| matches_where(d, where_clauses)) {
            merge_update(doc, &data);
            return Ok(doc.clone());
        }

        let mut doc = serde_json::Map::new();
        for clause in where_clauses.iter().filter(|c| c.operator == Operator::Eq) {
            doc.insert(clause.field.clone(), clause.value.clone());
        }
        let mut doc = Value::Object(doc);
        merge_update(&mut doc, &data);
        if doc.get("id").is_none() {
            merge_update(&mut doc, &serde_json::json!({ "id": generate_id() }));
        }
        docs.push(doc.clone());
        Ok(doc)
    }

    async fn ensure_indexes(&self, indexes: &[UniqueIndex]) -> AdapterResult<()> {
        let mut store = self.store.write().await;
        for idx in indexes {
            if !store.unique.contains(idx) {
                store.unique.push(idx.clone());
            }
        }
        Ok(())
    }
}
