// MongoDB query builder: converts core adapter types into BSON documents.
//
// `id` on the adapter side is `_id` in MongoDB; every conversion maps it.

use mongodb::bson::{Bson, Document, doc};

use spike_core::db::adapter::{Operator, WhereClause};

fn mongo_field(field: &str) -> &str {
    if field == "id" { "_id" } else { field }
}

/// AND all clauses into one filter document.
pub fn build_filter(clauses: &[WhereClause]) -> Document {
    let mut conditions: Vec<Document> = clauses.iter().map(clause_to_doc).collect();
    match conditions.len() {
        0 => doc! {},
        1 => conditions.remove(0),
        _ => doc! { "$and": conditions },
    }
}

fn clause_to_doc(clause: &WhereClause) -> Document {
    let field = mongo_field(&clause.field);
    let value = json_to_bson(&clause.value);

    match clause.operator {
        Operator::Eq => doc! { field: value },
        Operator::Ne => doc! { field: { "$ne": value } },
        Operator::Lt => doc! { field: { "$lt": value } },
        Operator::Lte => doc! { field: { "$lte": value } },
        Operator::Gt => doc! { field: { "$gt": value } },
        Operator::Gte => doc! { field: { "$gte": value } },
    }
}

/// Convert serde_json::Value to BSON.
pub fn json_to_bson(v: &serde_json::Value) -> Bson {
    match v {
        serde_json::Value::Null => Bson::Null,
        serde_json::Value::Bool(b) => Bson::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else if let Some(f) = n.as_f64() {
                Bson::Double(f)
            } else {
                Bson::String(n.to_string())
            }
        }
        serde_json::Value::String(s) => Bson::String(s.clone()),
        serde_json::Value::Array(arr) => Bson::Array(arr.iter().map(json_to_bson).collect()),
        serde_json::Value::Object(map) => {
            let mut doc = Document::new();
            for (k, v) in map {
                doc.insert(k.clone(), json_to_bson(v));
            }
            Bson::Document(doc)
        }
    }
}

/// Convert BSON to serde_json::Value.
pub fn bson_to_json(b: &Bson) -> serde_json::Value {
    match b {
        Bson::Null => serde_json::Value::Null,
        Bson::Boolean(b) => serde_json::json!(*b),
        Bson::Int32(i) => serde_json::json!(*i),
        Bson::Int64(i) => serde_json::json!(*i),
        Bson::Double(f) => serde_json::json!(*f),
        Bson::String(s) => serde_json::json!(s),
        Bson::ObjectId(oid) => serde_json::json!(oid.to_hex()),
        Bson::Array(arr) => serde_json::Value::Array(arr.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => doc_to_json(doc),
        Bson::DateTime(dt) => serde_json::json!(dt.try_to_rfc3339_string().ok()),
        _ => serde_json::Value::Null,
    }
}

/// Convert a stored document to the adapter's JSON shape.
pub fn doc_to_json(doc: &Document) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for (k, v) in doc {
        let key = if k == "_id" { "id".to_string() } else { k.clone() };
        map.insert(key, bson_to_json(v));
    }
    serde_json::Value::Object(map)
}

/// Convert a JSON object to an insert document.
pub fn build_insert_doc(data: &serde_json::Value) -> Document {
    let mut doc = Document::new();
    if let Some(obj) = data.as_object() {
        for (k, v) in obj {
            doc.insert(mongo_field(k), json_to_bson(v));
        }
    }
    doc
}

/// `$set` every field of `data` except the id.
pub fn build_update_doc(data: &serde_json::Value) -> Document {
    let mut set = Document::new();
    if let Some(obj) = data.as_object() {
        for (k, v) in obj.iter().filter(|(k, _)| k.as_str() != "id") {
            set.insert(k.clone(), json_to_bson(v));
        }
    }
    doc! { "$set": set }
}

/// Like [`build_update_doc`], but assigns `new_id` when the update inserts.
pub fn build_upsert_doc(data: &serde_json::Value, new_id: &str) -> Document {
    let mut update = build_update_doc(data);
    update.insert("$setOnInsert", doc! { "_id": new_id });
    update
}
