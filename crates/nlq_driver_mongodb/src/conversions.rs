use std::collections::HashSet;

use bson::{Bson, Document};
use nlq_core::{ColumnMeta, QueryResult, Row, Value};

/// Converts a planner-synthesized JSON value into its BSON wire form for a
/// filter/document/update clause.
pub fn json_to_bson(value: &serde_json::Value) -> Bson {
    match value {
        serde_json::Value::Null => Bson::Null,
        serde_json::Value::Bool(b) => Bson::Boolean(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else {
                Bson::Double(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => {
            if let Ok(oid) = bson::oid::ObjectId::parse_str(s) {
                Bson::ObjectId(oid)
            } else {
                Bson::String(s.clone())
            }
        }
        serde_json::Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        serde_json::Value::Object(map) => Bson::Document(json_map_to_document(map)),
    }
}

pub fn json_map_to_document(map: &serde_json::Map<String, serde_json::Value>) -> Document {
    map.iter().map(|(k, v)| (k.clone(), json_to_bson(v))).collect()
}

/// Converts a single BSON value into the shared `nlq_core::Value` representation.
pub fn bson_to_value(bson: &Bson) -> Value {
    match bson {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::Int(*i as i64),
        Bson::Int64(i) => Value::Int(*i),
        Bson::Double(f) => Value::Float(*f),
        Bson::String(s) => Value::Text(s.clone()),
        Bson::ObjectId(oid) => Value::ObjectId(oid.to_hex()),
        Bson::DateTime(dt) => chrono::DateTime::from_timestamp_millis(dt.timestamp_millis())
        .map(Value::DateTime)
        .unwrap_or_else(|| Value::Text(dt.to_string())),
        Bson::Binary(bin) => Value::Bytes(bin.bytes.clone()),
        Bson::Array(arr) => Value::Array(arr.iter().map(bson_to_value).collect()),
        Bson::Document(doc) => Value::Document(document_to_json_map(doc)),
        Bson::Decimal128(d) => Value::Decimal(d.to_string()),
        Bson::RegularExpression(regex) => Value::Text(format!("/{}/{}", regex.pattern, regex.options)),
        Bson::JavaScriptCode(code) => Value::Text(code.clone()),
        Bson::JavaScriptCodeWithScope(code) => Value::Text(code.code.clone()),
        Bson::Timestamp(ts) => Value::Text(format!("Timestamp({}, {})", ts.time, ts.increment)),
        Bson::Symbol(s) => Value::Text(s.clone()),
        Bson::MaxKey => Value::Text("MaxKey".to_string()),
        Bson::MinKey => Value::Text("MinKey".to_string()),
        Bson::DbPointer(_) => Value::Text("DBPointer".to_string()),
    }
}

fn document_to_json_map(doc: &Document) -> serde_json::Map<String, serde_json::Value> {
    doc.iter()
    .map(|(k, v)| (k.clone(), bson_value_to_json(v)))
    .collect()
}

fn bson_value_to_json(bson: &Bson) -> serde_json::Value {
    match bson_to_value(bson) {
        Value::Document(map) => serde_json::Value::Object(map),
        other => serde_json::to_value(other.as_display_string()).unwrap_or(serde_json::Value::Null),
    }
}

/// Flattens a batch of documents into a `QueryResult`: one column per field
/// name observed across the batch (`_id` pinned first), one row per document.
pub fn documents_to_result(documents: Vec<Document>) -> QueryResult {
    if documents.is_empty() {
        return QueryResult::empty();
    }

    let mut field_names: Vec<String> = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();
    for doc in &documents {
        for key in doc.keys() {
            if seen.insert(key.clone()) {
                field_names.push(key.clone());
            }
        }
    }
    if let Some(pos) = field_names.iter().position(|k| k == "_id") {
        let id = field_names.remove(pos);
        field_names.insert(0, id);
    }

    let columns: Vec<ColumnMeta> = field_names
    .iter()
    .map(|name| ColumnMeta { name: name.clone(), type_name: "bson".to_string(), nullable: true })
    .collect();

    let rows: Vec<Row> = documents
    .iter()
    .map(|doc| field_names.iter().map(|name| doc.get(name).map(bson_to_value).unwrap_or(Value::Null)).collect())
    .collect();

    QueryResult { columns, rows, affected_rows: None, execution_time: std::time::Duration::ZERO }
}
