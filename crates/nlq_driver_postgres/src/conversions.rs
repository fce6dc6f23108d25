use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use nlq_core::{ColumnMeta, Value};
use tokio_postgres::Row;
use tokio_postgres::types::{ToSql, Type};

/// Converts a planner-synthesized `Value` parameter into its `ToSql` form.
/// Only the scalar shapes the Safety Gate lets through a parameter list are
/// handled — arrays/documents never appear as bind parameters.
pub fn to_sql_param(value: &Value) -> Box<dyn ToSql + Sync + Send> {
    match value {
        Value::Null => Box::new(Option::<String>::None),
        Value::Bool(b) => Box::new(*b),
        Value::Int(i) => Box::new(*i),
        Value::Float(f) => Box::new(*f),
        Value::Text(s) | Value::ObjectId(s) => Box::new(s.clone()),
        Value::Decimal(s) => Box::new(s.clone()),
        Value::Json(s) => Box::new(s.clone()),
        Value::DateTime(dt) => Box::new(*dt),
        Value::Date(d) => Box::new(*d),
        Value::Time(t) => Box::new(*t),
        Value::Bytes(b) => Box::new(b.clone()),
        Value::Array(_) | Value::Document(_) => Box::new(value.as_display_string()),
    }
}

pub fn columns_of(row: &Row) -> Vec<ColumnMeta> {
    row.columns()
    .iter()
    .map(|c| ColumnMeta { name: c.name().to_string(), type_name: c.type_().name().to_string(), nullable: true })
    .collect()
}

/// Extracts one column's value by its wire type, falling back to a text
/// representation for anything not explicitly handled.
pub fn value_at(row: &Row, idx: usize, ty: &Type) -> Value {
    match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).ok().flatten().map(Value::Bool).unwrap_or(Value::Null),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).ok().flatten().map(|v| Value::Int(v as i64)).unwrap_or(Value::Null),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).ok().flatten().map(|v| Value::Int(v as i64)).unwrap_or(Value::Null),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).ok().flatten().map(Value::Int).unwrap_or(Value::Null),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).ok().flatten().map(|v| Value::Float(v as f64)).unwrap_or(Value::Null),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).ok().flatten().map(Value::Float).unwrap_or(Value::Null),
        Type::NUMERIC => row
        .try_get::<_, Option<rust_decimal::Decimal>>(idx)
        .ok()
        .flatten()
        .map(|d| Value::Decimal(d.to_string()))
        .unwrap_or(Value::Null),
        Type::TIMESTAMPTZ => row.try_get::<_, Option<DateTime<Utc>>>(idx).ok().flatten().map(Value::DateTime).unwrap_or(Value::Null),
        Type::DATE => row.try_get::<_, Option<NaiveDate>>(idx).ok().flatten().map(Value::Date).unwrap_or(Value::Null),
        Type::TIME => row.try_get::<_, Option<NaiveTime>>(idx).ok().flatten().map(Value::Time).unwrap_or(Value::Null),
        Type::JSON | Type::JSONB => row
        .try_get::<_, Option<serde_json::Value>>(idx)
        .ok()
        .flatten()
        .map(|v| Value::Json(v.to_string()))
        .unwrap_or(Value::Null),
        Type::BYTEA => row.try_get::<_, Option<Vec<u8>>>(idx).ok().flatten().map(Value::Bytes).unwrap_or(Value::Null),
        _ => row.try_get::<_, Option<String>>(idx).ok().flatten().map(Value::Text).unwrap_or(Value::Null),
    }
}
