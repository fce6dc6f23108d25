use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Timelike, Utc};
use mysql_async::consts::ColumnType;
use mysql_async::{Row, Value as MyValue};
use nlq_core::{ColumnMeta, Value};

/// Converts a planner-synthesized `Value` parameter into its `mysql_async`
/// wire form for a positional `?` placeholder.
pub fn to_mysql_value(value: &Value) -> MyValue {
    match value {
        Value::Null => MyValue::NULL,
        Value::Bool(b) => MyValue::Int(*b as i64),
        Value::Int(i) => MyValue::Int(*i),
        Value::Float(f) => MyValue::Double(*f),
        Value::Text(s) | Value::ObjectId(s) | Value::Decimal(s) | Value::Json(s) => MyValue::Bytes(s.clone().into_bytes()),
        Value::DateTime(dt) => MyValue::Date(dt.year() as u16, dt.month() as u8, dt.day() as u8, dt.hour() as u8, dt.minute() as u8, dt.second() as u8, 0),
        Value::Date(d) => MyValue::Date(d.year() as u16, d.month() as u8, d.day() as u8, 0, 0, 0, 0),
        Value::Time(t) => MyValue::Time(false, 0, t.hour() as u8, t.minute() as u8, t.second() as u8, 0),
        Value::Bytes(b) => MyValue::Bytes(b.clone()),
        Value::Array(_) | Value::Document(_) => MyValue::Bytes(value.as_display_string().into_bytes()),
    }
}

pub fn columns_of(row: &Row) -> Vec<ColumnMeta> {
    row.columns()
    .iter()
    .map(|c| ColumnMeta { name: c.name_str().to_string(), type_name: format!("{:?}", c.column_type()), nullable: true })
    .collect()
}

/// Extracts one column's value by its MySQL column type, falling back to a
/// UTF-8 text representation for anything not explicitly handled.
pub fn value_at(row: &Row, idx: usize, ty: ColumnType) -> Value {
    let raw = match row.as_ref(idx) {
        Some(v) => v,
        None => return Value::Null,
    };

    if matches!(raw, MyValue::NULL) {
        return Value::Null;
    }

    match ty {
        ColumnType::MYSQL_TYPE_TINY if is_single_byte_bool(raw) => as_bool(raw),
        ColumnType::MYSQL_TYPE_TINY
        | ColumnType::MYSQL_TYPE_SHORT
        | ColumnType::MYSQL_TYPE_LONG
        | ColumnType::MYSQL_TYPE_LONGLONG
        | ColumnType::MYSQL_TYPE_INT24
        | ColumnType::MYSQL_TYPE_YEAR => as_int(raw),
        ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE => as_float(raw),
        ColumnType::MYSQL_TYPE_DECIMAL | ColumnType::MYSQL_TYPE_NEWDECIMAL => Value::Decimal(as_text(raw)),
        ColumnType::MYSQL_TYPE_DATE | ColumnType::MYSQL_TYPE_NEWDATE => as_date(raw),
        ColumnType::MYSQL_TYPE_TIME | ColumnType::MYSQL_TYPE_TIME2 => as_time(raw),
        ColumnType::MYSQL_TYPE_DATETIME | ColumnType::MYSQL_TYPE_DATETIME2 | ColumnType::MYSQL_TYPE_TIMESTAMP | ColumnType::MYSQL_TYPE_TIMESTAMP2 => as_datetime(raw),
        ColumnType::MYSQL_TYPE_JSON => Value::Json(as_text(raw)),
        _ => Value::Text(as_text(raw)),
    }
}

fn is_single_byte_bool(value: &MyValue) -> bool {
    matches!(value, MyValue::Int(0) | MyValue::Int(1))
}

fn as_bool(value: &MyValue) -> Value {
    match value {
        MyValue::Int(i) => Value::Bool(*i != 0),
        _ => Value::Null,
    }
}

fn as_int(value: &MyValue) -> Value {
    match value {
        MyValue::Int(i) => Value::Int(*i),
        MyValue::UInt(u) => Value::Int(*u as i64),
        MyValue::Bytes(b) => String::from_utf8_lossy(b).parse::<i64>().map(Value::Int).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn as_float(value: &MyValue) -> Value {
    match value {
        MyValue::Float(f) => Value::Float(*f as f64),
        MyValue::Double(d) => Value::Float(*d),
        MyValue::Bytes(b) => String::from_utf8_lossy(b).parse::<f64>().map(Value::Float).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn as_text(value: &MyValue) -> String {
    match value {
        MyValue::Bytes(b) => String::from_utf8_lossy(b).to_string(),
        MyValue::Int(i) => i.to_string(),
        MyValue::UInt(u) => u.to_string(),
        MyValue::Float(f) => f.to_string(),
        MyValue::Double(d) => d.to_string(),
        _ => String::new(),
    }
}

fn as_date(value: &MyValue) -> Value {
    match value {
        MyValue::Date(y, m, d, ..) => NaiveDate::from_ymd_opt(*y as i32, *m as u32, *d as u32).map(Value::Date).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn as_time(value: &MyValue) -> Value {
    match value {
        MyValue::Time(_, _, h, mi, s, _) => NaiveTime::from_hms_opt(*h as u32, *mi as u32, *s as u32).map(Value::Time).unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn as_datetime(value: &MyValue) -> Value {
    match value {
        MyValue::Date(y, m, d, h, mi, s, micro) => NaiveDate::from_ymd_opt(*y as i32, *m as u32, *d as u32)
        .and_then(|date| date.and_hms_micro_opt(*h as u32, *mi as u32, *s as u32, *micro))
        .map(|naive| Value::DateTime(DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc)))
        .unwrap_or(Value::Null),
        _ => Value::Null,
    }
}
