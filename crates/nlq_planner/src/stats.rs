use std::collections::HashSet;

use nlq_core::{ColumnMeta, QueryResult, StatOp, Value};
use serde_json::{Map, json};

/// Applies one `computeStats` op to a prior step's rows.
/// Returns a small JSON value suitable for both the trace preview and
/// `secondaryAnalysis`'s row-preview input.
pub fn apply(op: &StatOp, columns: &[ColumnMeta], rows: &[Vec<Value>]) -> serde_json::Value {
    match op {
        StatOp::Count => json!({ "op": "count", "result": rows.len() }),
        StatOp::TopK { field, k } => {
            let mut values: Vec<&Value> = column_values(columns, rows, field);
            values.sort_by(|a, b| compare_values(a, b).reverse());
            values.truncate((*k) as usize);
            json!({ "op": "topK", "field": field, "result": values.iter().map(|v| v.as_display_string()).collect::<Vec<_>>() })
        }
        StatOp::Mean { field } => {
            let numbers = numeric_values(columns, rows, field);
            let mean = if numbers.is_empty() { 0.0 } else { numbers.iter().sum::<f64>() / numbers.len() as f64 };
            json!({ "op": "mean", "field": field, "result": mean })
        }
        StatOp::Min { field } => {
            let values = column_values(columns, rows, field);
            let min = values.iter().min_by(|a, b| compare_values(a, b));
            json!({ "op": "min", "field": field, "result": min.map(|v| v.as_display_string()) })
        }
        StatOp::Max { field } => {
            let values = column_values(columns, rows, field);
            let max = values.iter().max_by(|a, b| compare_values(a, b));
            json!({ "op": "max", "field": field, "result": max.map(|v| v.as_display_string()) })
        }
        StatOp::Sum { field } => {
            let numbers = numeric_values(columns, rows, field);
            json!({ "op": "sum", "field": field, "result": numbers.iter().sum::<f64>() })
        }
        StatOp::Distinct { field } => {
            let values = column_values(columns, rows, field);
            let distinct: HashSet<String> = values.iter().map(|v| v.as_display_string()).collect();
            json!({ "op": "distinct", "field": field, "result": distinct.len() })
        }
    }
}

fn column_index(columns: &[ColumnMeta], field: &str) -> Option<usize> {
    columns.iter().position(|c| c.name == field)
}

fn column_values<'a>(columns: &[ColumnMeta], rows: &'a [Vec<Value>], field: &str) -> Vec<&'a Value> {
    match column_index(columns, field) {
        Some(idx) => rows.iter().filter_map(|r| r.get(idx)).filter(|v| !v.is_null()).collect(),
        None => Vec::new(),
    }
}

fn numeric_values(columns: &[ColumnMeta], rows: &[Vec<Value>], field: &str) -> Vec<f64> {
    column_values(columns, rows, field)
    .into_iter()
    .filter_map(|v| match v {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Decimal(s) => s.parse().ok(),
            _ => None,
    })
    .collect()
}

fn compare_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Float(x), Value::Float(y)) => x.partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal),
        (Value::Int(x), Value::Float(y)) => (*x as f64).partial_cmp(y).unwrap_or(std::cmp::Ordering::Equal),
        (Value::Float(x), Value::Int(y)) => x.partial_cmp(&(*y as f64)).unwrap_or(std::cmp::Ordering::Equal),
        _ => a.as_display_string().cmp(&b.as_display_string()),
    }
}

/// Bounded row preview as a JSON array-of-objects, used both for the
/// verbose-mode trace and as `secondaryAnalysis`'s input.
pub fn preview_rows(columns: &[ColumnMeta], rows: &[Vec<Value>], cap: usize) -> Vec<serde_json::Value> {
    rows.iter()
    .take(cap)
    .map(|row| {
            let mut obj = Map::new();
            for (idx, col) in columns.iter().enumerate() {
                if let Some(value) = row.get(idx) {
                    obj.insert(col.name.clone(), json!(value.as_display_string()));
                }
            }
            serde_json::Value::Object(obj)
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols() -> Vec<ColumnMeta> {
        vec![ColumnMeta { name: "amount".into(), type_name: "float".into(), nullable: false }]
    }

    #[test]
    fn count_counts_all_rows() {
        let rows = vec![vec![Value::Int(1)], vec![Value::Int(2)]];
        let result = apply(&StatOp::Count, &cols(), &rows);
        assert_eq!(result["result"], json!(2));
    }

    #[test]
    fn sum_and_mean_ignore_non_numeric_and_nulls() {
        let rows = vec![vec![Value::Float(10.0)], vec![Value::Null], vec![Value::Float(30.0)]];
        let sum = apply(&StatOp::Sum { field: "amount".into() }, &cols(), &rows);
        assert_eq!(sum["result"], json!(40.0));
        let mean = apply(&StatOp::Mean { field: "amount".into() }, &cols(), &rows);
        assert_eq!(mean["result"], json!(20.0));
    }

    #[test]
    fn top_k_sorts_descending_and_truncates() {
        let rows = vec![vec![Value::Int(5)], vec![Value::Int(20)], vec![Value::Int(10)]];
        let result = apply(&StatOp::TopK { field: "amount".into(), k: 2 }, &cols(), &rows);
        assert_eq!(result["result"], json!(["20", "10"]));
    }

    #[test]
    fn distinct_counts_unique_display_values() {
        let rows = vec![vec![Value::Int(1)], vec![Value::Int(1)], vec![Value::Int(2)]];
        let result = apply(&StatOp::Distinct { field: "amount".into() }, &cols(), &rows);
        assert_eq!(result["result"], json!(2));
    }
}
