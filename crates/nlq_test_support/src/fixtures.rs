use std::time::Duration;

use nlq_core::{ColumnMeta, QueryResult, RelationalColumnInfo, SchemaPayload, TableSchema, Value};

pub fn table_result(columns: Vec<ColumnMeta>, rows: Vec<Vec<Value>>) -> QueryResult {
    QueryResult { columns, rows, affected_rows: None, execution_time: Duration::ZERO }
}

pub fn column(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> ColumnMeta {
    ColumnMeta { name: name.into(), type_name: type_name.into(), nullable }
}

pub fn int_cell(value: i64) -> Value {
    Value::Int(value)
}

pub fn text_cell(value: impl Into<String>) -> Value {
    Value::Text(value.into())
}

pub fn relational_schema_with_table(table_name: impl Into<String>) -> SchemaPayload {
    SchemaPayload::Relational {
        tables: vec![TableSchema {
                qualified_table: table_name.into(),
                columns: vec![RelationalColumnInfo { name: "id".to_string(), r#type: "integer".to_string(), nullable: false }],
                primary_key: vec!["id".to_string()],
                foreign_keys: Vec::new(),
        }],
    }
}
