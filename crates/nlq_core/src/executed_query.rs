use serde::{Deserialize, Serialize};
use serde_json::Map;

use crate::Value;

/// Sort direction for a document-kind query's `sort` clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// A post-validation query, ready to hand to a driver.
///
/// This is the output of the Safety Gate, never the raw planner output —
/// every field here has already been checked against the rules in the gate.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum ExecutedQuery {
    Document {
        operation: DocumentOperation,
        collection: String,
        filter: Map<String, serde_json::Value>,
        #[serde(default)]
        projection: Map<String, serde_json::Value>,
        #[serde(default)]
        sort: Option<Vec<(String, SortDirection)>>,
        #[serde(default)]
        limit: Option<u32>,
        #[serde(default)]
        pipeline: Option<Vec<Map<String, serde_json::Value>>>,
        #[serde(default)]
        document: Option<Map<String, serde_json::Value>>,
        #[serde(default)]
        update: Option<Map<String, serde_json::Value>>,
    },
    Relational {
        sql: String,
        parameters: Vec<Value>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DocumentOperation {
    Find,
    FindOne,
    Count,
    Aggregate,
    InsertOne,
    UpdateOne,
    DeleteOne,
}

impl ExecutedQuery {
    /// The `queryKind` recorded on the resulting MemoryRecord.
    pub fn query_kind(&self) -> &'static str {
        match self {
            ExecutedQuery::Document { operation, .. } => match operation {
                DocumentOperation::Find => "read",
                DocumentOperation::FindOne => "readOne",
                DocumentOperation::Count => "count",
                DocumentOperation::Aggregate => "aggregate",
                DocumentOperation::InsertOne => "insert",
                DocumentOperation::UpdateOne => "update",
                DocumentOperation::DeleteOne => "delete",
            },
            ExecutedQuery::Relational { sql, .. } => {
                let head = sql.trim_start().split_whitespace().next().unwrap_or("");
                match head.to_uppercase().as_str() {
                    "SELECT" => "sql",
                    "INSERT" => "insert",
                    "UPDATE" => "update",
                    "DELETE" => "delete",
                    _ => "sql",
                }
            }
        }
    }

    /// Whether this query writes to the database (used by the Safety Gate's
    /// empty-filter rule).
    pub fn is_write(&self) -> bool {
        matches!(
            self,
            ExecutedQuery::Document {
                operation: DocumentOperation::InsertOne
                | DocumentOperation::UpdateOne
                | DocumentOperation::DeleteOne,
                ..
            }
        ) || matches!(self.query_kind(), "insert" | "update" | "delete")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relational_query_kind_detects_statement_type() {
        let q = ExecutedQuery::Relational {
            sql: "delete from orders where id = $1".into(),
            parameters: vec![Value::Int(1)],
        };
        assert_eq!(q.query_kind(), "delete");
        assert!(q.is_write());
    }

    #[test]
    fn document_query_kind_maps_operation() {
        let q = ExecutedQuery::Document {
            operation: DocumentOperation::Count,
            collection: "orders".into(),
            filter: Map::new(),
            projection: Map::new(),
            sort: None,
            limit: None,
            pipeline: None,
            document: None,
            update: None,
        };
        assert_eq!(q.query_kind(), "count");
        assert!(!q.is_write());
    }
}
