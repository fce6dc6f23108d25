use nlq_core::{DbKind, DocumentOperation, ExecutedQuery, SchemaPayload, SortDirection, Value};
use serde_json::Map;

const DEFAULT_PREVIEW_LIMIT: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Intent {
    Count,
    Latest,
    Top(Option<u32>),
    Default,
}

/// Detects the user's intent from a small fixed keyword set. Order
/// matters — "top 5 latest orders" reads as Top(5), not Latest.
fn detect_intent(text: &str) -> Intent {
    let lower = text.to_lowercase();
    if lower.contains("how many") || lower.contains("count of") || lower.contains(" count") || lower.starts_with("count") {
        Intent::Count
    } else if lower.contains("top") || lower.contains("first") {
        Intent::Top(first_number(&lower))
    } else if lower.contains("latest") || lower.contains("recent") || lower.contains("newest") {
        Intent::Latest
    } else {
        Intent::Default
    }
}

fn first_number(text: &str) -> Option<u32> {
    let mut digits = String::new();
    for ch in text.chars() {
        if ch.is_ascii_digit() {
            digits.push(ch);
        } else if !digits.is_empty() {
            break;
        }
    }
    digits.parse().ok()
}

/// Best-guess target collection/table: the first keyword-matched candidate,
/// falling back to the first object in the schema. `None` if the schema is
/// empty — the caller surfaces that as a step failure rather than guessing
/// at a table name with no grounding at all.
fn pick_target<'a>(schema: &'a SchemaPayload, candidates: &[String]) -> Option<&'a str> {
    match schema {
        SchemaPayload::Document { collections } => {
            if let Some(name) = candidates.first() {
                if let Some(c) = collections.iter().find(|c| &c.collection == name) {
                    return Some(&c.collection);
                }
            }
            collections.first().map(|c| c.collection.as_str())
        }
        SchemaPayload::Relational { tables } => {
            if let Some(name) = candidates.first() {
                if let Some(t) = tables.iter().find(|t| &t.qualified_table == name) {
                    return Some(&t.qualified_table);
                }
            }
            tables.first().map(|t| t.qualified_table.as_str())
        }
    }
}

/// Field whose name looks like a timestamp, for the `Latest` intent's sort
/// clause. Falls back to `createdAt`/`created_at`, which the Safety Gate and
/// driver will simply fail to match if the object has no such column — a
/// visible `DbError` rather than a silently wrong sort.
fn date_field(schema: &SchemaPayload, target: &str) -> String {
    const MARKERS: &[&str] = &["created", "date", "timestamp", "updated"];
    match schema {
        SchemaPayload::Document { collections } => collections
        .iter()
        .find(|c| c.collection == target)
        .and_then(|c| c.fields.iter().find(|f| MARKERS.iter().any(|m| f.name.to_lowercase().contains(m))))
        .map(|f| f.name.clone())
        .unwrap_or_else(|| "createdAt".to_string()),
        SchemaPayload::Relational { tables } => tables
        .iter()
        .find(|t| t.qualified_table == target)
        .and_then(|t| t.columns.iter().find(|c| MARKERS.iter().any(|m| c.name.to_lowercase().contains(m))))
        .map(|c| c.name.clone())
        .unwrap_or_else(|| "created_at".to_string()),
    }
}

/// Synthesizes an `ExecutedQuery` without calling the LLM, used when the oracle is absent, times out,
/// or its reply fails to parse. Returns `None` when there's no schema object
/// to ground the guess in.
pub fn heuristic_query(sub_query: &str, kind: DbKind, schema: &SchemaPayload, candidates: &[String]) -> Option<ExecutedQuery> {
    let target = pick_target(schema, candidates)?.to_string();
    let intent = detect_intent(sub_query);

    Some(match kind {
            DbKind::Document => document_query(&target, intent, schema),
            DbKind::SqlA | DbKind::SqlB => relational_query(&target, intent, schema),
    })
}

fn document_query(target: &str, intent: Intent, schema: &SchemaPayload) -> ExecutedQuery {
    match intent {
        Intent::Count => ExecutedQuery::Document {
            operation: DocumentOperation::Count,
            collection: target.to_string(),
            filter: Map::new(),
            projection: Map::new(),
            sort: None,
            limit: None,
            pipeline: None,
            document: None,
            update: None,
        },
        Intent::Latest => ExecutedQuery::Document {
            operation: DocumentOperation::Find,
            collection: target.to_string(),
            filter: Map::new(),
            projection: Map::new(),
            sort: Some(vec![(date_field(schema, target), SortDirection::Desc)]),
            limit: Some(DEFAULT_PREVIEW_LIMIT),
            pipeline: None,
            document: None,
            update: None,
        },
        Intent::Top(n) => ExecutedQuery::Document {
            operation: DocumentOperation::Find,
            collection: target.to_string(),
            filter: Map::new(),
            projection: Map::new(),
            sort: None,
            limit: Some(n.unwrap_or(DEFAULT_PREVIEW_LIMIT)),
            pipeline: None,
            document: None,
            update: None,
        },
        Intent::Default => ExecutedQuery::Document {
            operation: DocumentOperation::Find,
            collection: target.to_string(),
            filter: Map::new(),
            projection: Map::new(),
            sort: None,
            limit: Some(DEFAULT_PREVIEW_LIMIT),
            pipeline: None,
            document: None,
            update: None,
        },
    }
}

fn relational_query(target: &str, intent: Intent, schema: &SchemaPayload) -> ExecutedQuery {
    let sql = match intent {
        Intent::Count => format!("SELECT COUNT(*) FROM {target}"),
        Intent::Latest => format!("SELECT * FROM {target} ORDER BY {} DESC LIMIT {DEFAULT_PREVIEW_LIMIT}", date_field(schema, target)),
        Intent::Top(n) => format!("SELECT * FROM {target} LIMIT {}", n.unwrap_or(DEFAULT_PREVIEW_LIMIT)),
        Intent::Default => format!("SELECT * FROM {target} LIMIT {DEFAULT_PREVIEW_LIMIT}"),
    };
    ExecutedQuery::Relational { sql, parameters: Vec::<Value>::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::{CollectionSchema, DocumentFieldInfo, InferredType, RelationalColumnInfo, TableSchema};

    fn doc_schema() -> SchemaPayload {
        SchemaPayload::Document {
            collections: vec![CollectionSchema {
                    collection: "orders".into(),
                    fields: vec![DocumentFieldInfo {
                            name: "createdAt".into(),
                            inferred_type: InferredType::String,
                            required: true,
                            unique: false,
                            r#enum: None,
                            reference: None,
                    }],
                    indexes: vec![],
                    relationships: vec![],
            }],
        }
    }

    fn sql_schema() -> SchemaPayload {
        SchemaPayload::Relational {
            tables: vec![TableSchema {
                    qualified_table: "public.orders".into(),
                    columns: vec![RelationalColumnInfo { name: "created_at".into(), r#type: "timestamptz".into(), nullable: false }],
                    primary_key: vec!["id".into()],
                    foreign_keys: vec![],
            }],
        }
    }

    #[test]
    fn count_intent_produces_count_operation() {
        let q = heuristic_query("how many orders are there", DbKind::Document, &doc_schema(), &["orders".into()]).unwrap();
        match q {
            ExecutedQuery::Document { operation, .. } => assert_eq!(operation, DocumentOperation::Count),
            _ => panic!("expected document query"),
        }
    }

    #[test]
    fn latest_intent_sorts_descending_by_date_field() {
        let q = heuristic_query("show me the latest orders", DbKind::Document, &doc_schema(), &["orders".into()]).unwrap();
        match q {
            ExecutedQuery::Document { sort, .. } => assert_eq!(sort, Some(vec![("createdAt".to_string(), SortDirection::Desc)])),
            _ => panic!("expected document query"),
        }
    }

    #[test]
    fn top_n_intent_sets_limit_from_parsed_number() {
        let q = heuristic_query("top 5 orders", DbKind::SqlA, &sql_schema(), &["public.orders".into()]).unwrap();
        match q {
            ExecutedQuery::Relational { sql, .. } => assert!(sql.contains("LIMIT 5")),
            _ => panic!("expected relational query"),
        }
    }

    #[test]
    fn returns_none_without_any_schema_object() {
        let empty = SchemaPayload::Document { collections: vec![] };
        assert!(heuristic_query("show me orders", DbKind::Document, &empty, &[]).is_none());
    }
}
