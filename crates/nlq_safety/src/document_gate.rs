use serde_json::{Map, Value as Json};

use nlq_core::{AgentError, DocumentOperation, ExecutedQuery};

use crate::sentinel::looks_like_object_id;

const DANGEROUS_OPERATORS: &[&str] = &["$where", "$function", "$accumulator"];
const WRITEBACK_STAGES: &[&str] = &["$out", "$merge"];

/// Fallback ceiling when no configured cap is supplied (tests, callers that
/// haven't threaded one through yet).
pub const DEFAULT_ROW_CAP: u32 = 200;

fn sensitive_field(name: &str) -> bool {
    const MARKERS: &[&str] = &["password", "secret", "token"];
    let lower = name.to_lowercase();
    MARKERS.iter().any(|m| lower.contains(m))
}

/// Validates and rewrites a document ExecutedQuery against the safety-gate
/// rules. `row_cap` is the configured ceiling; the effective limit is always
/// `min(requested_limit.unwrap_or(row_cap), row_cap)`, never the caller's
/// unclamped request.
pub fn gate_document(query: ExecutedQuery, caller_overrode_projection: bool, row_cap: u32) -> Result<ExecutedQuery, AgentError> {
    let ExecutedQuery::Document {
        operation,
        collection,
        mut filter,
        mut projection,
        sort,
        limit,
        pipeline,
        document,
        update,
    } = query
    else {
        return Err(AgentError::bad_input("gate_document received a relational query"));
    };

    if contains_dangerous_operator(&filter) {
        return Err(AgentError::safety_rejected("DANGEROUS_OPERATOR"));
    }

    if let Some(stages) = &pipeline {
        for stage in stages {
            if stage.keys().any(|k| WRITEBACK_STAGES.contains(&k.as_str())) {
                return Err(AgentError::safety_rejected("PIPELINE_WRITEBACK_STAGE"));
            }
            if contains_dangerous_operator(stage) {
                return Err(AgentError::safety_rejected("DANGEROUS_OPERATOR"));
            }
        }
    }

    if matches!(operation, DocumentOperation::UpdateOne | DocumentOperation::DeleteOne) && !has_specific_filter(&filter)
    {
        return Err(AgentError::safety_rejected("WRITE_WITHOUT_SPECIFIC_FILTER"));
    }

    if !caller_overrode_projection {
        exclude_sensitive_fields(&mut projection);
    } else {
        reject_added_sensitive_fields(&projection)?;
    }

    let normalized_update = update.map(normalize_update_operators);

    resolve_date_sentinels(&mut filter);
    promote_object_ids(&mut filter);

    let effective_limit = match operation {
        DocumentOperation::Find => Some(limit.unwrap_or(row_cap).min(row_cap)),
        _ => limit,
    };

    let effective_pipeline = pipeline.map(|stages| ensure_limit_stage(stages, row_cap));

    Ok(ExecutedQuery::Document {
            operation,
            collection,
            filter,
            projection,
            sort,
            limit: effective_limit,
            pipeline: effective_pipeline,
            document,
            update: normalized_update,
    })
}

fn contains_dangerous_operator(doc: &Map<String, Json>) -> bool {
    doc.iter().any(|(k, v)| {
            DANGEROUS_OPERATORS.contains(&k.as_str())
            || match v {
                Json::Object(nested) => contains_dangerous_operator(nested),
                Json::Array(items) => items.iter().any(|item| match item {
                        Json::Object(nested) => contains_dangerous_operator(nested),
                        _ => false,
                }),
                _ => false,
            }
    })
}

/// A "specific" filter: non-empty and not keyed solely on a wildcard/empty
/// match.
fn has_specific_filter(filter: &Map<String, Json>) -> bool {
    !filter.is_empty()
}

fn exclude_sensitive_fields(projection: &mut Map<String, Json>) {
    for marker in ["password", "secret", "token"] {
        projection.insert(marker.to_string(), Json::from(0));
    }
}

fn reject_added_sensitive_fields(projection: &Map<String, Json>) -> Result<(), AgentError> {
    for (field, included) in projection {
        let truthy = matches!(included, Json::Bool(true)) || matches!(included, Json::Number(n) if n.as_i64() == Some(1));
        if truthy && sensitive_field(field) {
            return Err(AgentError::safety_rejected("PROJECTION_ADDS_SENSITIVE_FIELD"));
        }
    }
    Ok(())
}

/// Rewrites a plain-object update body into an explicit `$set` form, unless
/// the caller already used operator syntax.
fn normalize_update_operators(update: Map<String, Json>) -> Map<String, Json> {
    let already_operator_form = update.keys().any(|k| k.starts_with('$'));
    if already_operator_form {
        return update;
    }
    let mut set_doc = Map::new();
    set_doc.insert("$set".to_string(), Json::Object(update));
    set_doc
}

fn resolve_date_sentinels(filter: &mut Map<String, Json>) {
    for value in filter.values_mut() {
        resolve_date_sentinels_value(value);
    }
}

fn resolve_date_sentinels_value(value: &mut Json) {
    match value {
        Json::String(s) => {
            if let Some(resolved) = crate::sentinel::resolve_date_sentinel(s) {
                *value = Json::String(resolved);
            }
        }
        Json::Object(nested) => resolve_date_sentinels(nested),
        Json::Array(items) => items.iter_mut().for_each(resolve_date_sentinels_value),
        _ => {}
    }
}

fn promote_object_ids(filter: &mut Map<String, Json>) {
    for value in filter.values_mut() {
        promote_object_ids_value(value);
    }
}

fn promote_object_ids_value(value: &mut Json) {
    match value {
        Json::String(s) if looks_like_object_id(s) => {
            let mut oid = Map::new();
            oid.insert("$oid".to_string(), Json::String(s.clone()));
            *value = Json::Object(oid);
        }
        Json::Object(nested) => promote_object_ids(nested),
        Json::Array(items) => items.iter_mut().for_each(promote_object_ids_value),
        _ => {}
    }
}

fn ensure_limit_stage(
    mut stages: Vec<Map<String, Json>>,
    default_cap: u32,
) -> Vec<Map<String, Json>> {
    let has_limit = stages.iter().any(|s| s.contains_key("$limit"));
    if !has_limit {
        let mut stage = Map::new();
        stage.insert("$limit".to_string(), Json::from(default_cap));
        stages.push(stage);
    }
    stages
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_query(operation: DocumentOperation, filter: Map<String, Json>) -> ExecutedQuery {
        ExecutedQuery::Document {
            operation,
            collection: "users".into(),
            filter,
            projection: Map::new(),
            sort: None,
            limit: None,
            pipeline: None,
            document: None,
            update: None,
        }
    }

    #[test]
    fn rejects_delete_one_with_empty_filter() {
        let err = gate_document(base_query(DocumentOperation::DeleteOne, Map::new()), false, DEFAULT_ROW_CAP).unwrap_err();
        assert!(matches!(err, AgentError::SafetyRejected(r) if r == "WRITE_WITHOUT_SPECIFIC_FILTER"));
    }

    #[test]
    fn rejects_dangerous_where_operator() {
        let mut filter = Map::new();
        filter.insert("$where".into(), Json::String("this.x == 1".into()));
        let err = gate_document(base_query(DocumentOperation::Find, filter), false, DEFAULT_ROW_CAP).unwrap_err();
        assert!(matches!(err, AgentError::SafetyRejected(r) if r == "DANGEROUS_OPERATOR"));
    }

    #[test]
    fn injects_default_row_cap_on_find() {
        let gated = gate_document(base_query(DocumentOperation::Find, Map::new()), false, DEFAULT_ROW_CAP).unwrap();
        match gated {
            ExecutedQuery::Document { limit, .. } => assert_eq!(limit, Some(DEFAULT_ROW_CAP)),
            _ => panic!("expected document"),
        }
    }

    #[test]
    fn clamps_requested_limit_to_configured_cap() {
        let mut query = base_query(DocumentOperation::Find, Map::new());
        if let ExecutedQuery::Document { limit, .. } = &mut query {
            *limit = Some(9_999);
        }
        let gated = gate_document(query, false, 50).unwrap();
        match gated {
            ExecutedQuery::Document { limit, .. } => assert_eq!(limit, Some(50)),
            _ => panic!("expected document"),
        }
    }

    #[test]
    fn appends_limit_stage_to_aggregate_pipeline_without_one() {
        let mut query = base_query(DocumentOperation::Aggregate, Map::new());
        let mut match_stage = Map::new();
        match_stage.insert("$match".to_string(), Json::Object(Map::new()));
        if let ExecutedQuery::Document { pipeline, .. } = &mut query {
            *pipeline = Some(vec![match_stage]);
        }
        let gated = gate_document(query, false, DEFAULT_ROW_CAP).unwrap();
        match gated {
            ExecutedQuery::Document { pipeline: Some(stages), .. } => {
                assert_eq!(stages.len(), 2);
                assert!(stages[0].contains_key("$match"));
                assert_eq!(stages[1].get("$limit").and_then(|v| v.as_u64()), Some(DEFAULT_ROW_CAP as u64));
            }
            _ => panic!("expected aggregate pipeline"),
        }
    }

    #[test]
    fn promotes_object_id_looking_strings() {
        let mut filter = Map::new();
        filter.insert("_id".into(), Json::String("507f1f77bcf86cd799439011".into()));
        let gated = gate_document(base_query(DocumentOperation::FindOne, filter), false, DEFAULT_ROW_CAP).unwrap();
        match gated {
            ExecutedQuery::Document { filter, .. } => {
                assert!(filter.get("_id").unwrap().get("$oid").is_some());
            }
            _ => panic!("expected document"),
        }
    }
}
