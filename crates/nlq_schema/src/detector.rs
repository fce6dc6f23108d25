use std::collections::HashMap;

use nlq_core::{CollectionSchema, DocumentFieldInfo, InferredType, RelationshipKind, Value};

const SAMPLE_SIZE: usize = 10;

/// Infers a collection's field shape from up to `SAMPLE_SIZE` sampled
/// documents, union-of-observed-types with the declared precedence.
/// `samples` is one `Document` per row, keyed by field name.
pub fn infer_collection_schema(
    collection: &str,
    samples: &[std::collections::BTreeMap<String, Value>],
) -> CollectionSchema {
    let capped: Vec<_> = samples.iter().take(SAMPLE_SIZE).collect();
    let total = capped.len();

    let mut observed: HashMap<String, InferredType> = HashMap::new();
    let mut presence: HashMap<String, usize> = HashMap::new();
    let mut field_order: Vec<String> = Vec::new();

    for sample in &capped {
        for (name, value) in sample.iter() {
            if !observed.contains_key(name) {
                field_order.push(name.clone());
            }
            let inferred = infer_value_type(name, value);
            let merged = observed.get(name).copied().map(|t| t.unify(inferred)).unwrap_or(inferred);
            observed.insert(name.clone(), merged);
            *presence.entry(name.clone()).or_insert(0) += 1;
        }
    }

    let fields = field_order
    .into_iter()
    .map(|name| {
            let inferred_type = observed[&name];
            let required = total > 0 && presence[&name] == total;
            let reference = potential_reference(&name, inferred_type);
            DocumentFieldInfo {
                name,
                inferred_type,
                required,
                unique: false,
                r#enum: None,
                reference,
            }
    })
    .collect();

    CollectionSchema {
        collection: collection.to_string(),
        fields,
        indexes: Vec::new(),
        relationships: Vec::new(),
    }
}

fn infer_value_type(field_name: &str, value: &Value) -> InferredType {
    if field_name == "_id" || field_name.ends_with("Id") {
        if matches!(value, Value::ObjectId(_) | Value::Text(_) | Value::Int(_)) {
            return InferredType::Identifier;
        }
    }
    match value {
        Value::Null => InferredType::Mixed,
        Value::Bool(_) => InferredType::Boolean,
        Value::Int(_) | Value::Float(_) | Value::Decimal(_) => InferredType::Number,
        Value::Text(_) | Value::DateTime(_) | Value::Date(_) | Value::Time(_) => InferredType::String,
        Value::ObjectId(_) => InferredType::Identifier,
        Value::Array(_) => InferredType::Array,
        Value::Document(_) | Value::Json(_) | Value::Bytes(_) => InferredType::Object,
    }
}

/// `*Id`-suffixed identifier fields are a `potentialReference` by naming
/// convention; explicit ORM-declared references are supplied
/// separately by the caller and aren't inferred here.
fn potential_reference(field_name: &str, inferred_type: InferredType) -> Option<String> {
    if inferred_type == InferredType::Identifier && field_name != "_id" && field_name.ends_with("Id") {
        Some(field_name.trim_end_matches("Id").to_string())
    } else {
        None
    }
}

pub fn relationship_kind_for(reference: &str) -> RelationshipKind {
    let _ = reference;
    RelationshipKind::PotentialReference
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn infers_required_when_present_in_every_sample() {
        let mut s1 = BTreeMap::new();
        s1.insert("name".to_string(), Value::Text("a".into()));
        s1.insert("age".to_string(), Value::Int(1));
        let mut s2 = BTreeMap::new();
        s2.insert("name".to_string(), Value::Text("b".into()));

        let schema = infer_collection_schema("users", &[s1, s2]);
        let name_field = schema.fields.iter().find(|f| f.name == "name").unwrap();
        let age_field = schema.fields.iter().find(|f| f.name == "age").unwrap();
        assert!(name_field.required);
        assert!(!age_field.required);
    }

    #[test]
    fn mismatched_types_collapse_to_mixed() {
        let mut s1 = BTreeMap::new();
        s1.insert("value".to_string(), Value::Int(1));
        let mut s2 = BTreeMap::new();
        s2.insert("value".to_string(), Value::Text("x".into()));

        let schema = infer_collection_schema("items", &[s1, s2]);
        let field = schema.fields.iter().find(|f| f.name == "value").unwrap();
        assert_eq!(field.inferred_type, InferredType::Mixed);
    }

    #[test]
    fn id_suffixed_field_is_a_potential_reference() {
        let mut s1 = BTreeMap::new();
        s1.insert("customerId".to_string(), Value::ObjectId("507f1f77bcf86cd799439011".into()));
        let schema = infer_collection_schema("orders", &[s1]);
        let field = schema.fields.iter().find(|f| f.name == "customerId").unwrap();
        assert_eq!(field.reference.as_deref(), Some("customer"));
    }
}
