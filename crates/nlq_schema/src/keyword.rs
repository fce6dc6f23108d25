use std::collections::HashSet;

use nlq_core::SchemaPayload;

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "is", "are", "was", "were", "of", "in", "on", "for", "to", "and", "or",
    "me", "my", "show", "give", "get", "find", "list", "all", "please", "what", "how", "many",
];

/// Extracts candidate collection/table names whose name or any field name
/// contains a token from the user's text. Tokens are lowercased,
/// stopwords removed; empty matches are permitted.
pub fn candidate_objects(user_text: &str, payload: &SchemaPayload) -> Vec<String> {
    let tokens = tokenize(user_text);
    if tokens.is_empty() {
        return Vec::new();
    }

    match payload {
        SchemaPayload::Document { collections } => collections
        .iter()
        .filter(|c| {
                let lower = c.collection.to_lowercase();
                tokens.iter().any(|t| lower.contains(t.as_str()))
                || c.fields.iter().any(|f| {
                        let fname = f.name.to_lowercase();
                        tokens.iter().any(|t| fname.contains(t.as_str()))
                })
        })
        .map(|c| c.collection.clone())
        .collect(),
        SchemaPayload::Relational { tables } => tables
        .iter()
        .filter(|t| {
                let lower = t.qualified_table.to_lowercase();
                tokens.iter().any(|tok| lower.contains(tok.as_str()))
                || t.columns.iter().any(|c| {
                        let cname = c.name.to_lowercase();
                        tokens.iter().any(|tok| cname.contains(tok.as_str()))
                })
        })
        .map(|t| t.qualified_table.clone())
        .collect(),
    }
}

fn tokenize(text: &str) -> Vec<String> {
    let stopwords: HashSet<&str> = STOPWORDS.iter().copied().collect();
    text.split(|c: char| !c.is_alphanumeric())
    .map(|w| w.to_lowercase())
    .filter(|w| !w.is_empty() && !stopwords.contains(w.as_str()))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::{CollectionSchema, DocumentFieldInfo, InferredType};

    fn payload() -> SchemaPayload {
        SchemaPayload::Document {
            collections: vec![CollectionSchema {
                    collection: "orders".into(),
                    fields: vec![DocumentFieldInfo {
                            name: "customerId".into(),
                            inferred_type: InferredType::Identifier,
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

    #[test]
    fn matches_collection_name_token() {
        let candidates = candidate_objects("show me recent orders", &payload());
        assert_eq!(candidates, vec!["orders".to_string()]);
    }

    #[test]
    fn empty_matches_are_permitted() {
        let candidates = candidate_objects("hello there", &payload());
        assert!(candidates.is_empty());
    }
}
