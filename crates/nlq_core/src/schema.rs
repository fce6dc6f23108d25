use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::DbKind;

/// Inferred field/column type precedence used by the Schema Detector for
/// document kinds: `Identifier > String > Number > Boolean > Object > Array<T> > Mixed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InferredType {
    Identifier,
    String,
    Number,
    Boolean,
    Object,
    Array,
    Mixed,
}

impl InferredType {
    /// Widen two observed types for the same field into one, following the
    /// declared precedence: different concrete types collapse to `Mixed`.
    pub fn unify(self, other: InferredType) -> InferredType {
        if self == other {
            self
        } else {
            InferredType::Mixed
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RelationshipKind {
    Reference,
    PotentialReference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentRelationship {
    pub field: String,
    pub kind: RelationshipKind,
    pub target: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentFieldInfo {
    pub name: String,
    pub inferred_type: InferredType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub unique: bool,
    #[serde(default)]
    pub r#enum: Option<Vec<String>>,
    #[serde(default)]
    pub reference: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentIndexInfo {
    pub name: String,
    pub fields: Vec<String>,
    pub unique: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub collection: String,
    pub fields: Vec<DocumentFieldInfo>,
    #[serde(default)]
    pub indexes: Vec<DocumentIndexInfo>,
    #[serde(default)]
    pub relationships: Vec<DocumentRelationship>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalColumnInfo {
    pub name: String,
    pub r#type: String,
    pub nullable: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationalForeignKeyInfo {
    pub column: String,
    pub ref_table: String,
    pub ref_column: String,
    pub constraint_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableSchema {
    pub qualified_table: String,
    pub columns: Vec<RelationalColumnInfo>,
    #[serde(default)]
    pub primary_key: Vec<String>,
    #[serde(default)]
    pub foreign_keys: Vec<RelationalForeignKeyInfo>,
}

/// The kind-dependent payload of a `SchemaSnapshot`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum SchemaPayload {
    Document { collections: Vec<CollectionSchema> },
    Relational { tables: Vec<TableSchema> },
}

impl SchemaPayload {
    pub fn empty(kind: DbKind) -> Self {
        match kind {
            DbKind::Document => SchemaPayload::Document {
                collections: Vec::new(),
            },
            DbKind::SqlA | DbKind::SqlB => SchemaPayload::Relational { tables: Vec::new() },
        }
    }

    /// Container count: collections for document kind, tables for relational.
    pub fn object_count(&self) -> usize {
        match self {
            SchemaPayload::Document { collections } => collections.len(),
            SchemaPayload::Relational { tables } => tables.len(),
        }
    }

    /// Names of all sensitive fields/columns present anywhere in the schema,
    /// so the Safety Gate can exclude them from default projections.
    pub fn sensitive_field_names(&self) -> Vec<String> {
        const SENSITIVE_MARKERS: &[&str] = &["password", "secret", "token"];

        let mut names = Vec::new();
        match self {
            SchemaPayload::Document { collections } => {
                for collection in collections {
                    for field in &collection.fields {
                        if SENSITIVE_MARKERS
                        .iter()
                        .any(|m| field.name.to_lowercase().contains(m))
                        {
                            names.push(field.name.clone());
                        }
                    }
                }
            }
            SchemaPayload::Relational { tables } => {
                for table in tables {
                    for column in &table.columns {
                        if SENSITIVE_MARKERS
                        .iter()
                        .any(|m| column.name.to_lowercase().contains(m))
                        {
                            names.push(column.name.clone());
                        }
                    }
                }
            }
        }
        names.sort();
        names.dedup();
        names
    }
}

/// Persisted, hash-keyed schema description. `last_built` is monotonic;
/// freshness is `now - last_built < ttl`, checked by the Schema Registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaSnapshot {
    pub db_key: String,
    pub kind: DbKind,
    pub payload: SchemaPayload,
    pub last_built: DateTime<Utc>,
}

impl SchemaSnapshot {
    pub fn is_fresh(&self, now: DateTime<Utc>, ttl: chrono::Duration) -> bool {
        now - self.last_built < ttl
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_fields_are_detected_case_insensitively() {
        let payload = SchemaPayload::Document {
            collections: vec![CollectionSchema {
                    collection: "users".into(),
                    fields: vec![
                        DocumentFieldInfo {
                            name: "Password".into(),
                            inferred_type: InferredType::String,
                            required: true,
                            unique: false,
                            r#enum: None,
                            reference: None,
                        },
                        DocumentFieldInfo {
                            name: "email".into(),
                            inferred_type: InferredType::String,
                            required: true,
                            unique: true,
                            r#enum: None,
                            reference: None,
                        },
                    ],
                    indexes: vec![],
                    relationships: vec![],
            }],
        };
        assert_eq!(payload.sensitive_field_names(), vec!["Password".to_string()]);
    }

    #[test]
    fn inferred_type_unify_collapses_to_mixed() {
        assert_eq!(
            InferredType::String.unify(InferredType::Number),
            InferredType::Mixed
        );
        assert_eq!(
            InferredType::String.unify(InferredType::String),
            InferredType::String
        );
    }
}
