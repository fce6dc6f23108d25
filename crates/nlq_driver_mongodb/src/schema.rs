use std::collections::HashMap;

use bson::{Document, doc};
use futures::stream::TryStreamExt;
use mongodb::Database;
use nlq_core::{
    AgentError, CollectionSchema, DocumentFieldInfo, DocumentRelationship, InferredType,
    RelationshipKind, SchemaPayload,
};

/// Documents sampled per collection when inferring field types.
const SAMPLE_SIZE: i64 = 10;

/// Enumerates collections and, for each, samples up to `SAMPLE_SIZE` documents
/// to infer a field list by union-of-observed-types.
pub async fn introspect(db: &Database) -> Result<SchemaPayload, AgentError> {
    let names = db
    .list_collection_names()
    .await
    .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

    let mut collections = Vec::with_capacity(names.len());
    for name in names {
        collections.push(collection_schema(db, &name).await?);
    }

    Ok(SchemaPayload::Document { collections })
}

async fn collection_schema(db: &Database, name: &str) -> Result<CollectionSchema, AgentError> {
    let documents = sample_documents(db, name).await?;
    let total = documents.len();

    let mut order: Vec<String> = Vec::new();
    let mut occurrences: HashMap<String, usize> = HashMap::new();
    let mut inferred: HashMap<String, InferredType> = HashMap::new();

    for doc in &documents {
        for (key, value) in doc.iter() {
            if !occurrences.contains_key(key) {
                order.push(key.clone());
            }
            *occurrences.entry(key.clone()).or_insert(0) += 1;

            if let Some(kind) = bson_inferred_type(value) {
                inferred
                .entry(key.clone())
                .and_modify(|existing| *existing = existing.unify(kind))
                .or_insert(kind);
            }
        }
    }

    let fields: Vec<DocumentFieldInfo> = order
    .iter()
    .map(|name| {
            let inferred_type = inferred.get(name).copied().unwrap_or(InferredType::Mixed);
            let required = total > 0 && occurrences.get(name).copied().unwrap_or(0) == total;
            DocumentFieldInfo { name: name.clone(), inferred_type, required, unique: false, r#enum: None, reference: None }
    })
    .collect();

    let relationships = fields
    .iter()
    .filter_map(|field| potential_reference(field))
    .collect();

    Ok(CollectionSchema { collection: name.to_string(), fields, indexes: Vec::new(), relationships })
}

async fn sample_documents(db: &Database, name: &str) -> Result<Vec<Document>, AgentError> {
    let collection = db.collection::<Document>(name);

    let sampled = match collection.aggregate(vec![doc! { "$sample": { "size": SAMPLE_SIZE } }]).await {
        Ok(cursor) => cursor.try_collect::<Vec<Document>>().await,
        Err(e) => Err(e),
    };

    match sampled {
        Ok(documents) => Ok(documents),
        Err(e) => {
            tracing::warn!(error = %e, collection = name, "$sample aggregation failed, falling back to find().limit()");
            collection
            .find(doc! {})
            .limit(SAMPLE_SIZE)
            .await
            .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))
        }
    }
}

fn bson_inferred_type(value: &bson::Bson) -> Option<InferredType> {
    use bson::Bson;
    match value {
        Bson::Null | Bson::Undefined => None,
        Bson::ObjectId(_) => Some(InferredType::Identifier),
        Bson::String(_) => Some(InferredType::String),
        Bson::Int32(_) | Bson::Int64(_) | Bson::Double(_) | Bson::Decimal128(_) => Some(InferredType::Number),
        Bson::Boolean(_) => Some(InferredType::Boolean),
        Bson::Document(_) => Some(InferredType::Object),
        Bson::Array(_) => Some(InferredType::Array),
        _ => Some(InferredType::Mixed),
    }
}

/// `*Id`-suffixed identifier fields imply a reference to the collection named
/// by the stripped, lowercased, pluralized prefix (e.g. `userId` -> `users`).
fn potential_reference(field: &DocumentFieldInfo) -> Option<DocumentRelationship> {
    if field.inferred_type != InferredType::Identifier || field.name == "_id" {
        return None;
    }
    let prefix = field.name.strip_suffix("Id")?;
    if prefix.is_empty() {
        return None;
    }
    let mut target = prefix.to_string();
    if let Some(first) = target.get_mut(0..1) {
        first.make_ascii_lowercase();
    }
    if !target.ends_with('s') {
        target.push('s');
    }
    Some(DocumentRelationship { field: field.name.clone(), kind: RelationshipKind::PotentialReference, target })
}
