use std::time::Duration;

use async_trait::async_trait;
use bson::{Document, doc};
use futures::stream::TryStreamExt;
use mongodb::{Client, Database};
use nlq_core::{
    AgentError, CancelToken, Connection, DatabaseEndpoint, DbDriver, DbKind, DocumentOperation,
    ExecutedQuery, QueryResult, SchemaPayload, Value,
};

use crate::conversions::{bson_to_value, documents_to_result, json_map_to_document};
use crate::schema;

/// Factory for `mongodb://`/`mongodb+srv://` endpoints.
#[derive(Default)]
pub struct MongoDriver;

impl MongoDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DbDriver for MongoDriver {
    fn kind(&self) -> DbKind {
        DbKind::Document
    }

    async fn connect(&self, endpoint: &DatabaseEndpoint) -> Result<Box<dyn Connection>, AgentError> {
        let client = Client::with_uri_str(&endpoint.url).await.map_err(|e| AgentError::connection_failed(e.to_string()))?;
        let database = client
        .default_database()
        .ok_or_else(|| AgentError::connection_failed("mongodb URL has no default database path segment".to_string()))?;

        Ok(Box::new(MongoConnection { database }))
    }
}

pub struct MongoConnection {
    database: Database,
}

#[async_trait]
impl Connection for MongoConnection {
    fn kind(&self) -> DbKind {
        DbKind::Document
    }

    async fn ping(&self) -> Result<(), AgentError> {
        self.database.run_command(doc! { "ping": 1 }).await.map(|_| ()).map_err(|e| AgentError::connection_failed(e.to_string()))
    }

    async fn execute(&self, query: &ExecutedQuery, cancel: &CancelToken, deadline: Duration) -> Result<QueryResult, AgentError> {
        let ExecutedQuery::Document { operation, collection, filter, projection, sort, limit, pipeline, document, update } = query else {
            return Err(AgentError::NotSupported("mongodb driver only executes document queries".into()));
        };
        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let started = std::time::Instant::now();
        let coll = self.database.collection::<Document>(collection);
        let filter_doc = json_map_to_document(filter);

        let mut result = tokio::time::timeout(deadline, async {
                match operation {
                    DocumentOperation::Find => {
                        let mut cursor_builder = coll.find(filter_doc);
                        if !projection.is_empty() {
                            cursor_builder = cursor_builder.projection(json_map_to_document(projection));
                        }
                        if let Some(sort_spec) = sort {
                            let sort_doc: Document = sort_spec
                            .iter()
                            .map(|(field, dir)| (field.clone(), bson::Bson::Int32(match dir {
                                            nlq_core::SortDirection::Asc => 1,
                                            nlq_core::SortDirection::Desc => -1,
                            })))
                            .collect();
                            cursor_builder = cursor_builder.sort(sort_doc);
                        }
                        if let Some(n) = limit {
                            cursor_builder = cursor_builder.limit(*n as i64);
                        }
                        let documents = cursor_builder.await.map_err(|e| AgentError::db_error(e.to_string()))?
                        .try_collect::<Vec<Document>>().await.map_err(|e| AgentError::db_error(e.to_string()))?;
                        Ok(documents_to_result(documents))
                    }
                    DocumentOperation::FindOne => {
                        let mut find_one = coll.find_one(filter_doc);
                        if !projection.is_empty() {
                            find_one = find_one.projection(json_map_to_document(projection));
                        }
                        let found = find_one.await.map_err(|e| AgentError::db_error(e.to_string()))?;
                        Ok(documents_to_result(found.into_iter().collect()))
                    }
                    DocumentOperation::Count => {
                        let count = coll.count_documents(filter_doc).await.map_err(|e| AgentError::db_error(e.to_string()))?;
                        Ok(QueryResult {
                                columns: vec![nlq_core::ColumnMeta { name: "count".to_string(), type_name: "int64".to_string(), nullable: false }],
                                rows: vec![vec![Value::Int(count as i64)]],
                                affected_rows: None,
                                execution_time: Duration::ZERO,
                        })
                    }
                    DocumentOperation::Aggregate => {
                        let stages: Vec<Document> = pipeline.as_ref().map(|stages| stages.iter().map(json_map_to_document).collect()).unwrap_or_default();
                        let documents = coll.aggregate(stages).await.map_err(|e| AgentError::db_error(e.to_string()))?
                        .try_collect::<Vec<Document>>().await.map_err(|e| AgentError::db_error(e.to_string()))?;
                        Ok(documents_to_result(documents))
                    }
                    DocumentOperation::InsertOne => {
                        let doc_to_insert = document.as_ref().ok_or_else(|| AgentError::BadInput("insertOne requires a document".into()))?;
                        let result = coll.insert_one(json_map_to_document(doc_to_insert)).await.map_err(|e| AgentError::db_error(e.to_string()))?;
                        Ok(QueryResult {
                                columns: vec![nlq_core::ColumnMeta { name: "insertedId".to_string(), type_name: "objectId".to_string(), nullable: false }],
                                rows: vec![vec![bson_to_value(&result.inserted_id)]],
                                affected_rows: Some(1),
                                execution_time: Duration::ZERO,
                        })
                    }
                    DocumentOperation::UpdateOne => {
                        let update_doc = update.as_ref().ok_or_else(|| AgentError::BadInput("updateOne requires an update document".into()))?;
                        let result = coll.update_one(filter_doc, json_map_to_document(update_doc)).await.map_err(|e| AgentError::db_error(e.to_string()))?;
                        Ok(QueryResult {
                                columns: vec![
                                    nlq_core::ColumnMeta { name: "matchedCount".to_string(), type_name: "int64".to_string(), nullable: false },
                                    nlq_core::ColumnMeta { name: "modifiedCount".to_string(), type_name: "int64".to_string(), nullable: false },
                                ],
                                rows: vec![vec![Value::Int(result.matched_count as i64), Value::Int(result.modified_count as i64)]],
                                affected_rows: Some(result.modified_count),
                                execution_time: Duration::ZERO,
                        })
                    }
                    DocumentOperation::DeleteOne => {
                        let result = coll.delete_one(filter_doc).await.map_err(|e| AgentError::db_error(e.to_string()))?;
                        Ok(QueryResult {
                                columns: vec![nlq_core::ColumnMeta { name: "deletedCount".to_string(), type_name: "int64".to_string(), nullable: false }],
                                rows: vec![vec![Value::Int(result.deleted_count as i64)]],
                                affected_rows: Some(result.deleted_count),
                                execution_time: Duration::ZERO,
                        })
                    }
                }
        }).await.map_err(|_| AgentError::Timeout)??;

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }
        result.execution_time = started.elapsed();
        Ok(result)
    }

    async fn introspect_schema(&self) -> Result<SchemaPayload, AgentError> {
        schema::introspect(&self.database).await
    }

    async fn close(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
