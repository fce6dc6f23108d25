use std::time::Duration;

use serde_json::json;

use nlq_core::{AgentError, CancelToken, DatabaseEndpoint, DbDriver, DbKind, DocumentOperation, ExecutedQuery, SchemaPayload, Value};
use nlq_driver_mongodb::MongoDriver;
use nlq_test_support::containers;

async fn connect_mongo(uri: String) -> Result<Box<dyn nlq_core::Connection>, AgentError> {
    let driver = MongoDriver::new();
    let endpoint = DatabaseEndpoint::new(uri, Some(DbKind::Document))?;

    containers::retry_db_operation(Duration::from_secs(30), || async {
        let connection = driver.connect(&endpoint).await?;
        connection.ping().await?;
        Ok(connection)
    })
    .await
}

fn document_query(operation: DocumentOperation, collection: &str) -> ExecutedQuery {
    ExecutedQuery::Document {
        operation,
        collection: collection.to_string(),
        filter: serde_json::Map::new(),
        projection: serde_json::Map::new(),
        sort: None,
        limit: None,
        pipeline: None,
        document: None,
        update: None,
    }
}

#[tokio::test]
#[ignore = "requires Docker daemon"]
async fn mongo_live_connect_ping_and_schema() -> Result<(), AgentError> {
    let uri = tokio::task::spawn_blocking(|| containers::with_mongodb_url(|u| Ok::<String, AgentError>(u))).await.unwrap()?;
    let connection = connect_mongo(uri).await?;

    let schema = connection.introspect_schema().await?;
    assert!(matches!(schema, SchemaPayload::Document { .. }));

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker daemon"]
async fn mongo_crud_and_schema_detection() -> Result<(), AgentError> {
    let uri = tokio::task::spawn_blocking(|| containers::with_mongodb_url(|u| Ok::<String, AgentError>(u))).await.unwrap()?;
    let connection = connect_mongo(uri).await?;
    let cancel = CancelToken::new();
    let deadline = Duration::from_secs(5);

    let document = match json!({ "name": "alice", "age": 30, "userId": "000000000000000000000001" }) {
        serde_json::Value::Object(map) => map,
        _ => unreachable!(),
    };

    let mut insert = document_query(DocumentOperation::InsertOne, "people");
    if let ExecutedQuery::Document { document: slot, .. } = &mut insert {
        *slot = Some(document);
    }
    let inserted = connection.execute(&insert, &cancel, deadline).await?;
    assert_eq!(inserted.affected_rows, Some(1));

    let found = connection.execute(&document_query(DocumentOperation::Find, "people"), &cancel, deadline).await?;
    assert_eq!(found.rows.len(), 1);

    let count = connection.execute(&document_query(DocumentOperation::Count, "people"), &cancel, deadline).await?;
    assert_eq!(count.rows[0][0], Value::Int(1));

    let schema = connection.introspect_schema().await?;
    let SchemaPayload::Document { collections } = schema else { panic!("expected document schema payload") };
    let people = collections.iter().find(|c| c.collection == "people").expect("people collection");
    let user_id_field = people.fields.iter().find(|f| f.name == "userId").expect("userId field");
    assert!(user_id_field.required);
    assert!(people.relationships.iter().any(|r| r.field == "userId" && r.target == "users"));

    Ok(())
}
