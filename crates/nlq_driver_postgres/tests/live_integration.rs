use std::time::Duration;

use nlq_core::{AgentError, CancelToken, DatabaseEndpoint, DbDriver, DbKind, ExecutedQuery, SchemaPayload, Value};
use nlq_driver_postgres::PostgresDriver;
use nlq_test_support::containers;

async fn connect_postgres(uri: String) -> Result<Box<dyn nlq_core::Connection>, AgentError> {
    let driver = PostgresDriver::new();
    let endpoint = DatabaseEndpoint::new(uri, Some(DbKind::SqlA))?;

    containers::retry_db_operation(Duration::from_secs(30), || async {
        let connection = driver.connect(&endpoint).await?;
        connection.ping().await?;
        Ok(connection)
    })
    .await
}

fn sql(text: &str) -> ExecutedQuery {
    ExecutedQuery::Relational { sql: text.to_string(), parameters: Vec::new() }
}

#[tokio::test]
#[ignore = "requires Docker daemon"]
async fn postgres_live_connect_ping_query_and_schema() -> Result<(), AgentError> {
    let uri = tokio::task::spawn_blocking(|| containers::with_postgres_url(|u| Ok::<String, AgentError>(u))).await.unwrap()?;
    let connection = connect_postgres(uri).await?;
    let cancel = CancelToken::new();

    let result = connection.execute(&sql("SELECT 1 AS one"), &cancel, Duration::from_secs(5)).await?;
    assert_eq!(result.rows.len(), 1);

    let schema = connection.introspect_schema().await?;
    assert!(matches!(schema, SchemaPayload::Relational { .. }));

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker daemon"]
async fn postgres_schema_introspection() -> Result<(), AgentError> {
    let uri = tokio::task::spawn_blocking(|| containers::with_postgres_url(|u| Ok::<String, AgentError>(u))).await.unwrap()?;
    let connection = connect_postgres(uri).await?;
    let cancel = CancelToken::new();
    let deadline = Duration::from_secs(5);

    connection
        .execute(
            &sql(
                "CREATE TABLE test_users (\
                    id SERIAL PRIMARY KEY, \
                    name VARCHAR(100) NOT NULL, \
                    email VARCHAR(255) UNIQUE, \
                    age INTEGER DEFAULT 0)",
            ),
            &cancel,
            deadline,
        )
        .await?;

    connection
        .execute(
            &sql(
                "CREATE TABLE test_orders (\
                    id SERIAL PRIMARY KEY, \
                    user_id INTEGER NOT NULL REFERENCES test_users(id) ON DELETE CASCADE, \
                    amount NUMERIC(10, 2) NOT NULL)",
            ),
            &cancel,
            deadline,
        )
        .await?;

    let schema = connection.introspect_schema().await?;
    let SchemaPayload::Relational { tables } = schema else {
        panic!("expected relational schema payload");
    };

    let users = tables.iter().find(|t| t.qualified_table == "test_users").expect("test_users table");
    assert!(users.columns.len() >= 4);
    assert_eq!(users.primary_key, vec!["id".to_string()]);
    let email_col = users.columns.iter().find(|c| c.name == "email").expect("email column");
    assert!(email_col.nullable);

    let orders = tables.iter().find(|t| t.qualified_table == "test_orders").expect("test_orders table");
    assert_eq!(orders.foreign_keys.len(), 1);
    assert_eq!(orders.foreign_keys[0].ref_table, "test_users");
    assert_eq!(orders.foreign_keys[0].column, "user_id");

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker daemon"]
async fn postgres_crud_operations() -> Result<(), AgentError> {
    let uri = tokio::task::spawn_blocking(|| containers::with_postgres_url(|u| Ok::<String, AgentError>(u))).await.unwrap()?;
    let connection = connect_postgres(uri).await?;
    let cancel = CancelToken::new();
    let deadline = Duration::from_secs(5);

    connection
        .execute(
            &sql("CREATE TABLE crud_test (id SERIAL PRIMARY KEY, name VARCHAR(100) NOT NULL, value INTEGER DEFAULT 0)"),
            &cancel,
            deadline,
        )
        .await?;

    connection
        .execute(
            &ExecutedQuery::Relational {
                sql: "INSERT INTO crud_test (name, value) VALUES ($1, $2)".to_string(),
                parameters: vec![Value::Text("alice".to_string()), Value::Int(42)],
            },
            &cancel,
            deadline,
        )
        .await?;

    let rows = connection.execute(&sql("SELECT * FROM crud_test WHERE name = 'alice'"), &cancel, deadline).await?.rows;
    assert_eq!(rows.len(), 1);

    connection
        .execute(
            &ExecutedQuery::Relational {
                sql: "UPDATE crud_test SET value = $1 WHERE name = $2".to_string(),
                parameters: vec![Value::Int(99), Value::Text("alice".to_string())],
            },
            &cancel,
            deadline,
        )
        .await?;

    let rows = connection.execute(&sql("SELECT value FROM crud_test WHERE name = 'alice'"), &cancel, deadline).await?.rows;
    assert_eq!(rows[0][0], Value::Int(99));

    connection
        .execute(
            &ExecutedQuery::Relational {
                sql: "DELETE FROM crud_test WHERE name = $1".to_string(),
                parameters: vec![Value::Text("alice".to_string())],
            },
            &cancel,
            deadline,
        )
        .await?;

    let rows = connection.execute(&sql("SELECT * FROM crud_test"), &cancel, deadline).await?.rows;
    assert!(rows.is_empty());

    Ok(())
}

#[tokio::test]
#[ignore = "requires Docker daemon"]
async fn postgres_numeric_column_preserves_precision() -> Result<(), AgentError> {
    let uri = tokio::task::spawn_blocking(|| containers::with_postgres_url(|u| Ok::<String, AgentError>(u))).await.unwrap()?;
    let connection = connect_postgres(uri).await?;
    let cancel = CancelToken::new();
    let deadline = Duration::from_secs(5);

    connection
        .execute(&sql("CREATE TABLE prices (id SERIAL PRIMARY KEY, amount NUMERIC(10, 2) NOT NULL)"), &cancel, deadline)
        .await?;
    connection.execute(&sql("INSERT INTO prices (amount) VALUES (19.99)"), &cancel, deadline).await?;

    let rows = connection.execute(&sql("SELECT amount FROM prices"), &cancel, deadline).await?.rows;
    assert_eq!(rows[0][0], Value::Decimal("19.99".to_string()));

    Ok(())
}
