use std::time::Duration;

use async_trait::async_trait;
use nlq_core::{AgentError, CancelToken, Connection, DatabaseEndpoint, DbDriver, DbKind, ExecutedQuery, QueryResult, SchemaPayload};
use tokio_postgres::{Client, NoTls};

use crate::conversions::{columns_of, to_sql_param, value_at};
use crate::schema;

/// Factory for `postgres://`/`postgresql://` endpoints. One
/// instance is registered into the Connection Pool per `DbKind::SqlA`.
#[derive(Default)]
pub struct PostgresDriver;

impl PostgresDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DbDriver for PostgresDriver {
    fn kind(&self) -> DbKind {
        DbKind::SqlA
    }

    async fn connect(&self, endpoint: &DatabaseEndpoint) -> Result<Box<dyn Connection>, AgentError> {
        let (client, connection) = tokio_postgres::connect(&endpoint.url, NoTls)
        .await
        .map_err(|e| AgentError::connection_failed(e.to_string()))?;

        // The connection future drives I/O; it must run for the client's
        // lifetime. Detached per the driver's own channel, not the caller's.
        tokio::spawn(async move {
                if let Err(e) = connection.await {
                    tracing::warn!(error = %e, "postgres connection task ended");
                }
        });

        Ok(Box::new(PgConnection { client }))
    }
}

pub struct PgConnection {
    client: Client,
}

#[async_trait]
impl Connection for PgConnection {
    fn kind(&self) -> DbKind {
        DbKind::SqlA
    }

    async fn ping(&self) -> Result<(), AgentError> {
        self.client
        .simple_query("SELECT 1")
        .await
        .map(|_| ())
        .map_err(|e| AgentError::connection_failed(e.to_string()))
    }

    async fn execute(&self, query: &ExecutedQuery, cancel: &CancelToken, deadline: Duration) -> Result<QueryResult, AgentError> {
        let ExecutedQuery::Relational { sql, parameters } = query else {
            return Err(AgentError::NotSupported("postgres driver only executes relational queries".into()));
        };

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let started = std::time::Instant::now();
        let owned_params: Vec<_> = parameters.iter().map(to_sql_param).collect();
        let params: Vec<&(dyn tokio_postgres::types::ToSql + Sync)> =
        owned_params.iter().map(|p| p.as_ref() as &(dyn tokio_postgres::types::ToSql + Sync)).collect();

        let rows = tokio::time::timeout(deadline, self.client.query(sql.as_str(), &params))
        .await
        .map_err(|_| AgentError::Timeout)?
        .map_err(|e| AgentError::db_error(e.to_string()))?;

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let columns = rows.first().map(columns_of).unwrap_or_default();
        let result_rows = rows
        .iter()
        .map(|row| {
                row.columns()
                .iter()
                .enumerate()
                .map(|(idx, col)| value_at(row, idx, col.type_()))
                .collect()
        })
        .collect::<Vec<_>>();

        Ok(QueryResult {
                affected_rows: (result_rows.is_empty() && columns.is_empty()).then_some(0),
                columns,
                rows: result_rows,
                execution_time: started.elapsed(),
        })
    }

    async fn introspect_schema(&self) -> Result<SchemaPayload, AgentError> {
        schema::introspect(&self.client).await
    }

    async fn close(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
