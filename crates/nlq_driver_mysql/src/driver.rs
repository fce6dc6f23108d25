use std::time::Duration;

use async_trait::async_trait;
use mysql_async::prelude::Queryable;
use mysql_async::{Conn, Opts, Params};
use nlq_core::{AgentError, CancelToken, Connection, DatabaseEndpoint, DbDriver, DbKind, ExecutedQuery, QueryResult, SchemaPayload};
use tokio::sync::Mutex;

use crate::conversions::{columns_of, to_mysql_value, value_at};
use crate::schema;

/// Factory for `mysql://`/`mariadb://` endpoints.
#[derive(Default)]
pub struct MysqlDriver;

impl MysqlDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DbDriver for MysqlDriver {
    fn kind(&self) -> DbKind {
        DbKind::SqlB
    }

    async fn connect(&self, endpoint: &DatabaseEndpoint) -> Result<Box<dyn Connection>, AgentError> {
        let opts = Opts::from_url(&endpoint.url).map_err(|e| AgentError::connection_failed(e.to_string()))?;
        let database = opts.db_name().map(str::to_string).unwrap_or_default();
        let conn = Conn::new(opts).await.map_err(|e| {
                tracing::warn!(error = %e, "mysql connect failed");
                AgentError::connection_failed(e.to_string())
        })?;

        Ok(Box::new(MysqlConnection { conn: Mutex::new(conn), database }))
    }
}

/// A single live MySQL connection. Requests against it serialize through an
/// internal mutex — `mysql_async::Conn` is not `Sync` across concurrent
/// queries, and the Connection Pool already gives one handle per endpoint
/// key rather than a sub-pool.
pub struct MysqlConnection {
    conn: Mutex<Conn>,
    database: String,
}

#[async_trait]
impl Connection for MysqlConnection {
    fn kind(&self) -> DbKind {
        DbKind::SqlB
    }

    async fn ping(&self) -> Result<(), AgentError> {
        let mut conn = self.conn.lock().await;
        conn.ping().await.map_err(|e| AgentError::connection_failed(e.to_string()))
    }

    async fn execute(&self, query: &ExecutedQuery, cancel: &CancelToken, deadline: Duration) -> Result<QueryResult, AgentError> {
        let ExecutedQuery::Relational { sql, parameters } = query else {
            return Err(AgentError::NotSupported("mysql driver only executes relational queries".into()));
        };

        if cancel.is_cancelled() {
            return Err(AgentError::Cancelled);
        }

        let started = std::time::Instant::now();
        let params = if parameters.is_empty() {
            Params::Empty
        } else {
            Params::Positional(parameters.iter().map(to_mysql_value).collect())
        };

        let mut conn = self.conn.lock().await;
        let rows: Vec<mysql_async::Row> = tokio::time::timeout(deadline, conn.exec(sql.as_str(), params))
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
                .map(|(idx, col)| value_at(row, idx, col.column_type()))
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
        let mut conn = self.conn.lock().await;
        schema::introspect(&mut conn, &self.database).await
    }

    async fn close(&self) -> Result<(), AgentError> {
        Ok(())
    }
}
