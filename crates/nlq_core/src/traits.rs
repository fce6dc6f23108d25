use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{AgentError, CancelToken, DatabaseEndpoint, ExecutedQuery, SchemaPayload, Value};

/// A single row's worth of column values, positional per `QueryResult::columns`.
pub type Row = Vec<Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMeta {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
}

/// Driver-agnostic query outcome.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Row>,
    pub affected_rows: Option<u64>,
    pub execution_time: Duration,
}

impl QueryResult {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }
}

/// Opaque handle for cancelling an in-flight query from another task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryHandle(pub Uuid);

impl QueryHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for QueryHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// A live connection to one database endpoint.
///
/// All methods are suspension points: the caller passes a `CancelToken` and
/// a deadline so the pipeline can abandon a call promptly rather than
/// blocking a worker until the driver times out on its own.
#[async_trait]
pub trait Connection: Send + Sync {
    fn kind(&self) -> crate::DbKind;

    /// Lightweight liveness check (`SELECT 1` or a driver-native ping).
    async fn ping(&self) -> Result<(), AgentError>;

    /// Runs a validated query. `cancel` is polled cooperatively; `deadline`
    /// bounds total wait time and maps to `AgentError::Timeout` on expiry.
    async fn execute(
        &self,
        query: &ExecutedQuery,
        cancel: &CancelToken,
        deadline: Duration,
    ) -> Result<QueryResult, AgentError>;

    /// Introspects the live schema. Callers degrade to an empty
    /// `SchemaPayload` on failure rather than propagating the error.
    async fn introspect_schema(&self) -> Result<SchemaPayload, AgentError>;

    async fn close(&self) -> Result<(), AgentError>;
}

/// Factory for establishing connections of one `DbKind`.
///
/// One implementation per supported wire protocol; the Connection Pool picks
/// the right factory from `endpoint.kind` and never matches on URL scheme
/// itself beyond what `DbKind::from_scheme` already resolved.
#[async_trait]
pub trait DbDriver: Send + Sync {
    fn kind(&self) -> crate::DbKind;

    async fn connect(&self, endpoint: &DatabaseEndpoint) -> Result<Box<dyn Connection>, AgentError>;
}
