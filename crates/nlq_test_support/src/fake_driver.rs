use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use async_trait::async_trait;
use nlq_core::{AgentError, CancelToken, Connection, DbDriver, DbKind, ExecutedQuery, QueryResult, SchemaPayload};

#[derive(Debug, Clone)]
pub enum FakeQueryOutcome {
    Success(QueryResult),
    Error(String),
    Timeout,
    Cancelled,
}

impl FakeQueryOutcome {
    fn into_result(&self) -> Result<QueryResult, AgentError> {
        match self {
            Self::Success(result) => Ok(result.clone()),
            Self::Error(message) => Err(AgentError::db_error(message.clone())),
            Self::Timeout => Err(AgentError::Timeout),
            Self::Cancelled => Err(AgentError::Cancelled),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FakeDriverStats {
    pub executed_queries: Vec<ExecutedQuery>,
    pub close_calls: usize,
}

struct FakeDriverState {
    schema: RwLock<SchemaPayload>,
    query_outcomes: RwLock<HashMap<String, FakeQueryOutcome>>,
    default_outcome: RwLock<Option<FakeQueryOutcome>>,
    executed_queries: Mutex<Vec<ExecutedQuery>>,
    close_calls: AtomicUsize,
    ping_error: RwLock<Option<String>>,
    connect_error: RwLock<Option<String>>,
}

impl FakeDriverState {
    fn new(kind: DbKind) -> Self {
        Self {
            schema: RwLock::new(SchemaPayload::empty(kind)),
            query_outcomes: RwLock::new(HashMap::new()),
            default_outcome: RwLock::new(None),
            executed_queries: Mutex::new(Vec::new()),
            close_calls: AtomicUsize::new(0),
            ping_error: RwLock::new(None),
            connect_error: RwLock::new(None),
        }
    }
}

/// Deterministic `DbDriver`/`Connection` pair for unit tests above the
/// driver layer (pool, schema registry, planner, executor) — avoids spinning
/// up real containers for logic that doesn't depend on wire protocol.
#[derive(Clone)]
pub struct FakeDriver {
    kind: DbKind,
    state: Arc<FakeDriverState>,
}

impl FakeDriver {
    pub fn new(kind: DbKind) -> Self {
        Self { kind, state: Arc::new(FakeDriverState::new(kind)) }
    }

    pub fn with_schema(self, schema: SchemaPayload) -> Self {
        *rwlock_write(&self.state.schema) = schema;
        self
    }

    pub fn with_query_result(self, key: impl Into<String>, result: QueryResult) -> Self {
        rwlock_write(&self.state.query_outcomes).insert(key.into(), FakeQueryOutcome::Success(result));
        self
    }

    pub fn with_query_error(self, key: impl Into<String>, message: impl Into<String>) -> Self {
        rwlock_write(&self.state.query_outcomes).insert(key.into(), FakeQueryOutcome::Error(message.into()));
        self
    }

    pub fn with_default_result(self, result: QueryResult) -> Self {
        *rwlock_write(&self.state.default_outcome) = Some(FakeQueryOutcome::Success(result));
        self
    }

    pub fn with_ping_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.state.ping_error) = Some(message.into());
        self
    }

    pub fn with_connect_error(self, message: impl Into<String>) -> Self {
        *rwlock_write(&self.state.connect_error) = Some(message.into());
        self
    }

    pub fn stats(&self) -> FakeDriverStats {
        FakeDriverStats {
            executed_queries: mutex_lock(&self.state.executed_queries).clone(),
            close_calls: self.state.close_calls.load(Ordering::Relaxed),
        }
    }

    pub fn as_driver_arc(self) -> Arc<dyn DbDriver> {
        Arc::new(self)
    }
}

/// Lookup key for a query's outcome: the SQL text for relational queries,
/// the collection name for document queries.
fn outcome_key(query: &ExecutedQuery) -> String {
    match query {
        ExecutedQuery::Relational { sql, .. } => sql.clone(),
        ExecutedQuery::Document { collection, .. } => collection.clone(),
    }
}

#[async_trait]
impl DbDriver for FakeDriver {
    fn kind(&self) -> DbKind {
        self.kind
    }

    async fn connect(&self, _endpoint: &nlq_core::DatabaseEndpoint) -> Result<Box<dyn Connection>, AgentError> {
        if let Some(message) = rwlock_read(&self.state.connect_error).clone() {
            return Err(AgentError::connection_failed(message));
        }

        Ok(Box::new(FakeConnection { kind: self.kind, state: self.state.clone() }))
    }
}

struct FakeConnection {
    kind: DbKind,
    state: Arc<FakeDriverState>,
}

#[async_trait]
impl Connection for FakeConnection {
    fn kind(&self) -> DbKind {
        self.kind
    }

    async fn ping(&self) -> Result<(), AgentError> {
        if let Some(message) = rwlock_read(&self.state.ping_error).clone() {
            return Err(AgentError::connection_failed(message));
        }
        Ok(())
    }

    async fn execute(&self, query: &ExecutedQuery, _cancel: &CancelToken, _deadline: Duration) -> Result<QueryResult, AgentError> {
        mutex_lock(&self.state.executed_queries).push(query.clone());

        let key = outcome_key(query);
        if let Some(outcome) = rwlock_read(&self.state.query_outcomes).get(&key).cloned() {
            return outcome.into_result();
        }
        if let Some(outcome) = rwlock_read(&self.state.default_outcome).clone() {
            return outcome.into_result();
        }
        Ok(QueryResult::empty())
    }

    async fn introspect_schema(&self) -> Result<SchemaPayload, AgentError> {
        Ok(rwlock_read(&self.state.schema).clone())
    }

    async fn close(&self) -> Result<(), AgentError> {
        self.state.close_calls.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

fn rwlock_read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn rwlock_write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

fn mutex_lock<T>(lock: &Mutex<T>) -> MutexGuard<'_, T> {
    match lock.lock() {
        Ok(guard) => guard,
        Err(poison_error) => poison_error.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::DatabaseEndpoint;

    #[tokio::test]
    async fn execute_uses_configured_outcome_and_records_stats() {
        let driver = FakeDriver::new(DbKind::SqlA)
        .with_query_error("SELECT boom", "boom")
        .with_default_result(QueryResult::empty());

        let endpoint = DatabaseEndpoint::new("postgres://host/db".into(), Some(DbKind::SqlA)).unwrap();
        let connection = driver.connect(&endpoint).await.expect("fake connection should work");
        let cancel = CancelToken::new();

        let ok_query = ExecutedQuery::Relational { sql: "SELECT 1".into(), parameters: vec![] };
        let err_query = ExecutedQuery::Relational { sql: "SELECT boom".into(), parameters: vec![] };

        assert!(connection.execute(&ok_query, &cancel, Duration::from_secs(1)).await.is_ok());
        assert!(matches!(
                connection.execute(&err_query, &cancel, Duration::from_secs(1)).await,
                Err(AgentError::DbError(_))
        ));

        assert_eq!(driver.stats().executed_queries.len(), 2);
    }

    #[tokio::test]
    async fn connect_error_is_returned_before_any_query() {
        let driver = FakeDriver::new(DbKind::SqlA).with_connect_error("refused");
        let endpoint = DatabaseEndpoint::new("postgres://host/db".into(), Some(DbKind::SqlA)).unwrap();

        let err = driver.connect(&endpoint).await.unwrap_err();
        assert!(matches!(err, AgentError::ConnectionFailed(_)));
    }
}
