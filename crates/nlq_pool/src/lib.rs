//! Connection Pool: per-URL cached handles with single-flight preflight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use nlq_core::{AgentError, Connection, DatabaseEndpoint, DbDriver, DbKind};
use tokio::sync::{Mutex, Notify, RwLock};

/// Fallback preflight bound when no configured timeout is supplied (tests,
/// callers that haven't threaded one through yet).
pub const DEFAULT_PREFLIGHT_BOUND: Duration = Duration::from_secs(5);

struct PoolEntry {
    connection: Arc<dyn Connection>,
}

/// In-flight marker for a key currently being preflighted by another caller
///.
struct InFlight {
    notify: Arc<Notify>,
    result: Mutex<Option<Result<Arc<dyn Connection>, String>>>,
}

/// Caches live connections keyed by `DatabaseEndpoint::db_key()`, dispatching
/// to the `DbDriver` registered for the endpoint's kind.
pub struct ConnectionPool {
    drivers: HashMap<DbKind, Arc<dyn DbDriver>>,
    entries: RwLock<HashMap<String, Arc<PoolEntry>>>,
    in_flight: Mutex<HashMap<String, Arc<InFlight>>>,
    preflight_bound: Duration,
}

impl ConnectionPool {
    pub fn new(drivers: HashMap<DbKind, Arc<dyn DbDriver>>) -> Self {
        Self::with_preflight_bound(drivers, DEFAULT_PREFLIGHT_BOUND)
    }

    pub fn with_preflight_bound(drivers: HashMap<DbKind, Arc<dyn DbDriver>>, preflight_bound: Duration) -> Self {
        Self {
            drivers,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            preflight_bound,
        }
    }

    /// Returns a live handle for `endpoint`, reusing a cached connection when
    /// one exists. The first caller for a not-yet-cached key runs the
    /// preflight; concurrent callers for the same key await its result
    /// instead of each issuing their own probe.
    pub async fn acquire(&self, endpoint: &DatabaseEndpoint) -> Result<Arc<dyn Connection>, AgentError> {
        let key = endpoint.db_key();

        if let Some(entry) = self.entries.read().await.get(&key) {
            return Ok(entry.connection.clone());
        }

        let (leader, flight) = {
            let mut in_flight = self.in_flight.lock().await;
            if let Some(existing) = in_flight.get(&key) {
                (false, existing.clone())
            } else {
                let flight = Arc::new(InFlight {
                        notify: Arc::new(Notify::new()),
                        result: Mutex::new(None),
                });
                in_flight.insert(key.clone(), flight.clone());
                (true, flight)
            }
        };

        if leader {
            let outcome = self.preflight_and_insert(&key, endpoint).await;
            {
                let mut slot = flight.result.lock().await;
                *slot = Some(outcome.clone().map_err(|e| e.to_string()));
            }
            flight.notify.notify_waiters();
            self.in_flight.lock().await.remove(&key);
            return outcome;
        }

        flight.notify.notified().await;
        let slot = flight.result.lock().await;
        match slot.as_ref() {
            Some(Ok(conn)) => Ok(conn.clone()),
            Some(Err(msg)) => Err(AgentError::connection_failed(msg.clone())),
            None => Err(AgentError::connection_failed("preflight result missing")),
        }
    }

    async fn preflight_and_insert(
        &self,
        key: &str,
        endpoint: &DatabaseEndpoint,
    ) -> Result<Arc<dyn Connection>, AgentError> {
        let driver = self
        .drivers
        .get(&endpoint.kind)
        .ok_or_else(|| AgentError::UnsupportedEndpoint(endpoint.kind.label().to_string()))?;

        let connection: Arc<dyn Connection> = tokio::time::timeout(self.preflight_bound, driver.connect(endpoint))
        .await
        .map_err(|_| AgentError::connection_failed("preflight timed out"))??
        .into();

        tokio::time::timeout(self.preflight_bound, connection.ping())
        .await
        .map_err(|_| AgentError::connection_failed("liveness probe timed out"))??;

        self.entries
        .write()
        .await
        .insert(key.to_string(), Arc::new(PoolEntry { connection: connection.clone() }));

        Ok(connection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nlq_core::{CancelToken, ExecutedQuery, QueryResult, SchemaPayload};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingConnection;

    #[async_trait]
    impl Connection for CountingConnection {
        fn kind(&self) -> DbKind {
            DbKind::SqlA
        }
        async fn ping(&self) -> Result<(), AgentError> {
            Ok(())
        }
        async fn execute(&self, _q: &ExecutedQuery, _c: &CancelToken, _d: Duration) -> Result<QueryResult, AgentError> {
            Ok(QueryResult::empty())
        }
        async fn introspect_schema(&self) -> Result<SchemaPayload, AgentError> {
            Ok(SchemaPayload::empty(DbKind::SqlA))
        }
        async fn close(&self) -> Result<(), AgentError> {
            Ok(())
        }
    }

    struct CountingDriver {
        connects: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DbDriver for CountingDriver {
        fn kind(&self) -> DbKind {
            DbKind::SqlA
        }
        async fn connect(&self, _endpoint: &DatabaseEndpoint) -> Result<Box<dyn Connection>, AgentError> {
            self.connects.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(Box::new(CountingConnection))
        }
    }

    #[tokio::test]
    async fn concurrent_acquire_for_same_key_coalesces_into_one_connect() {
        let connects = Arc::new(AtomicUsize::new(0));
        let mut drivers: HashMap<DbKind, Arc<dyn DbDriver>> = HashMap::new();
        drivers.insert(DbKind::SqlA, Arc::new(CountingDriver { connects: connects.clone() }));
        let pool = Arc::new(ConnectionPool::new(drivers));
        let endpoint = Arc::new(DatabaseEndpoint::new("postgres://host/db".into(), Some(DbKind::SqlA)).unwrap());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let pool = pool.clone();
            let endpoint = endpoint.clone();
            handles.push(tokio::spawn(async move { pool.acquire(&endpoint).await }));
        }
        for h in handles {
            h.await.unwrap().unwrap();
        }

        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn sequential_acquire_for_same_endpoint_reuses_connection_identity() {
        let connects = Arc::new(AtomicUsize::new(0));
        let mut drivers: HashMap<DbKind, Arc<dyn DbDriver>> = HashMap::new();
        drivers.insert(DbKind::SqlA, Arc::new(CountingDriver { connects: connects.clone() }));
        let pool = ConnectionPool::new(drivers);
        let endpoint = DatabaseEndpoint::new("postgres://host/db".into(), Some(DbKind::SqlA)).unwrap();

        let first = pool.acquire(&endpoint).await.unwrap();
        let second = pool.acquire(&endpoint).await.unwrap();

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(connects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_kind_fails_without_registered_driver() {
        let pool = ConnectionPool::new(HashMap::new());
        let endpoint = DatabaseEndpoint::new("postgres://host/db".into(), Some(DbKind::SqlA)).unwrap();
        let err = pool.acquire(&endpoint).await.unwrap_err();
        assert!(matches!(err, AgentError::UnsupportedEndpoint(_)));
    }
}
