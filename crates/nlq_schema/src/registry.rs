use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use nlq_core::{AgentError, Connection, DatabaseEndpoint, SchemaSnapshot};
use nlq_storage::Storage;
use tokio::sync::{Mutex, Notify};

const DEFAULT_TTL_DAYS: i64 = 1;

struct InFlight {
    notify: Arc<Notify>,
    result: Mutex<Option<Result<SchemaSnapshot, String>>>,
}

/// Thin persistence layer over SchemaSnapshot, with single-flight
/// rebuild coalescing so a burst of concurrent requests against an
/// uncached or stale key triggers exactly one introspection.
pub struct SchemaRegistry {
    storage: Arc<Storage>,
    ttl: Duration,
    in_flight: Mutex<HashMap<String, Arc<InFlight>>>,
}

impl SchemaRegistry {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self {
            storage,
            ttl: Duration::days(DEFAULT_TTL_DAYS),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_ttl(storage: Arc<Storage>, ttl: Duration) -> Self {
        Self {
            storage,
            ttl,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns a fresh-enough cached snapshot, or rebuilds via `connection`'s
    /// introspection and persists the result.
    pub async fn get_or_build(
        &self,
        endpoint: &DatabaseEndpoint,
        connection: &dyn Connection,
        force_rebuild: bool,
    ) -> Result<SchemaSnapshot, AgentError> {
        let key = endpoint.db_key();

        if !force_rebuild {
            if let Some(cached) = self.storage.get_schema_snapshot(&key).await.ok().flatten() {
                if cached.is_fresh(Utc::now(), self.ttl) {
                    return Ok(cached);
                }
            }
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
            let outcome = self.rebuild(&key, endpoint, connection).await;
            {
                let mut slot = flight.result.lock().await;
                *slot = Some(outcome.clone().map_err(|e| e.to_string()));
            }
            flight.notify.notify_waiters();
            self.in_flight.lock().await.remove(&key);
            return outcome;
        }

        // Create the Notified future before checking the result slot: tokio's
        // Notify guarantees a notify_waiters() call occurring after the future
        // is created (even before it's first polled) is still observed, so
        // this ordering can't miss the leader's notification.
        let notified = flight.notify.notified();
        if flight.result.lock().await.is_none() {
            notified.await;
        }
        let slot = flight.result.lock().await;
        match slot.as_ref() {
            Some(Ok(snapshot)) => Ok(snapshot.clone()),
            Some(Err(msg)) => Err(AgentError::SchemaBuildFailed(msg.clone())),
            None => Err(AgentError::SchemaBuildFailed("rebuild result missing".into())),
        }
    }

    async fn rebuild(
        &self,
        key: &str,
        endpoint: &DatabaseEndpoint,
        connection: &dyn Connection,
    ) -> Result<SchemaSnapshot, AgentError> {
        let payload = connection
        .introspect_schema()
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

        let snapshot = SchemaSnapshot {
            db_key: key.to_string(),
            kind: endpoint.kind,
            payload,
            last_built: Utc::now(),
        };

        self.storage
        .put_schema_snapshot(&snapshot)
        .await
        .map_err(|e| AgentError::SchemaBuildFailed(e.to_string()))?;

        Ok(snapshot)
    }
}
