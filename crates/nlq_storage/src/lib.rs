//! Async SQLite-backed persistence for sessions, chat messages, memory
//! records, user profiles, and schema snapshots.
//!
//! Each row stores its domain type serialized as JSON in a single column
//! rather than a fully-normalized relational schema — these types already
//! have a stable `serde` shape from `nlq_core`, and the access pattern here
//! is always whole-record read/write, never partial-column queries.

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use thiserror::Error;

use nlq_core::{ChatMessage, Feedback, MemoryRecord, SchemaSnapshot, Session, UserProfile};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database error: {0}")]
    Db(#[from] sqlx::Error),
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Opens a SQLite pool and applies migrations.
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = SqlitePoolOptions::new().max_connections(8).connect(database_url).await?;
        let storage = Self { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> Result<(), StorageError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_snapshots (
                db_key TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                payload TEXT NOT NULL,
                last_built TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS memory_records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                query_id TEXT NOT NULL UNIQUE,
                user_id TEXT NOT NULL,
                db_key TEXT NOT NULL,
                record TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS user_profiles (
                user_id TEXT PRIMARY KEY,
                profile TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                session TEXT NOT NULL,
                last_activity TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS chat_messages (
                id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                message TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // -- Schema snapshots --

    pub async fn get_schema_snapshot(&self, db_key: &str) -> Result<Option<SchemaSnapshot>, StorageError> {
        let row = sqlx::query("SELECT payload FROM schema_snapshots WHERE db_key = ?1").bind(db_key).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                let payload: String = row.try_get("payload")?;
                Ok(Some(serde_json::from_str(&payload)?))
            }
            None => Ok(None),
        }
    }

    pub async fn put_schema_snapshot(&self, snapshot: &SchemaSnapshot) -> Result<(), StorageError> {
        let payload = serde_json::to_string(snapshot)?;
        sqlx::query(
            "INSERT INTO schema_snapshots (db_key, kind, payload, last_built)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(db_key) DO UPDATE SET kind = ?2, payload = ?3, last_built = ?4",
        )
        .bind(&snapshot.db_key)
        .bind(snapshot.kind.label())
        .bind(&payload)
        .bind(snapshot.last_built.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // -- Memory records --

    pub async fn insert_memory_record(&self, record: &MemoryRecord) -> Result<(), StorageError> {
        let body = serde_json::to_string(record)?;
        sqlx::query("INSERT INTO memory_records (query_id, user_id, db_key, record, timestamp) VALUES (?1, ?2, ?3, ?4, ?5)")
            .bind(record.query_id.to_string())
            .bind(&record.user_id)
            .bind(&record.db_key)
            .bind(&body)
            .bind(record.timestamp.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Attaches feedback to the record identified by `query_id`, read-modify-write
    /// since the record is stored as a single JSON blob (module doc comment).
    /// Returns `false` if no record with that id exists.
    pub async fn set_memory_record_feedback(&self, query_id: uuid::Uuid, feedback: Feedback) -> Result<bool, StorageError> {
        let row = sqlx::query("SELECT record FROM memory_records WHERE query_id = ?1").bind(query_id.to_string()).fetch_optional(&self.pool).await?;
        let Some(row) = row else {
            return Ok(false);
        };
        let body: String = row.try_get("record")?;
        let mut record: MemoryRecord = serde_json::from_str(&body)?;
        record.feedback = Some(feedback);
        let updated = serde_json::to_string(&record)?;

        sqlx::query("UPDATE memory_records SET record = ?1 WHERE query_id = ?2").bind(&updated).bind(query_id.to_string()).execute(&self.pool).await?;
        Ok(true)
    }

    /// Most recent records for a user, newest first, for similarity hints
    /// and pattern-label lookups.
    pub async fn recent_memory_records(&self, user_id: &str, limit: i64) -> Result<Vec<MemoryRecord>, StorageError> {
        let rows = sqlx::query("SELECT record FROM memory_records WHERE user_id = ?1 ORDER BY timestamp DESC LIMIT ?2")
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let body: String = row.try_get("record")?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }

    // -- User profiles --

    pub async fn get_user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, StorageError> {
        let row = sqlx::query("SELECT profile FROM user_profiles WHERE user_id = ?1").bind(user_id).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                let body: String = row.try_get("profile")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    pub async fn put_user_profile(&self, profile: &UserProfile) -> Result<(), StorageError> {
        let body = serde_json::to_string(profile)?;
        sqlx::query("INSERT INTO user_profiles (user_id, profile) VALUES (?1, ?2) ON CONFLICT(user_id) DO UPDATE SET profile = ?2")
            .bind(&profile.user_id)
            .bind(&body)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // -- Sessions --

    pub async fn get_session(&self, session_id: uuid::Uuid) -> Result<Option<Session>, StorageError> {
        let row = sqlx::query("SELECT session FROM sessions WHERE session_id = ?1").bind(session_id.to_string()).fetch_optional(&self.pool).await?;
        match row {
            Some(row) => {
                let body: String = row.try_get("session")?;
                Ok(Some(serde_json::from_str(&body)?))
            }
            None => Ok(None),
        }
    }

    pub async fn put_session(&self, session: &Session) -> Result<(), StorageError> {
        let body = serde_json::to_string(session)?;
        sqlx::query(
            "INSERT INTO sessions (session_id, user_id, session, last_activity) VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(session_id) DO UPDATE SET session = ?3, last_activity = ?4",
        )
        .bind(session.session_id.to_string())
        .bind(&session.user_id)
        .bind(&body)
        .bind(session.last_activity.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Every session owned by `user_id`, most recently active first.
    pub async fn sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query("SELECT session FROM sessions WHERE user_id = ?1 ORDER BY last_activity DESC").bind(user_id).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let body: String = row.try_get("session")?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }

    /// Sessions whose `last_activity` is older than `cutoff` (auto-expiry sweep).
    pub async fn expired_sessions(&self, cutoff: DateTime<Utc>) -> Result<Vec<Session>, StorageError> {
        let rows = sqlx::query("SELECT session FROM sessions WHERE last_activity < ?1").bind(cutoff.to_rfc3339()).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let body: String = row.try_get("session")?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }

    // -- Chat messages --

    pub async fn append_chat_message(&self, message: &ChatMessage) -> Result<(), StorageError> {
        let body = serde_json::to_string(message)?;
        sqlx::query("INSERT INTO chat_messages (id, session_id, message, timestamp) VALUES (?1, ?2, ?3, ?4)")
            .bind(message.id.to_string())
            .bind(message.session_id.to_string())
            .bind(&body)
            .bind(message.timestamp.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_chat_messages(&self, session_id: uuid::Uuid) -> Result<Vec<ChatMessage>, StorageError> {
        let rows = sqlx::query("SELECT message FROM chat_messages WHERE session_id = ?1 ORDER BY timestamp ASC").bind(session_id.to_string()).fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|row| {
                let body: String = row.try_get("message")?;
                Ok(serde_json::from_str(&body)?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::{DbKind, QueryKind, SchemaPayload};

    async fn in_memory() -> Storage {
        Storage::connect("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn schema_snapshot_round_trips() {
        let storage = in_memory().await;
        let snapshot = SchemaSnapshot {
            db_key: "abc".into(),
            kind: DbKind::SqlA,
            payload: SchemaPayload::empty(DbKind::SqlA),
            last_built: Utc::now(),
        };
        storage.put_schema_snapshot(&snapshot).await.unwrap();
        let fetched = storage.get_schema_snapshot("abc").await.unwrap().unwrap();
        assert_eq!(fetched.db_key, "abc");
    }

    #[tokio::test]
    async fn missing_profile_returns_none() {
        let storage = in_memory().await;
        assert!(storage.get_user_profile("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn feedback_attaches_to_record_by_query_id() {
        let storage = in_memory().await;
        let query_id = uuid::Uuid::new_v4();
        let record = MemoryRecord {
            query_id,
            user_id: "alice".into(),
            db_key: "key".into(),
            original_text: "how many orders".into(),
            generated_query_description: "count orders".into(),
            query_kind: QueryKind::Count,
            collections_or_tables: vec!["orders".into()],
            execution_millis: 5,
            result_count: 1,
            succeeded: true,
            feedback: None,
            context_tags: vec![],
            pattern_label: "COUNT:orders".into(),
            timestamp: Utc::now(),
        };
        storage.insert_memory_record(&record).await.unwrap();

        assert!(storage.set_memory_record_feedback(query_id, nlq_core::Feedback::Positive).await.unwrap());

        let fetched = storage.recent_memory_records("alice", 10).await.unwrap();
        assert_eq!(fetched[0].feedback, Some(nlq_core::Feedback::Positive));
    }

    #[tokio::test]
    async fn feedback_for_unknown_query_id_returns_false() {
        let storage = in_memory().await;
        assert!(!storage.set_memory_record_feedback(uuid::Uuid::new_v4(), nlq_core::Feedback::Negative).await.unwrap());
    }
}
