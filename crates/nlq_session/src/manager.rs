use std::sync::Arc;

use chrono::{Duration, Utc};
use nlq_core::{AgentError, ChatMessage, ChatMessageMetadata, DbKind, Session};
use nlq_planner::{AgentPipeline, AgentResponse, PipelineOptions};
use nlq_storage::Storage;
use tracing::{info, warn};
use uuid::Uuid;

const DEFAULT_INACTIVITY_WINDOW_DAYS: i64 = 30;

/// The reply to a `send` call: the shaped agent response plus the
/// session's updated bookkeeping, handed back to the WebSocket layer.
pub struct SendOutcome {
    pub response: AgentResponse,
    pub session: Session,
}

/// Session Manager: conversation state, DB-context reuse across
/// turns on a socket, and the auto-expiry sweep. Composes the Agent
/// Pipeline and Storage the way the teacher's facade composes sub-managers
/// — one struct, cross-cutting orchestration lives on it, single-concern
/// reads/writes delegate straight to `storage`.
pub struct SessionManager {
    storage: Arc<Storage>,
    pipeline: Arc<AgentPipeline>,
    inactivity_window: Duration,
}

impl SessionManager {
    pub fn new(storage: Arc<Storage>, pipeline: Arc<AgentPipeline>) -> Self {
        Self { storage, pipeline, inactivity_window: Duration::days(DEFAULT_INACTIVITY_WINDOW_DAYS) }
    }

    pub fn with_inactivity_window(storage: Arc<Storage>, pipeline: Arc<AgentPipeline>, inactivity_window: Duration) -> Self {
        Self { storage, pipeline, inactivity_window }
    }

    /// `create-session`.
    pub async fn create_session(&self, user_id: &str) -> Result<Session, AgentError> {
        let session = Session::new(user_id, Utc::now());
        self.storage.put_session(&session).await.map_err(|e| AgentError::db_error(e.to_string()))?;
        Ok(session)
    }

    /// `join-session` / `get-session`. Enforces single-owner access:
    /// only the owning user may join or send on a session.
    pub async fn get_session(&self, session_id: Uuid, user_id: &str) -> Result<Session, AgentError> {
        let session = self
        .storage
        .get_session(session_id)
        .await
        .map_err(|e| AgentError::db_error(e.to_string()))?
        .ok_or_else(|| AgentError::SessionNotFound(session_id.to_string()))?;

        if !session.is_owned_by(user_id) {
            return Err(AgentError::Unauthorized(format!("session {session_id} does not belong to {user_id}")));
        }

        Ok(session)
    }

    /// `delete-session`.
    pub async fn delete_session(&self, session_id: Uuid, user_id: &str) -> Result<(), AgentError> {
        let mut session = self.get_session(session_id, user_id).await?;
        session.active = false;
        self.storage.put_session(&session).await.map_err(|e| AgentError::db_error(e.to_string()))
    }

    /// `send-message`: resolves the effective DB endpoint (an
    /// explicit override, or the session's remembered last endpoint),
    /// appends the user message, runs the turn through the Agent Pipeline,
    /// appends the agent's reply, and persists updated session bookkeeping.
    pub async fn send(
        &self,
        session_id: Uuid,
        user_id: &str,
        text: &str,
        db_endpoint_override: Option<(String, Option<DbKind>)>,
        options: PipelineOptions,
    ) -> Result<SendOutcome, AgentError> {
        let mut session = self.get_session(session_id, user_id).await?;

        let (db_url, db_kind_hint) = match db_endpoint_override {
            Some((url, kind)) => (url, kind),
            None => {
                let remembered = session
                .context
                .last_db_endpoint
                .as_ref()
                .ok_or_else(|| AgentError::bad_input("no dbUrl provided and session has no remembered endpoint"))?;
                (remembered.url.clone(), Some(remembered.kind))
            }
        };

        let now = Utc::now();
        let user_message = ChatMessage::user(session_id, user_id, text, now);
        self.storage.append_chat_message(&user_message).await.map_err(|e| AgentError::db_error(e.to_string()))?;

        let response = self.pipeline.handle_turn(user_id, text, &db_url, db_kind_hint, options).await?;

        let metadata = ChatMessageMetadata {
            query_kind: None,
            execution_millis: response.execution_millis,
            data_retrieved: Some(response.data.is_some()),
            tools_used: Vec::new(),
            confidence: None,
        };
        let agent_message = ChatMessage::agent(session_id, response.message.clone(), Utc::now(), metadata);
        self.storage.append_chat_message(&agent_message).await.map_err(|e| AgentError::db_error(e.to_string()))?;

        session.touch(Utc::now());
        session.context.push_recent_query(text.to_string());
        session.context.last_db_endpoint = Some(nlq_core::DatabaseEndpoint::new(db_url, db_kind_hint)?);
        self.storage.put_session(&session).await.map_err(|e| AgentError::db_error(e.to_string()))?;

        Ok(SendOutcome { response, session })
    }

    /// `list`: every session owned by `user_id`.
    pub async fn list(&self, user_id: &str) -> Result<Vec<Session>, AgentError> {
        self.storage.sessions_for_user(user_id).await.map_err(|e| AgentError::db_error(e.to_string()))
    }

    pub async fn history(&self, session_id: Uuid, user_id: &str) -> Result<Vec<ChatMessage>, AgentError> {
        self.get_session(session_id, user_id).await?;
        self.storage.list_chat_messages(session_id).await.map_err(|e| AgentError::db_error(e.to_string()))
    }

    /// Housekeeping sweep.
    /// Not on the request path — intended to run on a periodic timer from
    /// the server binary. Soft-closing (marking inactive rather than
    /// deleting) is distinguished from hard expiry only by the caller's
    /// choice of which rows `expired_sessions` is asked to name as a cutoff.
    pub async fn sweep_expired(&self) -> Result<usize, AgentError> {
        let cutoff = Utc::now() - self.inactivity_window;
        let expired = self.storage.expired_sessions(cutoff).await.map_err(|e| AgentError::db_error(e.to_string()))?;

        let mut closed = 0;
        for mut session in expired {
            if !session.active {
                continue;
            }
            session.active = false;
            match self.storage.put_session(&session).await {
                Ok(()) => closed += 1,
                Err(e) => warn!(session_id = %session.session_id, error = %e, "failed to soft-close expired session"),
            }
        }

        if closed > 0 {
            info!(count = closed, "soft-closed expired sessions");
        }
        Ok(closed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> Arc<Storage> {
        Arc::new(Storage::connect("sqlite::memory:").await.unwrap())
    }

    #[tokio::test]
    async fn get_session_rejects_non_owner() {
        let storage = storage().await;
        let memory = Arc::new(nlq_memory::MemoryStore::new(storage.clone()));
        let schema_registry = Arc::new(nlq_schema::SchemaRegistry::new(storage.clone()));
        let pool = Arc::new(nlq_pool::ConnectionPool::new(Default::default()));
        let pipeline = Arc::new(AgentPipeline::new(pool, schema_registry, memory, None, std::time::Duration::from_secs(1), std::time::Duration::from_secs(1), false, nlq_safety::DEFAULT_ROW_CAP));
        let manager = SessionManager::new(storage, pipeline);

        let session = manager.create_session("alice").await.unwrap();
        let err = manager.get_session(session.session_id, "mallory").await.unwrap_err();
        assert!(matches!(err, AgentError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn unknown_session_id_is_not_found() {
        let storage = storage().await;
        let memory = Arc::new(nlq_memory::MemoryStore::new(storage.clone()));
        let schema_registry = Arc::new(nlq_schema::SchemaRegistry::new(storage.clone()));
        let pool = Arc::new(nlq_pool::ConnectionPool::new(Default::default()));
        let pipeline = Arc::new(AgentPipeline::new(pool, schema_registry, memory, None, std::time::Duration::from_secs(1), std::time::Duration::from_secs(1), false, nlq_safety::DEFAULT_ROW_CAP));
        let manager = SessionManager::new(storage, pipeline);

        let err = manager.get_session(Uuid::new_v4(), "alice").await.unwrap_err();
        assert!(matches!(err, AgentError::SessionNotFound(_)));
    }
}
