use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::DatabaseEndpoint;

const RECENT_QUERIES_CAPACITY: usize = 5;

/// Session-scoped conversation state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    pub last_db_endpoint: Option<DatabaseEndpoint>,
    #[serde(default)]
    pub recent_queries: VecDeque<String>,
}

impl SessionContext {
    /// Pushes a query onto the bounded recent-queries ring.
    pub fn push_recent_query(&mut self, text: String) {
        if self.recent_queries.len() >= RECENT_QUERIES_CAPACITY {
            self.recent_queries.pop_front();
        }
        self.recent_queries.push_back(text);
    }
}

/// A WebSocket-scoped conversation belonging to exactly one user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub message_count: u64,
    pub active: bool,
    pub context: SessionContext,
}

impl Session {
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            user_id: user_id.into(),
            created_at: now,
            last_activity: now,
            message_count: 0,
            active: true,
            context: SessionContext::default(),
        }
    }

    /// Whether `user_id` may join or send on this session.
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.user_id == user_id
    }

    /// Auto-expiry check: inactive longer than `inactivity_window` (default
    /// 30 days).
    pub fn is_expired(&self, now: DateTime<Utc>, inactivity_window: chrono::Duration) -> bool {
        now - self.last_activity >= inactivity_window
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
        self.message_count += 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Agent,
    System,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageMetadata {
    #[serde(default)]
    pub query_kind: Option<String>,
    #[serde(default)]
    pub execution_millis: Option<u64>,
    #[serde(default)]
    pub data_retrieved: Option<bool>,
    #[serde(default)]
    pub tools_used: Vec<String>,
    #[serde(default)]
    pub confidence: Option<f64>,
}

/// Append-only, per-session turn record. `user_id` is `None` when
/// `role` is `Agent` or `System` (the source's `userId|"agent"` union).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: Uuid,
    pub session_id: Uuid,
    pub user_id: Option<String>,
    pub text: String,
    pub role: ChatRole,
    pub timestamp: DateTime<Utc>,
    pub metadata: ChatMessageMetadata,
}

impl ChatMessage {
    pub fn user(session_id: Uuid, user_id: impl Into<String>, text: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            user_id: Some(user_id.into()),
            text: text.into(),
            role: ChatRole::User,
            timestamp: now,
            metadata: ChatMessageMetadata::default(),
        }
    }

    pub fn agent(session_id: Uuid, text: impl Into<String>, now: DateTime<Utc>, metadata: ChatMessageMetadata) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            user_id: None,
            text: text.into(),
            role: ChatRole::Agent,
            timestamp: now,
            metadata,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recent_queries_are_bounded_to_five() {
        let mut ctx = SessionContext::default();
        for i in 0..8 {
            ctx.push_recent_query(format!("query {}", i));
        }
        assert_eq!(ctx.recent_queries.len(), 5);
        assert_eq!(ctx.recent_queries.front().unwrap(), "query 3");
    }

    #[test]
    fn session_ownership_is_exclusive() {
        let session = Session::new("alice", Utc::now());
        assert!(session.is_owned_by("alice"));
        assert!(!session.is_owned_by("bob"));
    }
}
