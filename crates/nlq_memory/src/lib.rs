//! Memory Store: per-user query history, pattern counters,
//! preferences, and skill-level progression.

use std::sync::Arc;

use nlq_core::{AgentError, MemoryRecord, UserProfile};
use nlq_storage::Storage;
use serde::{Deserialize, Serialize};

const RECENT_RECORDS_FOR_INSIGHTS: i64 = 50;

/// Summary handed to the Planner as context.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryInsights {
    pub similar_queries: u64,
    pub skill_level: nlq_core::SkillLevel,
    pub pattern_label: Option<String>,
}

pub struct MemoryStore {
    storage: Arc<Storage>,
}

impl MemoryStore {
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }

    /// Insights for a user before a turn runs: how many of their recent
    /// records share a pattern label with similar text, their current
    /// skill level, and their most common mistake pattern if any.
    pub async fn insights_for(&self, user_id: &str, pattern_label: &str) -> Result<MemoryInsights, AgentError> {
        let profile = self.profile_or_default(user_id).await?;
        let recent = self
        .storage
        .recent_memory_records(user_id, RECENT_RECORDS_FOR_INSIGHTS)
        .await
        .map_err(|e| AgentError::db_error(e.to_string()))?;

        let similar_queries = recent.iter().filter(|r| r.pattern_label == pattern_label).count() as u64;

        Ok(MemoryInsights {
                similar_queries,
                skill_level: profile.skill_level,
                pattern_label: profile.common_mistakes.first().cloned(),
        })
    }

    /// Records a completed turn.
    /// MemoryRecord write happens-before the UserProfile update so an
    /// observer reading the profile after this returns sees both.
    pub async fn record_turn(&self, record: MemoryRecord) -> Result<(), AgentError> {
        let succeeded = record.succeeded;
        let pattern_label = record.pattern_label.clone();
        let user_id = record.user_id.clone();

        self.storage
        .insert_memory_record(&record)
        .await
        .map_err(|e| AgentError::db_error(e.to_string()))?;

        let mut profile = self.profile_or_default(&user_id).await?;
        profile.record_turn(succeeded, &pattern_label);
        for object in &record.collections_or_tables {
            if !profile.frequent_collections.contains(object) {
                profile.frequent_collections.push(object.clone());
            }
        }

        self.storage
        .put_user_profile(&profile)
        .await
        .map_err(|e| AgentError::db_error(e.to_string()))?;

        Ok(())
    }

    /// Attaches a user's thumbs up/down to a previously recorded turn,
    /// looked up by the `queryId` a response handed back. `BadInput` if no record with that id was ever written.
    pub async fn attach_feedback(&self, query_id: uuid::Uuid, feedback: nlq_core::Feedback) -> Result<(), AgentError> {
        let found = self
        .storage
        .set_memory_record_feedback(query_id, feedback)
        .await
        .map_err(|e| AgentError::db_error(e.to_string()))?;
        if found {
            Ok(())
        } else {
            Err(AgentError::bad_input(format!("unknown queryId: {query_id}")))
        }
    }

    async fn profile_or_default(&self, user_id: &str) -> Result<UserProfile, AgentError> {
        match self.storage.get_user_profile(user_id).await.map_err(|e| AgentError::db_error(e.to_string()))? {
            Some(profile) => Ok(profile),
            None => Ok(UserProfile::new(user_id)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use nlq_core::QueryKind;

    async fn store() -> MemoryStore {
        let storage = Storage::connect("sqlite::memory:").await.unwrap();
        MemoryStore::new(Arc::new(storage))
    }

    fn record(user_id: &str, succeeded: bool, pattern_label: &str) -> MemoryRecord {
        MemoryRecord {
            query_id: uuid::Uuid::new_v4(),
            user_id: user_id.into(),
            db_key: "key".into(),
            original_text: "how many orders".into(),
            generated_query_description: "count orders".into(),
            query_kind: QueryKind::Count,
            collections_or_tables: vec!["orders".into()],
            execution_millis: 5,
            result_count: 1,
            succeeded,
            feedback: None,
            context_tags: vec![],
            pattern_label: pattern_label.into(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn record_turn_updates_profile_and_insights() {
        let store = store().await;
        store.record_turn(record("alice", true, "count_query")).await.unwrap();
        let insights = store.insights_for("alice", "count_query").await.unwrap();
        assert_eq!(insights.similar_queries, 1);
    }

    #[tokio::test]
    async fn failed_turn_records_mistake_pattern() {
        let store = store().await;
        store.record_turn(record("bob", false, "DELETE_WITHOUT_WHERE")).await.unwrap();
        let insights = store.insights_for("bob", "DELETE_WITHOUT_WHERE").await.unwrap();
        assert_eq!(insights.pattern_label.as_deref(), Some("DELETE_WITHOUT_WHERE"));
    }

    #[tokio::test]
    async fn attach_feedback_finds_record_by_query_id() {
        let store = store().await;
        let entry = record("carol", true, "count_query");
        let query_id = entry.query_id;
        store.record_turn(entry).await.unwrap();

        store.attach_feedback(query_id, nlq_core::Feedback::Positive).await.unwrap();
    }

    #[tokio::test]
    async fn attach_feedback_rejects_unknown_query_id() {
        let store = store().await;
        let result = store.attach_feedback(uuid::Uuid::new_v4(), nlq_core::Feedback::Negative).await;
        assert!(matches!(result, Err(AgentError::BadInput(_))));
    }
}
