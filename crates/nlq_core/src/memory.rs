use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `queryKind` recorded on a MemoryRecord. Distinct from
/// `ExecutedQuery::query_kind()`'s string form — `conversation` has no
/// corresponding ExecutedQuery at all (greeting short-circuit, scenario 3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum QueryKind {
    Read,
    ReadOne,
    Count,
    Aggregate,
    Sql,
    Insert,
    Update,
    Delete,
    Conversation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Feedback {
    #[serde(rename = "+")]
    Positive,
    #[serde(rename = "-")]
    Negative,
}

/// One per executed turn. Immutable after write except for `feedback`,
/// which a later user action may attach. `query_id` is the handle a client
/// echoes back in `POST /api/feedback` to attach it to this turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryRecord {
    pub query_id: Uuid,
    pub user_id: String,
    pub db_key: String,
    pub original_text: String,
    pub generated_query_description: String,
    pub query_kind: QueryKind,
    pub collections_or_tables: Vec<String>,
    pub execution_millis: u64,
    pub result_count: u64,
    pub succeeded: bool,
    pub feedback: Option<Feedback>,
    pub context_tags: Vec<String>,
    pub pattern_label: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SkillLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl SkillLevel {
    /// Skill level for a user with `successful_count` successful records:
    /// >50 promotes beginner→intermediate, >150 promotes to advanced.
    pub fn for_successful_count(successful_count: u64) -> Self {
        if successful_count > 150 {
            SkillLevel::Advanced
        } else if successful_count > 50 {
            SkillLevel::Intermediate
        } else {
            SkillLevel::Beginner
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreferredDetail {
    Brief,
    Verbose,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternCounter {
    pub label: String,
    pub count: u64,
    pub last_used: DateTime<Utc>,
}

/// One per userId. Built up incrementally as MemoryRecords are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub user_id: String,
    pub frequent_collections: Vec<String>,
    pub pattern_counters: Vec<PatternCounter>,
    pub skill_level: SkillLevel,
    pub preferred_detail: PreferredDetail,
    pub common_mistakes: Vec<String>,
    #[serde(default)]
    pub successful_count: u64,
}

impl UserProfile {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            frequent_collections: Vec::new(),
            pattern_counters: Vec::new(),
            skill_level: SkillLevel::Beginner,
            preferred_detail: PreferredDetail::Brief,
            common_mistakes: Vec::new(),
            successful_count: 0,
        }
    }

    /// Applies a completed turn's outcome: on success, bumps the successful
    /// count and re-derives `skillLevel`; on failure, records a deduplicated
    /// mistake label.
    pub fn record_turn(&mut self, succeeded: bool, pattern_label: &str) {
        if succeeded {
            self.successful_count += 1;
            self.skill_level = SkillLevel::for_successful_count(self.successful_count);
        } else if !self.common_mistakes.iter().any(|m| m == pattern_label) {
            self.common_mistakes.push(pattern_label.to_string());
        }
    }
}
