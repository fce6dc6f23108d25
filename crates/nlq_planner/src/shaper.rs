use std::sync::Arc;
use std::time::Duration;

use nlq_core::Plan;
use nlq_llm::LlmOracle;
use nlq_memory::MemoryInsights;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use crate::executor::ExecutionOutcome;
use crate::trace::{ExecutedQueryTrace, TraceEntry};

/// Per-request response shape. `success` is always true here —
/// framing-level errors never reach the shaper, they short-circuit upstream.
/// `query_id` is always present, even in minimal mode — it's the handle a
/// client echoes back to `POST /api/feedback`, set by the pipeline after
/// shaping since the shaper itself doesn't generate ids.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResponse {
    pub query_id: Uuid,
    pub data: Option<serde_json::Value>,
    pub message: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<Plan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trace: Option<Vec<TraceEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executed_queries: Option<Vec<ExecutedQueryTrace>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_insights: Option<MemoryInsights>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub execution_millis: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query: Option<String>,
}

pub struct Shaper {
    llm: Option<Arc<dyn LlmOracle>>,
    llm_deadline: Duration,
}

impl Shaper {
    pub fn new(llm: Option<Arc<dyn LlmOracle>>, llm_deadline: Duration) -> Self {
        Self { llm, llm_deadline }
    }

    /// Composes the final reply. `verbose` toggles the extra fields;
    /// the message is LLM-summarized when possible, falling back to the
    /// deterministic `"Retrieved N record(s)"` / dry-run text otherwise.
    #[allow(clippy::too_many_arguments)]
    pub async fn shape(
        &self,
        plan: &Plan,
        outcome: &ExecutionOutcome,
        memory_insights: MemoryInsights,
        verbose: bool,
        dry_run: bool,
        execution_millis: u64,
        original_query: &str,
    ) -> AgentResponse {
        let message = self.summarize(outcome, dry_run).await;

        if !verbose {
            return AgentResponse {
                query_id: Uuid::nil(),
                data: outcome.data.clone(),
                message,
                success: true,
                plan: None,
                trace: None,
                executed_queries: None,
                memory_insights: None,
                suggestions: None,
                execution_millis: None,
                query: None,
            };
        }

        AgentResponse {
            query_id: Uuid::nil(),
            data: outcome.data.clone(),
            message,
            success: true,
            plan: Some(plan.clone()),
            trace: Some(outcome.trace.clone()),
            executed_queries: Some(outcome.executed_queries.clone()),
            memory_insights: Some(memory_insights),
            suggestions: Some(suggestions_for(outcome)),
            execution_millis: Some(execution_millis),
            query: Some(original_query.to_string()),
        }
    }

    async fn summarize(&self, outcome: &ExecutionOutcome, dry_run: bool) -> String {
        if let Some(llm) = &self.llm {
            let descriptions: Vec<&str> = outcome.executed_queries.iter().map(|q| q.description.as_str()).collect();
            let tool_outputs = outcome.data.clone().unwrap_or(json!(null));
            let prompt = format!(
                "Summarize this database agent turn in one or two natural-language sentences.\n\
                Executed query descriptions: {:?}\n\
                Result data (truncated): {}\n\
                Respond with prose only, no JSON, no code block.",
                descriptions, tool_outputs
            );
            if let Ok(text) = llm.complete(&prompt, self.llm_deadline).await {
                let trimmed = text.trim();
                if !trimmed.is_empty() {
                    return trimmed.to_string();
                }
            }
        }
        nlq_llm::default_summary_message(outcome.result_count, dry_run)
    }

    /// The greeting short-circuit's reply: zero LLM
    /// calls, zero executed queries, `data: None`.
    pub fn conversation_reply(&self, message: String, verbose: bool, execution_millis: u64, original_query: &str) -> AgentResponse {
        AgentResponse {
            query_id: Uuid::nil(),
            data: None,
            message,
            success: true,
            plan: None,
            trace: verbose.then(Vec::new),
            executed_queries: verbose.then(Vec::new),
            memory_insights: None,
            suggestions: None,
            execution_millis: verbose.then_some(execution_millis),
            query: verbose.then(|| original_query.to_string()),
        }
    }
}

fn suggestions_for(outcome: &ExecutionOutcome) -> Vec<String> {
    if outcome.any_step_failed {
        return vec!["Try rephrasing your question or narrowing it to a specific collection or table.".to_string()];
    }
    match outcome.last_query_kind {
        Some(nlq_core::QueryKind::Count) => vec!["Ask for the underlying records to see individual rows.".to_string()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_outcome() -> ExecutionOutcome {
        ExecutionOutcome {
            trace: vec![],
            executed_queries: vec![],
            data: None,
            result_count: 0,
            any_step_failed: false,
            last_query_kind: None,
            collections_or_tables: vec![],
            generated_query_description: String::new(),
        }
    }

    #[tokio::test]
    async fn minimal_mode_omits_verbose_fields() {
        let shaper = Shaper::new(None, Duration::from_secs(1));
        let plan = Plan::empty();
        let insights = MemoryInsights { similar_queries: 0, skill_level: nlq_core::SkillLevel::Beginner, pattern_label: None };
        let response = shaper.shape(&plan, &empty_outcome(), insights, false, false, 5, "hi").await;
        assert!(response.plan.is_none());
        assert!(response.trace.is_none());
        let serialized = serde_json::to_value(&response).unwrap();
        assert!(serialized.get("plan").is_none());
    }

    #[tokio::test]
    async fn verbose_mode_includes_plan_and_trace() {
        let shaper = Shaper::new(None, Duration::from_secs(1));
        let plan = Plan::heuristic_single_step("how many orders");
        let insights = MemoryInsights { similar_queries: 2, skill_level: nlq_core::SkillLevel::Intermediate, pattern_label: None };
        let response = shaper.shape(&plan, &empty_outcome(), insights, true, false, 5, "how many orders").await;
        assert!(response.plan.is_some());
        assert!(response.trace.is_some());
        assert_eq!(response.execution_millis, Some(5));
    }

    #[tokio::test]
    async fn absent_llm_falls_back_to_deterministic_message() {
        let shaper = Shaper::new(None, Duration::from_secs(1));
        let mut outcome = empty_outcome();
        outcome.result_count = 3;
        let plan = Plan::empty();
        let insights = MemoryInsights { similar_queries: 0, skill_level: nlq_core::SkillLevel::Beginner, pattern_label: None };
        let response = shaper.shape(&plan, &outcome, insights, false, false, 1, "q").await;
        assert_eq!(response.message, "Retrieved 3 record(s)");
    }
}
