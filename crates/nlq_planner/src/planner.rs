use std::sync::Arc;
use std::time::Duration;

use nlq_core::{DbKind, Plan, SchemaPayload};
use nlq_llm::LlmOracle;
use tracing::warn;

use crate::greeting::is_greeting;

/// Produces a Plan from `{userText, schemaJson, memoryInsights,
/// capabilitiesString, keywordCandidates, kind}`. Never executes
/// anything itself — it only emits structure for the Executor to run.
pub struct Planner {
    llm: Option<Arc<dyn LlmOracle>>,
    llm_deadline: Duration,
}

impl Planner {
    pub fn new(llm: Option<Arc<dyn LlmOracle>>, llm_deadline: Duration) -> Self {
        Self { llm, llm_deadline }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn plan(
        &self,
        user_text: &str,
        schema: &SchemaPayload,
        memory_insights_json: &str,
        capabilities: &str,
        keyword_candidates: &[String],
        kind: DbKind,
    ) -> Plan {
        if is_greeting(user_text) {
            return Plan::empty();
        }

        if let Some(llm) = &self.llm {
            let prompt = nlq_llm::build_plan_prompt(user_text, schema, memory_insights_json, capabilities, keyword_candidates, kind);
            match llm.complete(&prompt, self.llm_deadline).await {
                Ok(raw) => match nlq_llm::parse_plan_reply(&raw) {
                    Ok(plan) if !plan.is_empty() => return plan,
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "planner LLM reply failed to parse, falling back to heuristic"),
                },
                Err(e) => warn!(error = %e, "planner LLM call failed, falling back to heuristic"),
            }
        }

        Plan::heuristic_single_step(user_text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn greeting_short_circuits_to_empty_plan() {
        let planner = Planner::new(None, Duration::from_secs(1));
        let plan = planner.plan("hi", &SchemaPayload::empty(DbKind::Document), "{}", "", &[], DbKind::Document).await;
        assert!(plan.is_empty());
    }

    #[tokio::test]
    async fn absent_llm_falls_back_to_heuristic_single_step() {
        let planner = Planner::new(None, Duration::from_secs(1));
        let plan = planner.plan("how many orders", &SchemaPayload::empty(DbKind::Document), "{}", "", &[], DbKind::Document).await;
        assert_eq!(plan.steps.len(), 1);
    }
}
