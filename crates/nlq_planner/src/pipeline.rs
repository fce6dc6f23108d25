use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use nlq_core::{AgentError, CancelToken, DatabaseEndpoint, MemoryRecord, QueryKind};
use uuid::Uuid;
use nlq_llm::LlmOracle;
use nlq_memory::MemoryStore;
use nlq_pool::ConnectionPool;
use nlq_schema::SchemaRegistry;

use crate::executor::Executor;
use crate::greeting::{greeting_reply, is_greeting};
use crate::planner::Planner;
use crate::shaper::{AgentResponse, Shaper};

/// Per-request knobs threaded down from config.
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub verbose: bool,
    pub dry_run: bool,
    pub force_schema_refresh: bool,
}

/// Wires Connection Pool + Schema Registry + Memory Store + Planner +
/// Executor + Shaper into the single-turn flow of Flow paragraph:
/// resolve endpoint → acquire connection → schema → capabilities/keywords →
/// memory insights → plan → execute → shape → record.
pub struct AgentPipeline {
    pool: Arc<ConnectionPool>,
    schema_registry: Arc<SchemaRegistry>,
    memory: Arc<MemoryStore>,
    planner: Planner,
    executor: Executor,
    shaper: Shaper,
}

impl AgentPipeline {
    pub fn new(
        pool: Arc<ConnectionPool>,
        schema_registry: Arc<SchemaRegistry>,
        memory: Arc<MemoryStore>,
        llm: Option<Arc<dyn LlmOracle>>,
        llm_deadline: Duration,
        statement_deadline: Duration,
        redact_sql: bool,
        row_cap: u32,
    ) -> Self {
        Self {
            pool,
            schema_registry,
            memory,
            planner: Planner::new(llm.clone(), llm_deadline),
            executor: Executor::new(llm.clone(), llm_deadline, statement_deadline, redact_sql, row_cap),
            shaper: Shaper::new(llm, llm_deadline),
        }
    }

    /// Runs one user turn against `db_url` for `user_id`. Framing-level failures (bad endpoint, connection down)
    /// propagate directly — no MemoryRecord is written for those.
    pub async fn handle_turn(
        &self,
        user_id: &str,
        user_text: &str,
        db_url: &str,
        db_kind_hint: Option<nlq_core::DbKind>,
        options: PipelineOptions,
    ) -> Result<AgentResponse, AgentError> {
        let started = Instant::now();
        let endpoint = DatabaseEndpoint::new(db_url.to_string(), db_kind_hint)?;

        // Greeting short-circuit happens before any connection acquisition
        // or schema lookup.
        if is_greeting(user_text) {
            let query_id = Uuid::new_v4();
            let mut response = self.shaper.conversation_reply(greeting_reply(user_text), options.verbose, started.elapsed().as_millis() as u64, user_text);
            response.query_id = query_id;
            self.record_turn(query_id, user_id, &endpoint, user_text, QueryKind::Conversation, vec!["n/a".to_string()], started.elapsed().as_millis() as u64, 0, true, None)
            .await?;
            return Ok(response);
        }

        let connection = self.pool.acquire(&endpoint).await?;
        let snapshot = self.schema_registry.get_or_build(&endpoint, connection.as_ref(), options.force_schema_refresh).await?;
        let capabilities = nlq_schema::capabilities_string(&snapshot.payload);
        let keyword_candidates = nlq_schema::candidate_objects(user_text, &snapshot.payload);
        let pattern_hint = keyword_candidates.first().cloned().unwrap_or_default();
        let memory_insights = self.memory.insights_for(user_id, &pattern_hint).await?;
        let memory_insights_json = serde_json::to_string(&memory_insights).unwrap_or_else(|_| "{}".to_string());

        let plan = self
        .planner
        .plan(user_text, &snapshot.payload, &memory_insights_json, &capabilities, &keyword_candidates, snapshot.kind)
        .await;

        if plan.is_empty() {
            let query_id = Uuid::new_v4();
            let mut response = self.shaper.conversation_reply(greeting_reply(user_text), options.verbose, started.elapsed().as_millis() as u64, user_text);
            response.query_id = query_id;
            self.record_turn(query_id, user_id, &endpoint, user_text, QueryKind::Conversation, vec!["n/a".to_string()], started.elapsed().as_millis() as u64, 0, true, None)
            .await?;
            return Ok(response);
        }

        let cancel = CancelToken::new();
        let outcome = self
        .executor
        .run(&plan, connection.as_ref(), snapshot.kind, &snapshot.payload, &memory_insights_json, &keyword_candidates, &cancel, options.dry_run)
        .await;

        let execution_millis = started.elapsed().as_millis() as u64;
        let succeeded = !outcome.any_step_failed;
        let pattern_label = derive_pattern_label(&outcome);
        let query_kind = outcome.last_query_kind.unwrap_or(QueryKind::Read);
        let collections_or_tables = outcome.collections_or_tables.clone();
        let result_count = outcome.result_count;
        let generated_description = outcome.generated_query_description.clone();

        let query_id = Uuid::new_v4();
        let mut response = self
        .shaper
        .shape(&plan, &outcome, memory_insights, options.verbose, options.dry_run, execution_millis, user_text)
        .await;
        response.query_id = query_id;

        self.record_turn(
            query_id,
            user_id,
            &endpoint,
            user_text,
            query_kind,
            collections_or_tables,
            execution_millis,
            result_count,
            succeeded,
            Some((generated_description, pattern_label)),
        )
        .await?;

        Ok(response)
    }

    #[allow(clippy::too_many_arguments)]
    async fn record_turn(
        &self,
        query_id: Uuid,
        user_id: &str,
        endpoint: &DatabaseEndpoint,
        user_text: &str,
        query_kind: QueryKind,
        collections_or_tables: Vec<String>,
        execution_millis: u64,
        result_count: u64,
        succeeded: bool,
        description_and_pattern: Option<(String, String)>,
    ) -> Result<(), AgentError> {
        let (generated_query_description, pattern_label) = description_and_pattern.unwrap_or_else(|| (user_text.to_string(), "conversation".to_string()));

        let record = MemoryRecord {
            query_id,
            user_id: user_id.to_string(),
            db_key: endpoint.db_key(),
            original_text: user_text.to_string(),
            generated_query_description,
            query_kind,
            collections_or_tables,
            execution_millis,
            result_count,
            succeeded,
            feedback: None,
            context_tags: Vec::new(),
            pattern_label,
            timestamp: Utc::now(),
        };

        self.memory.record_turn(record).await
    }
}

/// `"DELETE_WITHOUT_WHERE"`-shaped label from a Safety Gate rejection, or a
/// `queryKind:target` label on success, so recurring mistakes and recurring
/// intents both accumulate under a stable, comparable string.
fn derive_pattern_label(outcome: &crate::executor::ExecutionOutcome) -> String {
    if let Some(entry) = outcome.trace.iter().find(|t| t.kind == "error") {
        if let Some(text) = entry.output.as_str() {
            if let Some(rule) = text.strip_prefix("SafetyRejected: ") {
                return rule.to_string();
            }
        }
        return "QUERY_FAILED".to_string();
    }
    let kind = outcome.last_query_kind.map(|k| format!("{k:?}")).unwrap_or_else(|| "Read".to_string());
    let target = outcome.collections_or_tables.first().cloned().unwrap_or_default();
    format!("{}:{}", kind.to_uppercase(), target)
}
