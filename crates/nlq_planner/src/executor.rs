use std::sync::Arc;
use std::time::Duration;

use nlq_core::{
    CancelToken, ColumnMeta, Connection, DbKind, ExecutedQuery, Plan, PlanStep, QueryKind, Row, SchemaPayload, StatOp,
};
use nlq_llm::LlmOracle;
use serde_json::json;

use crate::heuristic::heuristic_query;
use crate::stats;
use crate::trace::{ExecutedQueryTrace, TraceEntry};

const DB_ROW_PREVIEW_CAP: usize = 10;
const ANALYSIS_ROW_PREVIEW_CAP: usize = 20;
const NO_LLM_ANALYSIS_FALLBACK: &str = "Analysis unavailable: no LLM oracle is configured.";

enum StepOutput {
    Rows { columns: Vec<ColumnMeta>, rows: Vec<Row>, result_count: u64 },
    Value(serde_json::Value),
}

enum DbQueryOutcome {
    Ok { entry: TraceEntry, exec_trace: ExecutedQueryTrace, output: StepOutput, query_kind: QueryKind, target: String, description: String },
    /// Synthesis succeeded but the Safety Gate or the driver rejected the
    /// query; the MemoryRecord still needs a queryKind/target for this turn.
    RejectedAfterSynthesis { reason: String, query_kind: QueryKind, target: String, description: String },
    /// No ExecutedQuery could even be synthesized (LLM absent/failed and the
    /// heuristic had no schema object to ground a guess in).
    SynthesisFailed { reason: String },
}

/// Result of running a whole Plan. `data` is the final selection:
/// the last successful `dbQuery` result if any, otherwise the last step's
/// output (which may be `None` if every step failed).
pub struct ExecutionOutcome {
    pub trace: Vec<TraceEntry>,
    pub executed_queries: Vec<ExecutedQueryTrace>,
    pub data: Option<serde_json::Value>,
    pub result_count: u64,
    pub any_step_failed: bool,
    pub last_query_kind: Option<QueryKind>,
    pub collections_or_tables: Vec<String>,
    pub generated_query_description: String,
}

pub struct Executor {
    llm: Option<Arc<dyn LlmOracle>>,
    llm_deadline: Duration,
    statement_deadline: Duration,
    redact_sql: bool,
    row_cap: u32,
}

impl Executor {
    pub fn new(llm: Option<Arc<dyn LlmOracle>>, llm_deadline: Duration, statement_deadline: Duration, redact_sql: bool, row_cap: u32) -> Self {
        Self { llm, llm_deadline, statement_deadline, redact_sql, row_cap }
    }

    /// Runs every step of `plan` in order. `dry_run` synthesizes and
    /// gates `dbQuery` steps but never calls `connection.execute` — used for
    /// the dry-run preview contract.
    pub async fn run(
        &self,
        plan: &Plan,
        connection: &dyn Connection,
        kind: DbKind,
        schema: &SchemaPayload,
        memory_insights_json: &str,
        keyword_candidates: &[String],
        cancel: &CancelToken,
        dry_run: bool,
    ) -> ExecutionOutcome {
        let mut trace = Vec::with_capacity(plan.steps.len());
        let mut executed_queries = Vec::new();
        let mut step_outputs: Vec<Option<StepOutput>> = Vec::with_capacity(plan.steps.len());
        let mut collections_or_tables = Vec::new();
        let mut last_query_kind = None;
        let mut last_description = String::new();

        for (idx, step) in plan.steps.iter().enumerate() {
            match step {
                PlanStep::DbQuery { sub_query } => {
                    let outcome = self
                    .run_db_query(idx, sub_query, connection, kind, schema, memory_insights_json, keyword_candidates, cancel, dry_run)
                    .await;
                    match outcome {
                        DbQueryOutcome::Ok { entry, exec_trace, output, query_kind, target, description } => {
                            trace.push(entry);
                            executed_queries.push(exec_trace);
                            last_query_kind = Some(query_kind);
                            last_description = description;
                            collections_or_tables.push(target);
                            step_outputs.push(Some(output));
                        }
                        DbQueryOutcome::RejectedAfterSynthesis { reason, query_kind, target, description } => {
                            trace.push(TraceEntry::error(idx, reason));
                            last_query_kind = Some(query_kind);
                            last_description = description;
                            collections_or_tables.push(target);
                            step_outputs.push(None);
                        }
                        DbQueryOutcome::SynthesisFailed { reason } => {
                            trace.push(TraceEntry::error(idx, reason));
                            step_outputs.push(None);
                        }
                    }
                }
                PlanStep::ComputeStats { on_step, ops } => {
                    step_outputs.push(self.run_compute_stats(idx, *on_step, ops, &step_outputs, &mut trace));
                }
                PlanStep::SecondaryAnalysis { on_steps, instructions } => {
                    step_outputs.push(self.run_secondary_analysis(idx, on_steps, instructions, &step_outputs, &mut trace).await);
                }
            }
        }

        let any_step_failed = trace.iter().any(|t| t.kind == "error");
        let (data, result_count) = select_final_data(plan, &step_outputs);

        ExecutionOutcome {
            trace,
            executed_queries,
            data,
            result_count,
            any_step_failed,
            last_query_kind,
            collections_or_tables,
            generated_query_description: last_description,
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn run_db_query(
        &self,
        idx: usize,
        sub_query: &str,
        connection: &dyn Connection,
        kind: DbKind,
        schema: &SchemaPayload,
        memory_insights_json: &str,
        keyword_candidates: &[String],
        cancel: &CancelToken,
        dry_run: bool,
    ) -> DbQueryOutcome {
        let query = match self.synthesize_query(sub_query, kind, schema, memory_insights_json, keyword_candidates).await {
            Ok(q) => q,
            Err(reason) => return DbQueryOutcome::SynthesisFailed { reason },
        };

        // Captured before the gate consumes `query`, so a SafetyRejected
        // query still yields a queryKind/target for the MemoryRecord.
        let target = query_target(&query);
        let query_kind = map_query_kind(query.query_kind());
        let description = describe_query(&query, sub_query);

        let (gated, display_sql) = match nlq_safety::gate_for_execution(query, kind, false, self.redact_sql, self.row_cap) {
            Ok(g) => g,
            Err(e) => return DbQueryOutcome::RejectedAfterSynthesis { reason: e.to_string(), query_kind, target, description },
        };

        let exec_trace = ExecutedQueryTrace {
            operation: gated.query_kind().to_string(),
            description: description.clone(),
            target: target.clone(),
            filter: filter_of(&gated),
            sql: display_sql,
        };

        if dry_run {
            let entry = TraceEntry::ok(idx, "dbQuery", json!({ "dryRun": true }));
            let output = StepOutput::Rows { columns: vec![], rows: vec![], result_count: 0 };
            return DbQueryOutcome::Ok { entry, exec_trace, output, query_kind, target, description };
        }

        let result = match connection.execute(&gated, cancel, self.statement_deadline).await {
            Ok(r) => r,
            Err(e) => return DbQueryOutcome::RejectedAfterSynthesis { reason: e.to_string(), query_kind, target, description },
        };
        let preview = stats::preview_rows(&result.columns, &result.rows, DB_ROW_PREVIEW_CAP);
        let entry = TraceEntry::ok(idx, "dbQuery", json!({ "preview": preview, "resultCount": result.row_count() }));
        let result_count = result.row_count() as u64;
        let output = StepOutput::Rows { columns: result.columns, rows: result.rows, result_count };
        DbQueryOutcome::Ok { entry, exec_trace, output, query_kind, target, description }
    }

    async fn synthesize_query(
        &self,
        sub_query: &str,
        kind: DbKind,
        schema: &SchemaPayload,
        memory_insights_json: &str,
        keyword_candidates: &[String],
    ) -> Result<ExecutedQuery, String> {
        if let Some(llm) = &self.llm {
            let prompt = nlq_llm::build_query_synthesis_prompt(sub_query, schema, memory_insights_json, kind);
            if let Ok(raw) = llm.complete(&prompt, self.llm_deadline).await {
                if let Ok(query) = nlq_llm::parse_query_synthesis_reply(&raw) {
                    return Ok(query);
                }
            }
        }
        heuristic_query(sub_query, kind, schema, keyword_candidates)
        .ok_or_else(|| "no schema object available to ground the query".to_string())
    }

    fn run_compute_stats(
        &self,
        idx: usize,
        on_step: usize,
        ops: &[StatOp],
        step_outputs: &[Option<StepOutput>],
        trace: &mut Vec<TraceEntry>,
    ) -> Option<StepOutput> {
        match step_outputs.get(on_step) {
            Some(Some(StepOutput::Rows { columns, rows, .. })) => {
                let results: Vec<serde_json::Value> = ops.iter().map(|op| stats::apply(op, columns, rows)).collect();
                let output = json!(results);
                trace.push(TraceEntry::ok(idx, "computeStats", output.clone()));
                Some(StepOutput::Value(output))
            }
            _ => {
                trace.push(TraceEntry::error(idx, format!("referenced step {on_step} produced no rows")));
                None
            }
        }
    }

    async fn run_secondary_analysis(
        &self,
        idx: usize,
        on_steps: &[usize],
        instructions: &str,
        step_outputs: &[Option<StepOutput>],
        trace: &mut Vec<TraceEntry>,
    ) -> Option<StepOutput> {
        let previews: Vec<serde_json::Value> = on_steps
        .iter()
        .filter_map(|&i| step_outputs.get(i).and_then(|o| o.as_ref()))
        .map(|output| match output {
                StepOutput::Rows { columns, rows, .. } => json!(stats::preview_rows(columns, rows, ANALYSIS_ROW_PREVIEW_CAP)),
                StepOutput::Value(v) => v.clone(),
        })
        .collect();

        let text = match &self.llm {
            Some(llm) => {
                let previews_json = serde_json::to_string(&previews).unwrap_or_else(|_| "[]".to_string());
                let prompt = nlq_llm::build_secondary_analysis_prompt(&previews_json, instructions);
                match llm.complete(&prompt, self.llm_deadline).await {
                    Ok(text) => text,
                    Err(_) => NO_LLM_ANALYSIS_FALLBACK.to_string(),
                }
            }
            None => NO_LLM_ANALYSIS_FALLBACK.to_string(),
        };

        let output = json!(text);
        trace.push(TraceEntry::ok(idx, "secondaryAnalysis", output.clone()));
        Some(StepOutput::Value(output))
    }
}

fn select_final_data(plan: &Plan, step_outputs: &[Option<StepOutput>]) -> (Option<serde_json::Value>, u64) {
    for (idx, step) in plan.steps.iter().enumerate().rev() {
        if matches!(step, PlanStep::DbQuery { .. }) {
            if let Some(Some(StepOutput::Rows { columns, rows, result_count })) = step_outputs.get(idx) {
                return (Some(json!(stats::preview_rows(columns, rows, rows.len()))), *result_count);
            }
        }
    }

    match step_outputs.last() {
        Some(Some(StepOutput::Rows { columns, rows, result_count })) => {
            (Some(json!(stats::preview_rows(columns, rows, rows.len()))), *result_count)
        }
        Some(Some(StepOutput::Value(v))) => (Some(v.clone()), 0),
        _ => (None, 0),
    }
}

fn query_target(query: &ExecutedQuery) -> String {
    match query {
        ExecutedQuery::Document { collection, .. } => collection.clone(),
        ExecutedQuery::Relational { sql, .. } => sql.split_whitespace().skip_while(|w| !w.eq_ignore_ascii_case("from")).nth(1).unwrap_or("?").to_string(),
    }
}

fn filter_of(query: &ExecutedQuery) -> Option<serde_json::Value> {
    match query {
        ExecutedQuery::Document { filter, .. } => Some(serde_json::Value::Object(filter.clone())),
        ExecutedQuery::Relational { .. } => None,
    }
}

fn describe_query(query: &ExecutedQuery, sub_query: &str) -> String {
    match query {
        ExecutedQuery::Document { operation, collection, .. } => format!("{:?} on {collection} for \"{sub_query}\"", operation),
        ExecutedQuery::Relational { sql, .. } => sql.clone(),
    }
}

fn map_query_kind(tag: &str) -> QueryKind {
    match tag {
        "read" => QueryKind::Read,
        "readOne" => QueryKind::ReadOne,
        "count" => QueryKind::Count,
        "aggregate" => QueryKind::Aggregate,
        "insert" => QueryKind::Insert,
        "update" => QueryKind::Update,
        "delete" => QueryKind::Delete,
        _ => QueryKind::Sql,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nlq_core::{CollectionSchema, DocumentFieldInfo, InferredType, Value};

    struct StubConnection;

    #[async_trait]
    impl Connection for StubConnection {
        fn kind(&self) -> DbKind {
            DbKind::SqlA
        }

        async fn ping(&self) -> Result<(), nlq_core::AgentError> {
            Ok(())
        }

        async fn execute(&self, _query: &ExecutedQuery, _cancel: &CancelToken, _deadline: Duration) -> Result<nlq_core::QueryResult, nlq_core::AgentError> {
            unreachable!("rejected queries must never reach execute()")
        }

        async fn introspect_schema(&self) -> Result<SchemaPayload, nlq_core::AgentError> {
            Ok(SchemaPayload::empty(DbKind::SqlA))
        }

        async fn close(&self) -> Result<(), nlq_core::AgentError> {
            Ok(())
        }
    }

    fn orders_schema() -> SchemaPayload {
        SchemaPayload::Document {
            collections: vec![CollectionSchema {
                    collection: "orders".into(),
                    fields: vec![DocumentFieldInfo {
                            name: "createdAt".into(),
                            inferred_type: InferredType::String,
                            required: true,
                            unique: false,
                            r#enum: None,
                            reference: None,
                    }],
                    indexes: vec![],
                    relationships: vec![],
            }],
        }
    }

    struct FakeDeleteLlm;

    #[async_trait]
    impl LlmOracle for FakeDeleteLlm {
        async fn complete(&self, _prompt: &str, _deadline: Duration) -> Result<String, nlq_core::AgentError> {
            Ok(r#"{"kind": "relational", "sql": "DELETE FROM orders", "parameters": []}"#.to_string())
        }
    }

    #[tokio::test]
    async fn delete_without_where_is_rejected_but_kind_is_still_recorded() {
        let executor = Executor::new(Some(std::sync::Arc::new(FakeDeleteLlm)), Duration::from_secs(1), Duration::from_secs(1), false, nlq_safety::DEFAULT_ROW_CAP);
        let plan = Plan::heuristic_single_step("delete old orders");
        let connection = StubConnection;
        let cancel = CancelToken::new();

        let outcome = executor.run(&plan, &connection, DbKind::SqlA, &orders_schema(), "{}", &["orders".into()], &cancel, false).await;

        assert!(outcome.any_step_failed);
        assert_eq!(outcome.last_query_kind, Some(QueryKind::Delete));
        assert!(outcome.executed_queries.is_empty(), "a rejected query never reaches the executedQueries trace");
        assert_eq!(outcome.trace[0].kind, "error");
    }

    #[tokio::test]
    async fn dry_run_never_calls_execute() {
        let executor = Executor::new(None, Duration::from_secs(1), Duration::from_secs(1), false, nlq_safety::DEFAULT_ROW_CAP);
        let plan = Plan::heuristic_single_step("show me orders");
        let connection = StubConnection;
        let cancel = CancelToken::new();

        let outcome = executor.run(&plan, &connection, DbKind::Document, &orders_schema(), "{}", &["orders".into()], &cancel, true).await;
        assert!(!outcome.any_step_failed);
        assert_eq!(outcome.result_count, 0);
    }

    #[test]
    fn compute_stats_on_dangling_step_records_error() {
        let mut trace = Vec::new();
        let executor = Executor::new(None, Duration::from_secs(1), Duration::from_secs(1), false, nlq_safety::DEFAULT_ROW_CAP);
        let out = executor.run_compute_stats(1, 0, &[StatOp::Count], &[None], &mut trace);
        assert!(out.is_none());
        assert_eq!(trace[0].kind, "error");
    }

    #[test]
    fn select_final_data_prefers_last_successful_db_query() {
        let plan = Plan {
            steps: vec![
                PlanStep::DbQuery { sub_query: "a".into() },
                PlanStep::ComputeStats { on_step: 0, ops: vec![StatOp::Count] },
            ],
        };
        let outputs = vec![
            Some(StepOutput::Rows { columns: vec![], rows: vec![vec![Value::Int(1)]], result_count: 1 }),
            Some(StepOutput::Value(json!({"op": "count", "result": 1}))),
        ];
        let (data, count) = select_final_data(&plan, &outputs);
        assert_eq!(count, 1);
        assert!(data.is_some());
    }
}
