use nlq_core::{AgentError, DbKind, ExecutedQuery, Plan, SchemaPayload};

use crate::sanitize::sanitize_json;

/// Builds the Planner's prompt: `{userText, schemaJson, memoryInsights,
/// capabilitiesString, keywordCandidates, kind}` in, a JSON `Plan` out. The
/// stricter JSON-only variant is authoritative — the
/// prompt demands a JSON object and nothing else; the sanitizer still
/// tolerates fenced code blocks as defense in depth.
pub fn build_plan_prompt(
    user_text: &str,
    schema: &SchemaPayload,
    memory_insights_json: &str,
    capabilities: &str,
    keyword_candidates: &[String],
    kind: DbKind,
) -> String {
    let schema_json = serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string());
    let candidates_json = serde_json::to_string(keyword_candidates).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Produce a query plan as a single JSON object and nothing else — no prose, no markdown fences.\n\
        The object has one field, \"steps\", an array of step objects. Each step has a \"kind\" field,\n\
        one of \"dbQuery\", \"computeStats\", \"secondaryAnalysis\":\n\
        - {{\"kind\": \"dbQuery\", \"subQuery\": \"<text>\"}}\n\
        - {{\"kind\": \"computeStats\", \"onStep\": <index of an earlier step>, \"ops\": [{{\"op\": \"count\"}} | {{\"op\": \"topK\", \"field\": \"...\", \"k\": <n>}} | {{\"op\": \"mean\"|\"min\"|\"max\"|\"sum\"|\"distinct\", \"field\": \"...\"}}]}}\n\
        - {{\"kind\": \"secondaryAnalysis\", \"onSteps\": [<indices of earlier steps>], \"instructions\": \"<text>\"}}\n\
        Prefer the shortest plan that answers the request; most requests need exactly one dbQuery step.\n\
        Database kind: {kind:?}\n\
        Schema: {schema_json}\n\
        Capabilities: {capabilities}\n\
        Candidate collections/tables: {candidates_json}\n\
        Memory insights: {memory_insights_json}\n\
        User request: {user_text}"
    )
}

/// Parses a raw Planner reply into a validated `Plan`. Unknown/extra fields are discarded by
/// serde's default struct deserialization; required-field absence and
/// dangling step references both surface as `PlanParseFailed` so the caller
/// can fall back to the heuristic planner.
pub fn parse_plan_reply(raw: &str) -> Result<Plan, AgentError> {
    let value = sanitize_json(raw).map_err(AgentError::PlanParseFailed)?;
    let plan: Plan = serde_json::from_value(value).map_err(|e| AgentError::PlanParseFailed(e.to_string()))?;
    plan.validate_references().map_err(AgentError::PlanParseFailed)?;
    Ok(plan)
}

/// Builds the query-synthesis prompt: schema, memory context, and the
/// safety rules the gate enforces (so the model doesn't waste a round-trip
/// on a query the gate will reject), for a single `dbQuery` step's subQuery.
pub fn build_query_synthesis_prompt(sub_query: &str, schema: &SchemaPayload, memory_insights_json: &str, kind: DbKind) -> String {
    let schema_json = serde_json::to_string(schema).unwrap_or_else(|_| "{}".to_string());
    let shape_hint = match kind {
        DbKind::Document => {
            "{\"kind\": \"document\", \"operation\": \"find\"|\"findOne\"|\"count\"|\"aggregate\"|\"insertOne\"|\"updateOne\"|\"deleteOne\", \
            \"collection\": \"...\", \"filter\": {...}, \"projection\": {...}, \"sort\": [[\"field\", \"asc\"|\"desc\"]], \
            \"limit\": <n>, \"pipeline\": [...], \"document\": {...}, \"update\": {...}}"
        }
        DbKind::SqlA | DbKind::SqlB => "{\"kind\": \"relational\", \"sql\": \"...\", \"parameters\": [...]}",
    };
    format!(
        "Produce exactly one executable query as a single JSON object and nothing else.\n\
        Required shape: {shape_hint}\n\
        Safety rules that will be enforced regardless of what you emit: single statement only; \
        no DROP/TRUNCATE/ALTER; DELETE and UPDATE must carry a WHERE clause or a specific filter; \
        no embedded comments; no bulk updateMany/deleteMany; rows are capped server-side.\n\
        Database kind: {kind:?}\n\
        Schema: {schema_json}\n\
        Memory insights: {memory_insights_json}\n\
        Request: {sub_query}"
    )
}

/// Parses a query-synthesis reply into an `ExecutedQuery`. The result still
/// passes through the Safety Gate before execution — this function only
/// turns untrusted text into a typed, not-yet-trusted value.
pub fn parse_query_synthesis_reply(raw: &str) -> Result<ExecutedQuery, AgentError> {
    let value = sanitize_json(raw).map_err(AgentError::PlanParseFailed)?;
    serde_json::from_value(value).map_err(|e| AgentError::PlanParseFailed(e.to_string()))
}

/// Builds the secondary-analysis prompt: a bounded row preview per
/// referenced step plus instructions. The reply is plain language, never
/// JSON — "Never request raw JSON back".
pub fn build_secondary_analysis_prompt(row_previews_json: &str, instructions: &str) -> String {
    format!(
        "Write a short plain-language analysis. Do not reply with JSON, code, or a table — prose only.\n\
        Data (bounded preview, already capped to 20 rows per source step): {row_previews_json}\n\
        Instructions: {instructions}"
    )
}

/// The deterministic default `message` used when the LLM oracle is absent
/// or its summary call fails.
pub fn default_summary_message(result_count: u64, dry_run: bool) -> String {
    if dry_run {
        "Preview generated successfully".to_string()
    } else {
        format!("Retrieved {result_count} record(s)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nlq_core::PlanStep;

    #[test]
    fn parses_single_step_plan_reply() {
        let raw = "```json\n{\"steps\": [{\"kind\": \"dbQuery\", \"subQuery\": \"count orders\"}]}\n```";
        let plan = parse_plan_reply(raw).unwrap();
        assert_eq!(plan.steps.len(), 1);
        match &plan.steps[0] {
            PlanStep::DbQuery { sub_query } => assert_eq!(sub_query, "count orders"),
            _ => panic!("expected dbQuery"),
        }
    }

    #[test]
    fn rejects_plan_with_dangling_step_reference() {
        let raw = "{\"steps\": [{\"kind\": \"computeStats\", \"onStep\": 3, \"ops\": [{\"op\": \"count\"}]}]}";
        assert!(parse_plan_reply(raw).is_err());
    }

    #[test]
    fn rejects_unparseable_reply_with_plan_parse_failed() {
        let err = parse_plan_reply("not json at all").unwrap_err();
        assert!(matches!(err, AgentError::PlanParseFailed(_)));
    }

    #[test]
    fn default_message_distinguishes_dry_run() {
        assert_eq!(default_summary_message(3, false), "Retrieved 3 record(s)");
        assert_eq!(default_summary_message(0, true), "Preview generated successfully");
    }
}
