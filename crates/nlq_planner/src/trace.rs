use serde::Serialize;

/// One entry of the verbose-mode `trace`. Successful
/// steps use their own step kind instead of `"error"`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceEntry {
    pub step_index: usize,
    pub kind: String,
    pub output: serde_json::Value,
}

impl TraceEntry {
    pub fn error(step_index: usize, reason: impl Into<String>) -> Self {
        Self { step_index, kind: "error".to_string(), output: serde_json::Value::String(reason.into()) }
    }

    pub fn ok(step_index: usize, kind: impl Into<String>, output: serde_json::Value) -> Self {
        Self { step_index, kind: kind.into(), output }
    }
}

/// One entry of verbose mode's `executedQueries`.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutedQueryTrace {
    pub operation: String,
    pub description: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
}
