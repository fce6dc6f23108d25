//! Safety Gate: the single choke point every ExecutedQuery passes
//! through before it reaches a driver.

mod document_gate;
mod sentinel;
mod sql_gate;

pub use document_gate::{DEFAULT_ROW_CAP, gate_document};
pub use sentinel::{looks_like_object_id, resolve_date_sentinel};
pub use sql_gate::{DEFAULT_STATEMENT_BUDGET, gate_relational};

use nlq_core::{AgentError, DbKind, ExecutedQuery, SqlDialect};

/// Entry point: dispatches to the document or relational gate based on the
/// query's tag, picking the concrete SQL dialect from `target_kind`.
pub fn gate(
    query: ExecutedQuery,
    target_kind: DbKind,
    caller_overrode_projection: bool,
    redact: bool,
    row_cap: u32,
) -> Result<ExecutedQuery, AgentError> {
    Ok(gate_for_execution(query, target_kind, caller_overrode_projection, redact, row_cap)?.0)
}

/// Like `gate`, but also returns the display form of a relational query's
/// SQL (the real text, or `"[redacted]"` if `redact` is set) so the Executor
/// can populate `executedQueries[i].sql` for the trace.
/// `None` for document-kind queries, which have no `sql` field at all.
pub fn gate_for_execution(
    query: ExecutedQuery,
    target_kind: DbKind,
    caller_overrode_projection: bool,
    redact: bool,
    row_cap: u32,
) -> Result<(ExecutedQuery, Option<String>), AgentError> {
    match query {
        ExecutedQuery::Document { .. } => Ok((gate_document(query, caller_overrode_projection, row_cap)?, None)),
        ExecutedQuery::Relational { .. } => {
            let dialect: Box<dyn SqlDialect> = match target_kind {
                DbKind::SqlA => Box::new(nlq_core::PostgresDialect),
                DbKind::SqlB => Box::new(nlq_core::MySqlDialect),
                DbKind::Document => {
                    return Err(AgentError::bad_input("relational query against a document endpoint"));
                }
            };
            let (gated, _budget, display_sql) = gate_relational(query, dialect.as_ref(), redact)?;
            Ok((gated, Some(display_sql)))
        }
    }
}
