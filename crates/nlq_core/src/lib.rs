#![allow(clippy::result_large_err)]

mod cancel;
mod endpoint;
mod error;
mod error_formatter;
mod executed_query;
mod memory;
mod plan;
mod schema;
mod schema_builder;
mod session;
mod sql_dialect;
mod traits;
mod value;

pub use cancel::CancelToken;
pub use endpoint::{DatabaseEndpoint, DbKind, db_key, normalize_url};
pub use error::AgentError;
pub use error_formatter::{
    ConnectionErrorFormatter, DefaultErrorFormatter, ErrorLocation, FormattedError,
    QueryErrorFormatter, sanitize_uri,
};
pub use executed_query::{DocumentOperation, ExecutedQuery, SortDirection};
pub use memory::{Feedback, MemoryRecord, PatternCounter, PreferredDetail, QueryKind, SkillLevel, UserProfile};
pub use plan::{Plan, PlanStep, StatOp};
pub use schema::{
    CollectionSchema, DocumentFieldInfo, DocumentIndexInfo, DocumentRelationship, InferredType,
    RelationalColumnInfo, RelationalForeignKeyInfo, RelationshipKind, SchemaPayload,
    SchemaSnapshot, TableSchema,
};
pub use schema_builder::{DocumentIndexBuilder, ForeignKeyBuilder};
pub use session::{ChatMessage, ChatMessageMetadata, ChatRole, Session, SessionContext};
pub use sql_dialect::{MySqlDialect, PlaceholderStyle, PostgresDialect, SqlDialect};
pub use traits::{ColumnMeta, Connection, DbDriver, QueryHandle, QueryResult, Row};
pub use value::Value;

pub use chrono;

/// Safely truncate a string at a character boundary, appending "..." if truncated.
pub fn truncate_string_safe(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }

    let truncate_at = max_len.saturating_sub(3);
    let safe_end = s
    .char_indices()
    .take_while(|(idx, _)| *idx <= truncate_at)
    .last()
    .map(|(idx, _)| idx)
    .unwrap_or(0);

    format!("{}...", &s[..safe_end])
}
