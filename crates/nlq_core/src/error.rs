use crate::FormattedError;
use thiserror::Error;

/// Top-level error taxonomy for the agent pipeline.
///
/// Framing errors (`BadInput`, `UnsupportedEndpoint`, `ConnectionFailed`,
/// `SessionNotFound`, `Unauthorized`) abort the whole request. Everything
/// else is captured per plan-step into the execution trace and the pipeline
/// continues — see `nlq_planner`'s `StepOutcome`.
#[derive(Debug, Error)]
pub enum AgentError {
    /// Malformed request: length bounds, missing dbUrl, etc. No memory record.
    #[error("BadInput: {0}")]
    BadInput(String),

    /// URL scheme not recognized as document/sqlA/sqlB. No memory record.
    #[error("UnsupportedEndpoint: {0}")]
    UnsupportedEndpoint(String),

    /// Connection preflight failed. No memory record.
    #[error("ConnectionFailed: {0}")]
    ConnectionFailed(FormattedError),

    /// Schema introspection threw. Degrades to an empty schema; logged as a warning.
    #[error("SchemaBuildFailed: {0}")]
    SchemaBuildFailed(String),

    /// LLM output was not parseable JSON. Degrades to the heuristic planner.
    #[error("PlanParseFailed: {0}")]
    PlanParseFailed(String),

    /// A generated query violated a Safety Gate rule.
    #[error("SafetyRejected: {0}")]
    SafetyRejected(String),

    /// A DB or LLM call exceeded its deadline.
    #[error("Timeout")]
    Timeout,

    /// Query was cancelled before completion.
    #[error("Cancelled")]
    Cancelled,

    /// The database rejected the query (syntax error, unknown table, constraint, ...).
    #[error("DbError: {0}")]
    DbError(FormattedError),

    /// Session access referenced a sessionId that doesn't exist.
    #[error("SessionNotFound: {0}")]
    SessionNotFound(String),

    /// Session access was attempted by a user who doesn't own the session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Operation not supported by this database kind.
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Filesystem or network I/O error outside the DB/LLM boundary.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl AgentError {
    pub fn bad_input(msg: impl Into<String>) -> Self {
        Self::BadInput(msg.into())
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(FormattedError::new(msg))
    }

    pub fn db_error(msg: impl Into<String>) -> Self {
        Self::DbError(FormattedError::new(msg))
    }

    pub fn safety_rejected(rule: impl Into<String>) -> Self {
        Self::SafetyRejected(rule.into())
    }

    /// Access the structured error information, if the variant carries one.
    pub fn formatted(&self) -> Option<&FormattedError> {
        match self {
            Self::ConnectionFailed(f) | Self::DbError(f) => Some(f),
            _ => None,
        }
    }

    /// Whether the error is retriable (e.g., transient network issues).
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::ConnectionFailed(f) | Self::DbError(f) => f.retriable,
            Self::Timeout => true,
            _ => false,
        }
    }

    /// The taxonomy tag as used in `{message: "<ErrorKind>: <detail>"}` responses.
    pub fn kind_tag(&self) -> &'static str {
        match self {
            Self::BadInput(_) => "BadInput",
            Self::UnsupportedEndpoint(_) => "UnsupportedEndpoint",
            Self::ConnectionFailed(_) => "ConnectionFailed",
            Self::SchemaBuildFailed(_) => "SchemaBuildFailed",
            Self::PlanParseFailed(_) => "PlanParseFailed",
            Self::SafetyRejected(_) => "SafetyRejected",
            Self::Timeout => "Timeout",
            Self::Cancelled => "Cancelled",
            Self::DbError(_) => "DbError",
            Self::SessionNotFound(_) => "SessionNotFound",
            Self::Unauthorized(_) => "Unauthorized",
            Self::NotSupported(_) => "NotSupported",
            Self::IoError(_) => "IoError",
        }
    }

    /// Whether this variant is a framing error that aborts the whole request
    /// rather than being captured into a step's trace.
    pub fn is_framing_error(&self) -> bool {
        matches!(
            self,
            Self::BadInput(_)
            | Self::UnsupportedEndpoint(_)
            | Self::ConnectionFailed(_)
            | Self::SessionNotFound(_)
            | Self::Unauthorized(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn framing_errors_are_flagged() {
        assert!(AgentError::bad_input("too short").is_framing_error());
        assert!(AgentError::UnsupportedEndpoint("redis://".into()).is_framing_error());
        assert!(!AgentError::safety_rejected("DELETE_WITHOUT_WHERE").is_framing_error());
        assert!(!AgentError::Timeout.is_framing_error());
    }

    #[test]
    fn kind_tag_matches_taxonomy_name() {
        assert_eq!(AgentError::Timeout.kind_tag(), "Timeout");
        assert_eq!(
            AgentError::safety_rejected("MULTIPLE_STATEMENTS").kind_tag(),
            "SafetyRejected"
        );
    }
}
