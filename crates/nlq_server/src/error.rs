//! Maps `AgentError` onto the HTTP error shape of : `{message: "<ErrorKind>: <detail>"}`,
//! 4xx for validation-shaped failures, 5xx for everything else.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nlq_core::AgentError;
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

/// Thin newtype so we can impl `IntoResponse` for an error crate we don't own.
pub struct ServerError(pub AgentError);

impl From<AgentError> for ServerError {
    fn from(err: AgentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = status_for(&self.0);
        let body = ErrorBody { message: self.0.to_string(), code: Some(self.0.kind_tag()) };
        (status, Json(body)).into_response()
    }
}

fn status_for(err: &AgentError) -> StatusCode {
    match err {
        AgentError::BadInput(_) | AgentError::UnsupportedEndpoint(_) => StatusCode::BAD_REQUEST,
        AgentError::SessionNotFound(_) => StatusCode::NOT_FOUND,
        AgentError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        AgentError::ConnectionFailed(_) | AgentError::DbError(_) | AgentError::Timeout => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}
