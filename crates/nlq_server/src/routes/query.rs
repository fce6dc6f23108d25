//! `POST /api/query`.

use axum::extract::State;
use axum::Json;
use nlq_core::{AgentError, DbKind};
use nlq_planner::{AgentResponse, PipelineOptions};
use serde::Deserialize;
use tracing::info;

use crate::auth::AuthenticatedUser;
use crate::error::ServerError;
use crate::state::AppState;

const MIN_QUERY_LEN: usize = 3;
const MAX_QUERY_LEN: usize = 500;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryRequest {
    pub query: String,
    pub db_url: String,
    #[serde(default)]
    pub db_type: Option<DbKind>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub refresh_schema: bool,
    #[serde(default)]
    pub insight: bool,
}

pub async fn query_handler(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<QueryRequest>,
) -> Result<Json<AgentResponse>, ServerError> {
    if !(MIN_QUERY_LEN..=MAX_QUERY_LEN).contains(&request.query.chars().count()) {
        return Err(AgentError::bad_input(format!(
                    "query must be between {MIN_QUERY_LEN} and {MAX_QUERY_LEN} characters"
            ))
            .into());
    }

    let options = PipelineOptions {
        verbose: request.insight,
        dry_run: request.dry_run,
        force_schema_refresh: request.refresh_schema,
    };

    let response = state
    .pipeline
    .handle_turn(&user.user_id, &request.query, &request.db_url, request.db_type, options)
    .await?;

    info!(user_id = %user.user_id, query_id = %response.query_id, "handled query turn");
    Ok(Json(response))
}
