//! `POST /api/feedback`: attaches a thumbs up/down to a prior turn,
//! looked up by the `queryId` its response handed back.

use axum::extract::State;
use axum::Json;
use nlq_core::Feedback;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::AuthenticatedUser;
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackRequest {
    pub query_id: Uuid,
    pub feedback: Feedback,
}

#[derive(Debug, Serialize)]
pub struct FeedbackResponse {
    pub success: bool,
}

pub async fn feedback_handler(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    Json(request): Json<FeedbackRequest>,
) -> Result<Json<FeedbackResponse>, ServerError> {
    state.memory.attach_feedback(request.query_id, request.feedback).await?;
    Ok(Json(FeedbackResponse { success: true }))
}
