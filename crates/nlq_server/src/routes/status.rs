//! `GET /api/status`: returns the capability list. With no `dbUrl` in play
//! this reports the full vocabulary the Capability Profiler can ever emit
//! for a connected database, not a live-schema-derived subset.

use axum::Json;
use serde::Serialize;

const CAPABILITIES: &[&str] = &["top_selling_products", "revenue_over_time", "activity_over_time", "quantity_tracking"];

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    pub capabilities: Vec<&'static str>,
}

pub async fn status_handler() -> Json<StatusResponse> {
    Json(StatusResponse { success: true, capabilities: CAPABILITIES.to_vec() })
}
