use std::sync::Arc;

use nlq_memory::MemoryStore;
use nlq_planner::AgentPipeline;
use nlq_schema::SchemaRegistry;
use nlq_session::SessionManager;

use crate::config::ServerConfig;

/// Shared application state handed to every axum handler (grounded in the
/// pack's `AppState` convention — one struct, cloned cheaply via `Arc`s).
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<AgentPipeline>,
    pub memory: Arc<MemoryStore>,
    pub schema_registry: Arc<SchemaRegistry>,
    pub sessions: Arc<SessionManager>,
    pub config: Arc<ServerConfig>,
}
