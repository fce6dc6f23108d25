//! Binary entry point: loads configuration, wires storage, the driver
//! registry, the pipeline and session manager, then serves the router.

use std::collections::HashMap;
use std::sync::Arc;

use nlq_core::DbKind;
use nlq_driver_mongodb::MongoDriver;
use nlq_driver_mysql::MysqlDriver;
use nlq_driver_postgres::PostgresDriver;
use nlq_llm::{HttpLlmOracle, LlmOracle};
use nlq_memory::MemoryStore;
use nlq_planner::AgentPipeline;
use nlq_pool::ConnectionPool;
use nlq_schema::SchemaRegistry;
use nlq_server::config::ServerConfig;
use nlq_server::{shutdown, AppState};
use nlq_session::SessionManager;
use nlq_storage::Storage;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "nlq_server=info,tower_http=info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ServerConfig::from_env();
    tracing::info!(http_addr = %config.http_addr, "starting nlq_server v{}", env!("CARGO_PKG_VERSION"));

    let storage = Arc::new(Storage::connect(&config.storage_path).await?);

    let mut drivers: HashMap<DbKind, Arc<dyn nlq_core::DbDriver>> = HashMap::new();
    drivers.insert(DbKind::SqlA, Arc::new(PostgresDriver::new()));
    drivers.insert(DbKind::SqlB, Arc::new(MysqlDriver::new()));
    drivers.insert(DbKind::Document, Arc::new(MongoDriver::new()));
    let pool = Arc::new(ConnectionPool::with_preflight_bound(drivers, config.preflight_timeout));

    let schema_registry = Arc::new(SchemaRegistry::with_ttl(storage.clone(), config.schema_ttl));
    let memory = Arc::new(MemoryStore::new(storage.clone()));

    let llm: Option<Arc<dyn LlmOracle>> = match &config.llm {
        Some(llm_config) => Some(Arc::new(HttpLlmOracle::new(llm_config)?)),
        None => {
            tracing::warn!("no NLQ_LLM_PROVIDER configured, running with heuristic-only planning");
            None
        }
    };
    let llm_deadline = config.query_timeout;

    let pipeline = Arc::new(AgentPipeline::new(
        pool.clone(),
        schema_registry.clone(),
        memory.clone(),
        llm,
        llm_deadline,
        config.query_timeout,
        config.redact_sql,
        config.default_row_cap,
    ));

    let sessions = Arc::new(SessionManager::new(storage.clone(), pipeline.clone()));

    let sweep_sessions = sessions.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(60));
        loop {
            ticker.tick().await;
            match sweep_sessions.sweep_expired().await {
                Ok(count) if count > 0 => tracing::info!(count, "swept expired sessions"),
                Ok(_) => {}
                Err(e) => tracing::warn!(error = %e, "session sweep failed"),
            }
        }
    });

    let config = Arc::new(config);
    let state = AppState { pipeline, memory, schema_registry, sessions, config: config.clone() };

    let router = nlq_server::build_router(state, config.query_timeout);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!(addr = %config.http_addr, "listening");

    axum::serve(listener, router).with_graceful_shutdown(shutdown::shutdown_signal()).await?;

    Ok(())
}
