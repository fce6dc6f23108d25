//! Environment-driven configuration: check the environment, fall back to a
//! compiled default, never fail to start for an absent variable.

use std::time::Duration;

use nlq_llm::{LlmConfig, LlmProvider};

const DEFAULT_SCHEMA_TTL_MS: i64 = 86_400_000;
const DEFAULT_ROW_CAP: u32 = 500;
const DEFAULT_QUERY_TIMEOUT_MS: u64 = 10_000;
const DEFAULT_PREFLIGHT_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_SQL_POOL_MAX: u32 = 10;
const DEFAULT_HTTP_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_STORAGE_PATH: &str = "sqlite://nlq.db";
const DEFAULT_LLM_TIMEOUT_MS: u64 = 15_000;

/// Resolved server configuration. Every field has a compiled default;
/// `ServerConfig::from_env` never returns an error over a missing variable.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub schema_ttl: chrono::Duration,
    pub default_row_cap: u32,
    pub query_timeout: Duration,
    pub preflight_timeout: Duration,
    pub redact_sql: bool,
    pub sql_pool_max: u32,
    pub log_dir: Option<String>,
    pub http_addr: String,
    pub storage_path: String,
    pub llm: Option<LlmConfig>,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            schema_ttl: chrono::Duration::milliseconds(env_i64("NLQ_SCHEMA_TTL_MS", DEFAULT_SCHEMA_TTL_MS)),
            default_row_cap: env_u32("NLQ_DEFAULT_ROW_CAP", DEFAULT_ROW_CAP),
            query_timeout: Duration::from_millis(env_u64("NLQ_QUERY_TIMEOUT_MS", DEFAULT_QUERY_TIMEOUT_MS)),
            preflight_timeout: Duration::from_millis(env_u64("NLQ_PREFLIGHT_TIMEOUT_MS", DEFAULT_PREFLIGHT_TIMEOUT_MS)),
            redact_sql: env_bool("NLQ_REDACT_SQL", true),
            sql_pool_max: env_u32("NLQ_SQL_POOL_MAX", DEFAULT_SQL_POOL_MAX),
            log_dir: std::env::var("NLQ_LOG_DIR").ok(),
            http_addr: std::env::var("NLQ_HTTP_ADDR").unwrap_or_else(|_| DEFAULT_HTTP_ADDR.to_string()),
            storage_path: std::env::var("NLQ_STORAGE_PATH").unwrap_or_else(|_| DEFAULT_STORAGE_PATH.to_string()),
            llm: llm_config_from_env(),
        }
    }
}

/// Builds an `LlmConfig` only when `NLQ_LLM_PROVIDER` names a recognized
/// provider; any other absence or typo degrades to no oracle — absence is
/// never fatal, the agent falls back to its deterministic heuristics.
fn llm_config_from_env() -> Option<LlmConfig> {
    let provider = match std::env::var("NLQ_LLM_PROVIDER").ok()?.to_lowercase().as_str() {
        "ollama" => LlmProvider::Ollama,
        "claude" => LlmProvider::Claude,
        "openai" => LlmProvider::OpenAi,
        other => {
            tracing::warn!(provider = other, "unrecognized NLQ_LLM_PROVIDER, running without an LLM oracle");
            return None;
        }
    };

    Some(LlmConfig {
            provider,
            model: std::env::var("NLQ_LLM_MODEL").unwrap_or_else(|_| "default".to_string()),
            endpoint: std::env::var("NLQ_LLM_BASE_URL").ok(),
            api_key: std::env::var("NLQ_LLM_API_KEY").ok(),
            timeout_secs: env_u64("NLQ_LLM_TIMEOUT_MS", DEFAULT_LLM_TIMEOUT_MS) / 1000,
    })
}

fn env_i64(key: &str, default: i64) -> i64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key).ok().and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_unset() {
        std::env::remove_var("NLQ_HTTP_ADDR");
        std::env::remove_var("NLQ_LLM_PROVIDER");
        let config = ServerConfig::from_env();
        assert_eq!(config.http_addr, DEFAULT_HTTP_ADDR);
        assert!(config.llm.is_none());
    }
}
