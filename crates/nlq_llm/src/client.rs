use std::time::Duration;

use async_trait::async_trait;
use nlq_core::AgentError;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::json;

use crate::config::{LlmConfig, LlmProvider};

const SYSTEM_PROMPT: &str = "You are a query-planning oracle for a natural-language database agent. Follow the caller's output contract exactly.";

/// A text-to-text oracle. The planner and query synthesizer are the only
/// callers; both treat the reply as opaque text and sanitize/parse it
/// themselves.
#[async_trait]
pub trait LlmOracle: Send + Sync {
    async fn complete(&self, prompt: &str, deadline: Duration) -> Result<String, AgentError>;
}

/// HTTP-backed oracle speaking one of three provider wire formats. Unlike a
/// sync facade wrapping an internal runtime, this is natively async: every
/// other suspension point in the pipeline (pool, schema registry, storage)
/// already awaits directly, so the oracle does too.
pub struct HttpLlmOracle {
    model: String,
    provider: LlmProvider,
    endpoint: String,
    api_key: Option<String>,
    http: reqwest::Client,
}

impl HttpLlmOracle {
    pub fn new(config: &LlmConfig) -> Result<Self, AgentError> {
        let endpoint = config.endpoint.clone().unwrap_or_else(|| config.provider.default_endpoint().to_string());
        let api_key = match config.provider {
            LlmProvider::Ollama => None,
            LlmProvider::Claude => config.api_key.clone().or_else(|| std::env::var("ANTHROPIC_API_KEY").ok()),
            LlmProvider::OpenAi => config.api_key.clone().or_else(|| std::env::var("OPENAI_API_KEY").ok()),
        };

        if matches!(config.provider, LlmProvider::Claude | LlmProvider::OpenAi) && api_key.is_none() {
            return Err(AgentError::bad_input("llm api key (or provider env var) is required"));
        }

        let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs.max(1)))
        .build()
        .map_err(|e| AgentError::bad_input(format!("failed to build LLM http client: {e}")))?;

        Ok(Self { model: config.model.clone(), provider: config.provider, endpoint, api_key, http })
    }
}

#[async_trait]
impl LlmOracle for HttpLlmOracle {
    async fn complete(&self, prompt: &str, deadline: Duration) -> Result<String, AgentError> {
        tokio::time::timeout(deadline, self.complete_inner(prompt)).await.map_err(|_| AgentError::Timeout)?
    }
}

impl HttpLlmOracle {
    async fn complete_inner(&self, prompt: &str) -> Result<String, AgentError> {
        match self.provider {
            LlmProvider::Ollama => self.complete_ollama(prompt).await,
            LlmProvider::Claude => self.complete_claude(prompt).await,
            LlmProvider::OpenAi => self.complete_openai(prompt).await,
        }
    }

    async fn complete_ollama(&self, prompt: &str) -> Result<String, AgentError> {
        let url = format!("{}/api/generate", self.endpoint.trim_end_matches('/'));
        let resp = self
        .http
        .post(url)
        .json(&json!({ "model": self.model, "prompt": prompt, "stream": false }))
        .send()
        .await
        .map_err(|e| AgentError::db_error(format!("ollama request failed: {e}")))?;
        let body = response_text(resp).await?;
        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| AgentError::PlanParseFailed(e.to_string()))?;
        parsed
        .get("response")
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| AgentError::PlanParseFailed("ollama response missing string field `response`".into()))
    }

    async fn complete_claude(&self, prompt: &str) -> Result<String, AgentError> {
        let url = format!("{}/v1/messages", self.endpoint.trim_end_matches('/'));
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(self.api_key.as_deref().unwrap_or_default())
            .map_err(|e| AgentError::bad_input(format!("invalid claude api key header: {e}")))?,
        );
        headers.insert("anthropic-version", HeaderValue::from_static("2023-06-01"));

        let resp = self
        .http
        .post(url)
        .headers(headers)
        .json(&json!({
                    "model": self.model,
                    "max_tokens": 1024,
                    "temperature": 0,
                    "system": SYSTEM_PROMPT,
                    "messages": [{ "role": "user", "content": prompt }],
        }))
        .send()
        .await
        .map_err(|e| AgentError::db_error(format!("claude request failed: {e}")))?;
        let body = response_text(resp).await?;
        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| AgentError::PlanParseFailed(e.to_string()))?;
        parsed
        .get("content")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("text"))
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| AgentError::PlanParseFailed("claude response missing content[0].text".into()))
    }

    async fn complete_openai(&self, prompt: &str) -> Result<String, AgentError> {
        let url = format!("{}/v1/chat/completions", self.endpoint.trim_end_matches('/'));
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", self.api_key.as_deref().unwrap_or_default()))
            .map_err(|e| AgentError::bad_input(format!("invalid auth header: {e}")))?,
        );

        let resp = self
        .http
        .post(url)
        .headers(headers)
        .json(&json!({
                    "model": self.model,
                    "temperature": 0,
                    "messages": [
                        { "role": "system", "content": SYSTEM_PROMPT },
                        { "role": "user", "content": prompt },
                    ],
        }))
        .send()
        .await
        .map_err(|e| AgentError::db_error(format!("openai request failed: {e}")))?;
        let body = response_text(resp).await?;
        let parsed: serde_json::Value = serde_json::from_str(&body).map_err(|e| AgentError::PlanParseFailed(e.to_string()))?;
        parsed
        .get("choices")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|v| v.get("message"))
        .and_then(|v| v.get("content"))
        .and_then(|v| v.as_str())
        .map(ToString::to_string)
        .ok_or_else(|| AgentError::PlanParseFailed("openai response missing choices[0].message.content".into()))
    }
}

async fn response_text(resp: reqwest::Response) -> Result<String, AgentError> {
    let status = resp.status();
    let body = resp.text().await.map_err(|e| AgentError::db_error(format!("failed reading LLM response body: {e}")))?;
    if !status.is_success() {
        return Err(AgentError::db_error(format!("LLM provider returned {}: {}", status.as_u16(), body)));
    }
    Ok(body)
}
