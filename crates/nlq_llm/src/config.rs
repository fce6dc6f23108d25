use serde::{Deserialize, Serialize};

/// Which HTTP contract to speak. Endpoint/auth resolution differs per
/// provider; the prompt text sent is identical across all three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    Ollama,
    Claude,
    OpenAi,
}

impl LlmProvider {
    pub fn default_endpoint(self) -> &'static str {
        match self {
            LlmProvider::Ollama => "http://localhost:11434",
            LlmProvider::Claude => "https://api.anthropic.com",
            LlmProvider::OpenAi => "https://api.openai.com",
        }
    }
}

/// Oracle configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub provider: LlmProvider,
    pub model: String,
    pub endpoint: Option<String>,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// No oracle configured: the pipeline falls back to deterministic
    /// heuristics everywhere an LLM call would otherwise happen.
    pub fn absent() -> Option<Self> {
        None
    }
}
