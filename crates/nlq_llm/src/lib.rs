//! LLM oracle client: a thin async text-to-text call plus the
//! sanitization/parsing layer that turns its replies into typed values the
//! Planner and Executor can trust. The oracle itself is untrusted — every
//! caller treats a parse failure as equivalent to the oracle being absent.

mod client;
mod config;
mod prompts;
mod sanitize;

pub use client::{HttpLlmOracle, LlmOracle};
pub use config::{LlmConfig, LlmProvider};
pub use prompts::{
    build_plan_prompt, build_query_synthesis_prompt, build_secondary_analysis_prompt,
    default_summary_message, parse_plan_reply, parse_query_synthesis_reply,
};
pub use sanitize::sanitize_json;
