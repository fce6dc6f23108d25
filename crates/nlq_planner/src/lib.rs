//! Planner, Executor, query synthesis, and Response Shaper: the Plan →
//! Execute → Analyze pipeline.

mod executor;
mod greeting;
mod heuristic;
mod pipeline;
mod planner;
mod shaper;
mod stats;
mod trace;

pub use executor::{ExecutionOutcome, Executor};
pub use pipeline::{AgentPipeline, PipelineOptions};
pub use planner::Planner;
pub use shaper::{AgentResponse, Shaper};
pub use trace::{ExecutedQueryTrace, TraceEntry};
