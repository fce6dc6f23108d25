//! Schema Detector, Schema Registry, Capability Profiler and
//! Keyword Matcher.

mod detector;
mod keyword;
mod profiler;
mod registry;

pub use detector::infer_collection_schema;
pub use keyword::candidate_objects;
pub use profiler::capabilities_string;
pub use registry::SchemaRegistry;
