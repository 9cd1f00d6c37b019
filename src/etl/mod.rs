//! Core ELT abstractions
//!
//! Extractors pull records from a source system, transformers reshape them and
//! loaders write them into the raw layer. [`Pipeline`] wires the three together.

mod extract;
mod load;
mod metrics;
mod pipeline;
mod transform;

pub use extract::{Extractor, ExtractorMetadata};
pub use load::Loader;
pub use metrics::{ExtractorMetrics, MetricsSnapshot};
pub use pipeline::{Pipeline, PipelineReport};
pub use transform::{IdentityTransformer, Transformer, TransformerChain};

/// A single extracted record
pub type Record = serde_json::Value;
