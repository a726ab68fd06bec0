//! Retrieval pipeline
//!
//! Build time: documents → embeddings → index.
//! Query time: question → embedding → k-NN search → documents → context,
//! optionally followed by prompt rendering and a generation call.

mod document;
mod pipeline;
mod prompt;
mod snapshot;

pub use document::{Answer, Context, Document, RetrievedDocument};
pub use pipeline::{
    BuildReport, BuiltIndex, PipelineError, PipelineOptions, PipelineState, RetrievalPipeline,
};
pub use prompt::{PromptTemplate, DEFAULT_INSTRUCTION};
