//! On-disk snapshot of a built pipeline
//!
//! Layout: zstd-compressed JSON holding the model name, the documents in
//! identity order and the index as `(dimension, [(id, vector)])`.

use super::document::Document;
use super::pipeline::{BuiltIndex, PipelineError, PipelineOptions, RetrievalPipeline};
use crate::embedding::{EmbeddingProvider, IndexSnapshot, VectorIndex};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tracing::info;

const FORMAT_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

#[derive(Debug, Serialize, Deserialize)]
struct PipelineSnapshot {
    format_version: u32,
    model: String,
    documents: Vec<Document>,
    index: IndexSnapshot,
}

impl RetrievalPipeline {
    /// Persist the built state to `path`
    ///
    /// The file is written next to `path` first and renamed into place, so a
    /// crash mid-write never leaves a truncated snapshot behind.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let built = self.built()?;

        let snapshot = PipelineSnapshot {
            format_version: FORMAT_VERSION,
            model: self.provider().model_name().to_string(),
            documents: built.documents().to_vec(),
            index: built.index().to_snapshot(),
        };

        let json = serde_json::to_vec(&snapshot)
            .map_err(|e| PipelineError::persistence("serialize snapshot", e))?;
        let compressed = zstd::encode_all(json.as_slice(), ZSTD_LEVEL)
            .map_err(|e| PipelineError::persistence("compress snapshot", e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                PipelineError::persistence(format!("create {}", parent.display()), e)
            })?;
        }

        let staging = path.with_extension("partial");
        std::fs::write(&staging, &compressed)
            .map_err(|e| PipelineError::persistence(format!("write {}", staging.display()), e))?;
        std::fs::rename(&staging, path)
            .map_err(|e| PipelineError::persistence(format!("rename to {}", path.display()), e))?;

        info!(
            path = %path.display(),
            documents = snapshot.documents.len(),
            bytes = compressed.len(),
            "Saved retrieval snapshot"
        );

        Ok(())
    }

    /// Load a snapshot written by [`RetrievalPipeline::save`] as a built pipeline
    ///
    /// The snapshot must have been built with the same model as `provider`;
    /// vectors from different models are not comparable.
    pub fn open(
        provider: Arc<dyn EmbeddingProvider>,
        options: PipelineOptions,
        path: &Path,
    ) -> Result<Self, PipelineError> {
        let compressed = std::fs::read(path)
            .map_err(|e| PipelineError::persistence(format!("read {}", path.display()), e))?;
        let json = zstd::decode_all(compressed.as_slice())
            .map_err(|e| PipelineError::persistence("decompress snapshot", e))?;
        let snapshot: PipelineSnapshot = serde_json::from_slice(&json)
            .map_err(|e| PipelineError::persistence("parse snapshot", e))?;

        if snapshot.format_version != FORMAT_VERSION {
            return Err(PipelineError::persistence(
                "snapshot format",
                format!(
                    "unsupported version {} (expected {})",
                    snapshot.format_version, FORMAT_VERSION
                ),
            ));
        }
        if snapshot.model != provider.model_name() {
            return Err(PipelineError::persistence(
                "snapshot model",
                format!(
                    "built with '{}' but provider is '{}'",
                    snapshot.model,
                    provider.model_name()
                ),
            ));
        }
        if snapshot.documents.is_empty() {
            return Err(PipelineError::EmptyCorpus);
        }

        let index = VectorIndex::from_snapshot(snapshot.index)?;
        let built = BuiltIndex::new(snapshot.documents, index)?;

        info!(
            path = %path.display(),
            documents = built.documents().len(),
            dimension = built.index().dimension(),
            "Opened retrieval snapshot"
        );

        Ok(RetrievalPipeline::from_built(provider, options, built))
    }
}
