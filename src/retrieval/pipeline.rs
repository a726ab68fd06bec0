//! Build-then-query retrieval pipeline

use super::document::{Answer, Context, Document, RetrievedDocument};
use super::prompt::PromptTemplate;
use crate::embedding::{
    BatchEmbedder, EmbeddingError, EmbeddingProvider, VectorId, VectorIndex, VectorIndexError,
};
use crate::generation::{GenerationError, TextGenerator};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum PipelineError {
    /// Embedding backend failure, surfaced unchanged
    #[error("Embedding provider failed: {0}")]
    Provider(#[source] EmbeddingError),

    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Cannot build an index from an empty corpus")]
    EmptyCorpus,

    #[error("Pipeline has not been built")]
    NotBuilt,

    #[error("Pipeline is already built; create a new pipeline to rebuild")]
    AlreadyBuilt,

    #[error("Index references unknown document {0}")]
    UnknownDocument(VectorId),

    #[error("Generation failed: {0}")]
    Generation(#[from] GenerationError),

    #[error("Persistence error: {context}: {message}")]
    Persistence { context: String, message: String },
}

impl PipelineError {
    pub(crate) fn persistence(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Persistence {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

impl From<EmbeddingError> for PipelineError {
    fn from(err: EmbeddingError) -> Self {
        match err {
            EmbeddingError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            EmbeddingError::InvalidInput(message) => Self::InvalidArgument(message),
            other => Self::Provider(other),
        }
    }
}

impl From<VectorIndexError> for PipelineError {
    fn from(err: VectorIndexError) -> Self {
        match err {
            VectorIndexError::DimensionMismatch { expected, actual } => {
                Self::DimensionMismatch { expected, actual }
            }
            VectorIndexError::InvalidDimension(actual) => Self::InvalidArgument(format!(
                "embedding dimension must be greater than 0, got {actual}"
            )),
            VectorIndexError::InvalidArgument(message) => Self::InvalidArgument(message),
            VectorIndexError::IoError(e) => Self::persistence("index io", e),
            VectorIndexError::SerializationError(message) => {
                Self::persistence("index format", message)
            }
        }
    }
}

/// Tuning for the build phase and context assembly
#[derive(Debug, Clone)]
pub struct PipelineOptions {
    /// Texts per provider call during build
    pub batch_size: usize,
    /// Provider calls in flight during build
    pub max_concurrent: usize,
    /// Placed between document contents in the assembled context
    pub separator: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            batch_size: 32,
            max_concurrent: 4,
            separator: "\n".to_string(),
        }
    }
}

/// Documents and their index, populated once and read-only afterwards
#[derive(Debug)]
pub struct BuiltIndex {
    pub(crate) documents: Vec<Document>,
    pub(crate) index: VectorIndex,
}

impl BuiltIndex {
    pub(crate) fn new(documents: Vec<Document>, index: VectorIndex) -> Result<Self, PipelineError> {
        if documents.len() as u64 != index.len() {
            return Err(PipelineError::persistence(
                "built index",
                format!(
                    "{} documents but {} vectors",
                    documents.len(),
                    index.len()
                ),
            ));
        }
        if let Some((position, doc)) = documents
            .iter()
            .enumerate()
            .find(|(position, doc)| doc.id != *position as VectorId)
        {
            return Err(PipelineError::persistence(
                "built index",
                format!("document at position {} has identity {}", position, doc.id),
            ));
        }

        Ok(Self { documents, index })
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }
}

/// Pipeline lifecycle: `Unbuilt` until [`RetrievalPipeline::build`] succeeds
#[derive(Debug)]
pub enum PipelineState {
    Unbuilt,
    Built(BuiltIndex),
}

/// Summary of a successful build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildReport {
    pub documents: usize,
    pub dimension: usize,
    pub duration_ms: u64,
}

/// Embeds a corpus once, then answers nearest-neighbour queries against it.
///
/// `build` moves the pipeline from `Unbuilt` to `Built`; there is no way back,
/// so rebuilding means constructing a new pipeline. Queries take `&self` and
/// touch only immutable state, so a built pipeline behind an `Arc` serves
/// concurrent queries without locking.
pub struct RetrievalPipeline {
    provider: Arc<dyn EmbeddingProvider>,
    options: PipelineOptions,
    state: PipelineState,
}

impl RetrievalPipeline {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, options: PipelineOptions) -> Self {
        Self {
            provider,
            options,
            state: PipelineState::Unbuilt,
        }
    }

    pub(crate) fn from_built(
        provider: Arc<dyn EmbeddingProvider>,
        options: PipelineOptions,
        built: BuiltIndex,
    ) -> Self {
        Self {
            provider,
            options,
            state: PipelineState::Built(built),
        }
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    pub fn is_built(&self) -> bool {
        matches!(self.state, PipelineState::Built(_))
    }

    pub fn provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.provider
    }

    pub fn options(&self) -> &PipelineOptions {
        &self.options
    }

    pub fn built(&self) -> Result<&BuiltIndex, PipelineError> {
        match &self.state {
            PipelineState::Built(built) => Ok(built),
            PipelineState::Unbuilt => Err(PipelineError::NotBuilt),
        }
    }

    /// Embed `documents` in order and index them.
    ///
    /// Identities follow input order even though batches are embedded
    /// concurrently. Any failure leaves the pipeline `Unbuilt`.
    pub async fn build<I, S>(&mut self, documents: I) -> Result<BuildReport, PipelineError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if self.is_built() {
            return Err(PipelineError::AlreadyBuilt);
        }

        let texts: Vec<String> = documents.into_iter().map(Into::into).collect();
        if texts.is_empty() {
            return Err(PipelineError::EmptyCorpus);
        }
        if let Some(position) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(PipelineError::InvalidArgument(format!(
                "document {} is empty",
                position
            )));
        }

        info!(
            documents = texts.len(),
            model = self.provider.model_name(),
            "Building retrieval index"
        );

        let embedder = BatchEmbedder::new(
            Arc::clone(&self.provider),
            self.options.batch_size,
            self.options.max_concurrent,
        )?;
        let batch = embedder.embed_all(&texts).await?;

        let dimension = batch.vectors.first().map(Vec::len).unwrap_or(0);
        if dimension == 0 {
            return Err(PipelineError::Provider(EmbeddingError::provider(
                self.provider.model_name(),
                "returned an empty embedding",
            )));
        }
        if dimension != self.provider.dimension() {
            warn!(
                "Provider {} advertises {} dimensions but produced {}",
                self.provider.model_name(),
                self.provider.dimension(),
                dimension
            );
        }

        if let Some(position) = batch.vectors.iter().position(|v| !is_finite(v)) {
            return Err(self.non_finite_output(&format!("document {}", position)));
        }

        let mut index = VectorIndex::with_capacity(dimension, texts.len())?;
        index.add_batch(&batch.vectors)?;

        let documents: Vec<Document> = texts
            .into_iter()
            .enumerate()
            .map(|(id, content)| Document {
                id: id as VectorId,
                content,
            })
            .collect();

        let report = BuildReport {
            documents: documents.len(),
            dimension,
            duration_ms: batch.duration_ms,
        };
        self.state = PipelineState::Built(BuiltIndex::new(documents, index)?);

        info!(
            documents = report.documents,
            dimension = report.dimension,
            duration_ms = report.duration_ms,
            "Retrieval index built"
        );

        Ok(report)
    }

    /// Top `k` documents for `question`, closest first
    pub async fn retrieve(
        &self,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievedDocument>, PipelineError> {
        if k == 0 {
            return Err(PipelineError::InvalidArgument(
                "k must be greater than 0".to_string(),
            ));
        }
        if question.trim().is_empty() {
            return Err(PipelineError::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }
        let built = self.built()?;

        let query = self.provider.embed(question).await?;
        if !is_finite(&query) {
            return Err(self.non_finite_output("question"));
        }
        let hits = built.index.search(&query, k)?;

        debug!(k, hits = hits.len(), "Search complete");

        hits.into_iter()
            .map(|hit| {
                let doc = usize::try_from(hit.id)
                    .ok()
                    .and_then(|i| built.documents.get(i))
                    .ok_or(PipelineError::UnknownDocument(hit.id))?;
                Ok(RetrievedDocument {
                    id: hit.id,
                    distance: hit.distance,
                    content: doc.content.clone(),
                })
            })
            .collect()
    }

    /// Retrieve the top `k` documents and join them into a context
    pub async fn query(&self, question: &str, k: usize) -> Result<Context, PipelineError> {
        let documents = self.retrieve(question, k).await?;
        Ok(Context::new(documents, &self.options.separator))
    }

    fn non_finite_output(&self, what: &str) -> PipelineError {
        PipelineError::Provider(EmbeddingError::provider(
            self.provider.model_name(),
            format!("returned NaN or infinite values for {}", what),
        ))
    }

    /// Query, render the prompt, and hand it to `generator`
    pub async fn ask(
        &self,
        question: &str,
        k: usize,
        generator: &dyn TextGenerator,
        template: &PromptTemplate,
    ) -> Result<Answer, PipelineError> {
        let context = self.query(question, k).await?;
        let prompt = template.render(context.as_str(), question);

        info!(
            model = generator.model_name(),
            context_documents = context.documents.len(),
            "Generating answer"
        );

        let text = generator.generate(&prompt).await?;

        Ok(Answer {
            text,
            prompt,
            context,
        })
    }
}

fn is_finite(vector: &[f32]) -> bool {
    vector.iter().all(|x| x.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::{HashingProvider, Vector};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn pipeline() -> RetrievalPipeline {
        let provider = Arc::new(HashingProvider::new(64).unwrap());
        RetrievalPipeline::new(provider, PipelineOptions::default())
    }

    /// Emits NaN for texts containing "bad", or for every text once `poisoned` is set
    struct NanProvider {
        poisoned: AtomicBool,
    }

    #[async_trait]
    impl EmbeddingProvider for NanProvider {
        async fn embed(&self, text: &str) -> Result<Vector, EmbeddingError> {
            if self.poisoned.load(Ordering::SeqCst) || text.contains("bad") {
                Ok(vec![f32::NAN, 0.0])
            } else {
                Ok(vec![1.0, 0.0])
            }
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_name(&self) -> &str {
            "nan"
        }
    }

    #[tokio::test]
    async fn test_non_finite_embeddings_are_provider_errors() {
        let provider = Arc::new(NanProvider {
            poisoned: AtomicBool::new(false),
        });
        let mut pipeline = RetrievalPipeline::new(provider.clone(), PipelineOptions::default());

        let result = pipeline.build(["good", "bad"]).await;
        assert!(matches!(result, Err(PipelineError::Provider(_))));
        assert!(!pipeline.is_built());

        pipeline.build(["good"]).await.unwrap();
        provider.poisoned.store(true, Ordering::SeqCst);
        assert!(matches!(
            pipeline.query("anything", 1).await,
            Err(PipelineError::Provider(_))
        ));
    }

    #[tokio::test]
    async fn test_starts_unbuilt() {
        let pipeline = pipeline();
        assert!(!pipeline.is_built());
        assert!(matches!(pipeline.state(), PipelineState::Unbuilt));
        assert!(matches!(pipeline.built(), Err(PipelineError::NotBuilt)));
    }

    #[tokio::test]
    async fn test_second_build_rejected() {
        let mut pipeline = pipeline();
        pipeline.build(["alpha", "beta"]).await.unwrap();

        let result = pipeline.build(["gamma"]).await;
        assert!(matches!(result, Err(PipelineError::AlreadyBuilt)));
        assert_eq!(pipeline.built().unwrap().documents().len(), 2);
    }

    #[tokio::test]
    async fn test_empty_document_rejected_before_embedding() {
        let mut pipeline = pipeline();
        let result = pipeline.build(["alpha", "  "]).await;
        assert!(matches!(result, Err(PipelineError::InvalidArgument(_))));
        assert!(!pipeline.is_built());
    }

    #[tokio::test]
    async fn test_invalid_query_arguments() {
        let mut pipeline = pipeline();
        pipeline.build(["alpha"]).await.unwrap();

        assert!(matches!(
            pipeline.query("alpha", 0).await,
            Err(PipelineError::InvalidArgument(_))
        ));
        assert!(matches!(
            pipeline.query("", 1).await,
            Err(PipelineError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_error_mapping() {
        let err: PipelineError = VectorIndexError::DimensionMismatch {
            expected: 4,
            actual: 3,
        }
        .into();
        assert!(matches!(
            err,
            PipelineError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));

        let err: PipelineError = EmbeddingError::provider("gemini", "rate limited").into();
        assert!(matches!(err, PipelineError::Provider(_)));

        let err: PipelineError = EmbeddingError::InvalidInput("Empty text".to_string()).into();
        assert!(matches!(err, PipelineError::InvalidArgument(_)));
    }

    #[test]
    fn test_built_index_checks_alignment() {
        let mut index = VectorIndex::new(1).unwrap();
        index.add(&[0.0]).unwrap();

        let docs = vec![Document {
            id: 5,
            content: "x".to_string(),
        }];
        assert!(BuiltIndex::new(docs, index.clone()).is_err());
        assert!(BuiltIndex::new(Vec::new(), index).is_err());
    }
}
