//! Embedding providers and the vector index
//!
//! - `EmbeddingProvider` trait for abstraction over backends
//! - `GeminiEmbeddingProvider` for the hosted Gemini embedding API
//! - `FastEmbedProvider` for local embedding (all-MiniLM-L6-v2, 384-dim)
//! - `HashingProvider` for deterministic offline vectors
//! - `CachedEmbeddingProvider` for exact-text memoisation
//! - `VectorIndex` for exact squared-Euclidean k-NN search
//! - `BatchEmbedder` for concurrent, order-preserving corpus embedding

mod batch;
mod cache;
mod gemini;
mod hashing;
mod local;
mod provider;
mod vector_index;

pub use batch::{BatchEmbedder, BatchResult};
pub use cache::{CacheStats, CachedEmbeddingProvider};
pub use gemini::{
    GeminiEmbeddingConfig, GeminiEmbeddingProvider, DEFAULT_BASE_URL as GEMINI_BASE_URL,
    MAX_BATCH_REQUESTS as GEMINI_MAX_BATCH_REQUESTS,
};
pub use hashing::HashingProvider;
pub use local::FastEmbedProvider;
pub use provider::{EmbeddingError, EmbeddingProvider, Vector};
pub use vector_index::{
    squared_l2, IndexEntry, IndexSnapshot, SearchResult, VectorId, VectorIndex, VectorIndexError,
};
