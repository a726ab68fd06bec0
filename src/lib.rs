//! Ragline - retrieval-augmented question answering over a small corpus
//!
//! Embeds every document once into an exact squared-Euclidean index, then
//! answers questions by retrieving the nearest documents and, optionally,
//! asking a language model to answer from that context alone.

pub mod cli;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod retrieval;

pub use error::{RaglineError, Result};
