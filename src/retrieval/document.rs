//! Documents, retrieval hits and assembled context

use crate::embedding::VectorId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A unit of corpus text and the identity it was given at build time
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: VectorId,
    pub content: String,
}

/// A document returned by a search, with its squared Euclidean distance
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievedDocument {
    pub id: VectorId,
    pub distance: f32,
    pub content: String,
}

/// Retrieved documents joined in result order, ready for a generator
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Context {
    /// Hits, closest first
    pub documents: Vec<RetrievedDocument>,
    /// Contents of `documents` joined by the separator, in the same order
    pub text: String,
}

impl Context {
    pub fn new(documents: Vec<RetrievedDocument>, separator: &str) -> Self {
        let text = documents
            .iter()
            .map(|d| d.content.as_str())
            .collect::<Vec<_>>()
            .join(separator);

        Self { documents, text }
    }

    pub fn ids(&self) -> Vec<VectorId> {
        self.documents.iter().map(|d| d.id).collect()
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Generated answer plus everything that went into it
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    pub prompt: String,
    pub context: Context,
}
