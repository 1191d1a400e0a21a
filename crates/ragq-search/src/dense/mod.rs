//! Dense recall: embed the query, then ask the vector store for neighbours.
//!
//! The two outbound collaborators sit behind traits so the retriever can run
//! against the HTTP clients in [`openai`] and [`chroma`] or against
//! in-memory doubles in tests.

pub mod chroma;
pub mod client;
pub mod http;
pub mod openai;

use std::time::Duration;

use ragq_core::RetrievalError;
use ragq_core::model::{Candidate, Metadata, WhereFilter};
use serde::{Deserialize, Serialize};

pub use chroma::ChromaStore;
pub use client::DenseSearchClient;
pub use openai::OpenAiEmbedder;

/// Turns query text into an embedding vector.
pub trait Embedder: Send + Sync {
    /// Embed `text`. `timeout` bounds the single underlying call.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Upstream`] when the service fails.
    fn embed(&self, text: &str, timeout: Duration) -> Result<Vec<f32>, RetrievalError>;
}

/// Nearest-neighbour search over stored chunks.
pub trait VectorStore: Send + Sync {
    /// Up to `n_results` records ordered by ascending distance, restricted
    /// to records whose metadata matches `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::Upstream`] when the store fails.
    fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&WhereFilter>,
        timeout: Duration,
    ) -> Result<Vec<StoreRecord>, RetrievalError>;
}

/// One row as the store returned it. Any field may be missing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StoreRecord {
    pub text: Option<String>,
    pub metadata: Option<Metadata>,
    pub distance: Option<f64>,
}

impl StoreRecord {
    #[must_use]
    pub fn new(text: impl Into<String>, metadata: Metadata, distance: f64) -> Self {
        Self {
            text: Some(text.into()),
            metadata: Some(metadata),
            distance: Some(distance),
        }
    }

    #[must_use]
    pub fn into_candidate(self) -> Candidate {
        Candidate::from_parts(self.text, self.metadata, self.distance)
    }
}
