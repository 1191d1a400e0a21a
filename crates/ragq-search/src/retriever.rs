//! Hybrid retrieval: dense recall, local BM25 rerank, fusion, truncation.
//!
//! ```text
//! DENSE_RECALL -> LOCAL_RERANK -> FUSE_AND_SORT -> TRUNCATE -> DONE
//! ```
//!
//! Only `DENSE_RECALL` touches the network and only it can fail. A failure
//! there aborts the request without retry. Every later stage is total.

use std::fmt;
use std::time::Instant;

use ragq_core::config::RetrievalConfig;
use ragq_core::model::{Document, RankedChunk, RetrievalRequest, WhereFilter};
use ragq_core::{Deadline, RetrievalError};
use tracing::{debug, info, instrument};

use crate::dense::DenseSearchClient;
use crate::fusion::{fuse, rank_top_k};
use crate::lexical::{Bm25Params, score_local};

/// Separator between chunk texts in assembled prompt context.
pub const CONTEXT_SEPARATOR: &str = "\n\n---\n\n";

/// Pipeline stage, used to tag log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    DenseRecall,
    LocalRerank,
    FuseAndSort,
    Truncate,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::DenseRecall => "dense_recall",
            Self::LocalRerank => "local_rerank",
            Self::FuseAndSort => "fuse_and_sort",
            Self::Truncate => "truncate",
        })
    }
}

/// Defaults applied when a request does not override them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HybridParams {
    pub dense_candidates: usize,
    pub alpha: f64,
    pub bm25: Bm25Params,
}

impl Default for HybridParams {
    fn default() -> Self {
        Self::from(&RetrievalConfig::default())
    }
}

impl From<&RetrievalConfig> for HybridParams {
    fn from(config: &RetrievalConfig) -> Self {
        Self {
            dense_candidates: config.hybrid_candidates,
            alpha: config.hybrid_alpha,
            bm25: Bm25Params::new(config.bm25_k1, config.bm25_b),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HybridRetriever {
    dense: DenseSearchClient,
    params: HybridParams,
}

impl HybridRetriever {
    #[must_use]
    pub const fn new(dense: DenseSearchClient, params: HybridParams) -> Self {
        Self { dense, params }
    }

    #[must_use]
    pub const fn params(&self) -> &HybridParams {
        &self.params
    }

    /// Run the full pipeline for one request.
    ///
    /// Returns at most `request.k` chunks ranked 1..k by descending hybrid
    /// score. Zero candidates yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidRequest`] before any network call for
    /// a bad request, and propagates dense-recall failures.
    #[instrument(skip_all, fields(k = request.k, filtered = request.filter.is_some()))]
    pub fn retrieve(
        &self,
        request: &RetrievalRequest,
        deadline: &Deadline,
    ) -> Result<Vec<RankedChunk>, RetrievalError> {
        request.validate()?;
        let started = Instant::now();

        let n = request
            .dense_candidates
            .unwrap_or(self.params.dense_candidates)
            .max(request.k);
        let alpha = request.alpha.unwrap_or(self.params.alpha);

        let candidates = self
            .dense
            .search(&request.query, n, request.filter.as_ref(), deadline)?;
        debug!(stage = %Stage::DenseRecall, requested = n, candidates = candidates.len());

        if candidates.is_empty() {
            info!(
                query_chars = request.query.len(),
                candidates = 0,
                returned = 0,
                elapsed_ms = elapsed_ms(started),
                "hybrid retrieval found no candidates"
            );
            return Ok(Vec::new());
        }

        let texts: Vec<&str> = candidates.iter().map(|c| c.text.as_str()).collect();
        let bm25_raw = score_local(&request.query, &texts, &self.params.bm25);
        debug!(stage = %Stage::LocalRerank, scored = bm25_raw.len());

        let candidate_count = candidates.len();
        let fused = fuse(candidates, &bm25_raw, alpha);
        debug!(stage = %Stage::FuseAndSort, alpha, fused = fused.len());

        let ranked = rank_top_k(fused, request.k);
        debug!(stage = %Stage::Truncate, k = request.k, returned = ranked.len());

        info!(
            query_chars = request.query.len(),
            candidates = candidate_count,
            returned = ranked.len(),
            elapsed_ms = elapsed_ms(started),
            "hybrid retrieval complete"
        );
        Ok(ranked)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

/// Pluggable retrieval interface for prompt assembly.
pub trait Retriever: Send + Sync {
    /// Top documents for `query`, best first.
    ///
    /// # Errors
    ///
    /// Propagates request validation and dense-recall failures.
    fn relevant_documents(
        &self,
        query: &str,
        deadline: &Deadline,
    ) -> Result<Vec<Document>, RetrievalError>;
}

/// A [`HybridRetriever`] bound to a fixed `k` and filter.
#[derive(Debug, Clone)]
pub struct FilteredRetriever {
    hybrid: HybridRetriever,
    k: usize,
    filter: Option<WhereFilter>,
}

impl FilteredRetriever {
    #[must_use]
    pub fn new(hybrid: HybridRetriever, k: usize, filter: Option<WhereFilter>) -> Self {
        Self {
            hybrid,
            k,
            filter: filter.filter(|f| !f.is_empty()),
        }
    }

    #[must_use]
    pub const fn k(&self) -> usize {
        self.k
    }

    #[must_use]
    pub const fn filter(&self) -> Option<&WhereFilter> {
        self.filter.as_ref()
    }

    /// Ranked chunks for `query` under this retriever's `k` and filter.
    ///
    /// # Errors
    ///
    /// Same as [`HybridRetriever::retrieve`].
    pub fn ranked(
        &self,
        query: &str,
        deadline: &Deadline,
    ) -> Result<Vec<RankedChunk>, RetrievalError> {
        let request = RetrievalRequest::new(query, self.k).with_filter(self.filter.clone());
        self.hybrid.retrieve(&request, deadline)
    }
}

impl Retriever for FilteredRetriever {
    fn relevant_documents(
        &self,
        query: &str,
        deadline: &Deadline,
    ) -> Result<Vec<Document>, RetrievalError> {
        Ok(self
            .ranked(query, deadline)?
            .into_iter()
            .map(RankedChunk::into_document)
            .collect())
    }
}

/// Join the texts of the first `limit` documents into prompt context.
#[must_use]
pub fn format_context(docs: &[Document], limit: usize) -> String {
    docs.iter()
        .take(limit)
        .map(|d| d.text.as_str())
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}
