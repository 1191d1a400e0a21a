//! Inbound retrieval request.

use serde::{Deserialize, Serialize};

use crate::error::RetrievalError;
use crate::model::WhereFilter;

/// One retrieval call as issued by the answer-generation layer.
///
/// `dense_candidates` and `alpha` override the configured defaults for this
/// request only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalRequest {
    pub query: String,
    /// Number of ranked chunks to return.
    pub k: usize,
    #[serde(default, rename = "where", skip_serializing_if = "Option::is_none")]
    pub filter: Option<WhereFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dense_candidates: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alpha: Option<f64>,
}

impl RetrievalRequest {
    #[must_use]
    pub fn new(query: impl Into<String>, k: usize) -> Self {
        Self {
            query: query.into(),
            k,
            filter: None,
            dense_candidates: None,
            alpha: None,
        }
    }

    /// Attach a filter. An empty filter is stored as no filter.
    #[must_use]
    pub fn with_filter(mut self, filter: Option<WhereFilter>) -> Self {
        self.filter = filter.filter(|f| !f.is_empty());
        self
    }

    #[must_use]
    pub const fn with_dense_candidates(mut self, n: usize) -> Self {
        self.dense_candidates = Some(n);
        self
    }

    #[must_use]
    pub const fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = Some(alpha);
        self
    }

    /// Check the request before any network call is made.
    ///
    /// # Errors
    ///
    /// Returns [`RetrievalError::InvalidRequest`] for a blank query, `k == 0`,
    /// or an alpha override outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), RetrievalError> {
        if self.query.trim().is_empty() {
            return Err(RetrievalError::InvalidRequest(
                "query must not be empty".into(),
            ));
        }
        if self.k == 0 {
            return Err(RetrievalError::InvalidRequest("k must be at least 1".into()));
        }
        if let Some(alpha) = self.alpha {
            validate_alpha(alpha)?;
        }
        Ok(())
    }
}

/// Fusion weight must be a finite value in `[0, 1]`.
///
/// # Errors
///
/// Returns [`RetrievalError::InvalidRequest`] otherwise.
pub fn validate_alpha(alpha: f64) -> Result<(), RetrievalError> {
    if alpha.is_finite() && (0.0..=1.0).contains(&alpha) {
        Ok(())
    } else {
        Err(RetrievalError::InvalidRequest(format!(
            "alpha must be within [0, 1], got {alpha}"
        )))
    }
}
