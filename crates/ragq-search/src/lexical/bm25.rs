//! BM25 Okapi over a request-local corpus.
//!
//! Statistics (document frequency, average length, IDF) come only from the
//! documents passed in, never from a global index: the corpus is whatever
//! dense recall returned for this query.
//!
//! ```text
//! idf(t)     = ln((N - df + 0.5) / (df + 0.5))
//! score(d,q) = sum over t in q of
//!              idf(t) * tf * (k1 + 1) / (tf + k1 * (1 - b + b * |d| / avgdl))
//! ```
//!
//! Negative IDF values (terms in more than half the documents) are replaced
//! by `epsilon * average_idf`. Every IDF and every final score is clamped at 0.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::tokenize::tokenize;

/// Okapi floor applied to negative IDF values.
pub const DEFAULT_EPSILON: f64 = 0.25;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bm25Params {
    /// Term-frequency saturation.
    pub k1: f64,
    /// Length normalisation strength in `[0, 1]`.
    pub b: f64,
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

impl Bm25Params {
    #[must_use]
    pub const fn new(k1: f64, b: f64) -> Self {
        Self {
            k1,
            b,
            epsilon: DEFAULT_EPSILON,
        }
    }
}

/// Term statistics for one ordered set of documents.
#[derive(Debug, Clone)]
pub struct LocalCorpus {
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avgdl: f64,
    idf: HashMap<String, f64>,
}

impl LocalCorpus {
    /// Tokenize `docs` and compute IDF with the negative-IDF floor applied.
    #[must_use]
    pub fn build<S: AsRef<str>>(docs: &[S], epsilon: f64) -> Self {
        let mut term_freqs = Vec::with_capacity(docs.len());
        let mut doc_lens = Vec::with_capacity(docs.len());
        let mut doc_freq: HashMap<String, u32> = HashMap::new();
        // Terms in first-seen order; IDF is summed in this order.
        let mut vocabulary: Vec<String> = Vec::new();

        for doc in docs {
            let tokens = tokenize(doc.as_ref());
            doc_lens.push(tokens.len());

            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in tokens {
                match freqs.entry(token) {
                    Entry::Occupied(mut seen) => *seen.get_mut() += 1,
                    Entry::Vacant(slot) => {
                        match doc_freq.entry(slot.key().clone()) {
                            Entry::Occupied(mut df) => *df.get_mut() += 1,
                            Entry::Vacant(df) => {
                                vocabulary.push(df.key().clone());
                                df.insert(1);
                            }
                        }
                        slot.insert(1);
                    }
                }
            }
            term_freqs.push(freqs);
        }

        let n = docs.len() as f64;
        let total_len: usize = doc_lens.iter().sum();
        let avgdl = if docs.is_empty() {
            0.0
        } else {
            total_len as f64 / n
        };

        let mut idf: HashMap<String, f64> = HashMap::with_capacity(doc_freq.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for term in vocabulary {
            let df = f64::from(doc_freq.get(&term).copied().unwrap_or(0));
            let value = ((n - df + 0.5) / (df + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }

        if !idf.is_empty() {
            let average_idf = idf_sum / idf.len() as f64;
            let floor = (epsilon * average_idf).max(0.0);
            for term in negative {
                idf.insert(term, floor);
            }
        }
        for value in idf.values_mut() {
            *value = value.max(0.0);
        }

        Self {
            term_freqs,
            doc_lens,
            avgdl,
            idf,
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.doc_lens.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.doc_lens.is_empty()
    }

    /// IDF of `term`, 0 when no document contains it.
    #[must_use]
    pub fn idf(&self, term: &str) -> f64 {
        self.idf.get(term).copied().unwrap_or(0.0)
    }

    /// One score per document, in document order.
    #[must_use]
    pub fn scores(&self, query: &str, params: &Bm25Params) -> Vec<f64> {
        let mut scores = vec![0.0; self.len()];
        if self.avgdl <= 0.0 {
            return scores;
        }

        for term in tokenize(query) {
            let Some(&idf) = self.idf.get(&term) else {
                continue;
            };
            for (doc, score) in scores.iter_mut().enumerate() {
                let tf = self.term_freqs[doc].get(&term).copied().unwrap_or(0);
                if tf == 0 {
                    continue;
                }
                let tf = f64::from(tf);
                let dl = self.doc_lens[doc] as f64;
                let norm = params.k1 * (1.0 - params.b + params.b * dl / self.avgdl);
                *score += idf * (tf * (params.k1 + 1.0)) / (tf + norm);
            }
        }

        for score in &mut scores {
            *score = score.max(0.0);
        }
        scores
    }
}

/// Score `docs` against `query` with statistics from `docs` alone.
#[must_use]
#[instrument(skip_all, fields(docs = docs.len()))]
pub fn score_local<S: AsRef<str>>(query: &str, docs: &[S], params: &Bm25Params) -> Vec<f64> {
    if docs.is_empty() {
        return Vec::new();
    }
    LocalCorpus::build(docs, params.epsilon).scores(query, params)
}
