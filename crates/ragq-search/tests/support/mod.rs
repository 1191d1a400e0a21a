//! In-memory embedder and vector store for integration tests.
//!
//! Embeddings are letter-frequency vectors; distance is `1 - cosine`. The
//! store applies the equality filter itself, like a real store would.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use ragq_core::RetrievalError;
use ragq_core::model::{Metadata, WhereFilter};
use ragq_search::{Embedder, StoreRecord, VectorStore};
use serde_json::json;

const DIMS: usize = 26;

pub fn letter_embedding(text: &str) -> Vec<f32> {
    let mut v = vec![0.0f32; DIMS];
    for b in text.bytes() {
        if b.is_ascii_alphabetic() {
            v[usize::from(b.to_ascii_lowercase() - b'a')] += 1.0;
        }
    }
    v
}

fn cosine_distance(a: &[f32], b: &[f32]) -> f64 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 1.0;
    }
    1.0 - f64::from(dot / (na * nb))
}

pub struct LetterEmbedder;

impl Embedder for LetterEmbedder {
    fn embed(&self, text: &str, _timeout: Duration) -> Result<Vec<f32>, RetrievalError> {
        Ok(letter_embedding(text))
    }
}

pub struct DownEmbedder;

impl Embedder for DownEmbedder {
    fn embed(&self, _text: &str, _timeout: Duration) -> Result<Vec<f32>, RetrievalError> {
        Err(RetrievalError::embedding("503 service unavailable"))
    }
}

#[derive(Debug, Clone)]
pub struct Row {
    pub text: String,
    pub metadata: Metadata,
    pub embedding: Vec<f32>,
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Vec<Row>,
    queries: AtomicUsize,
    filters_seen: Mutex<Vec<Option<WhereFilter>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk. `chunk_id`, `tenant_id`, and `source` go into metadata.
    pub fn with_chunk(mut self, chunk_id: &str, tenant: &str, text: &str) -> Self {
        let metadata = json!({
            "chunk_id": chunk_id,
            "tenant_id": tenant,
            "source": format!("{tenant}/handbook.md"),
        });
        self.rows.push(Row {
            text: text.to_string(),
            metadata: metadata.as_object().cloned().unwrap_or_default(),
            embedding: letter_embedding(text),
        });
        self
    }

    pub fn queries(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }

    pub fn filters_seen(&self) -> Vec<Option<WhereFilter>> {
        self.filters_seen.lock().expect("filters lock").clone()
    }
}

impl VectorStore for MemoryStore {
    fn query(
        &self,
        embedding: &[f32],
        n_results: usize,
        filter: Option<&WhereFilter>,
        _timeout: Duration,
    ) -> Result<Vec<StoreRecord>, RetrievalError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.filters_seen
            .lock()
            .expect("filters lock")
            .push(filter.cloned());

        let mut hits: Vec<StoreRecord> = self
            .rows
            .iter()
            .filter(|row| filter.is_none_or(|f| f.matches(&row.metadata)))
            .map(|row| {
                StoreRecord::new(
                    row.text.clone(),
                    row.metadata.clone(),
                    cosine_distance(embedding, &row.embedding),
                )
            })
            .collect();
        hits.sort_by(|a, b| {
            a.distance
                .unwrap_or(0.0)
                .total_cmp(&b.distance.unwrap_or(0.0))
        });
        hits.truncate(n_results);
        Ok(hits)
    }
}

/// Twelve chunks split across two tenants.
pub fn two_tenant_store() -> MemoryStore {
    MemoryStore::new()
        .with_chunk("a-0", "acme", "Visa status transfer requires an H1B petition")
        .with_chunk("a-1", "acme", "Parental leave policy grants sixteen weeks")
        .with_chunk("a-2", "acme", "Expense reports are due within thirty days")
        .with_chunk("a-3", "acme", "Remote work stipend covers desk and chair")
        .with_chunk("a-4", "acme", "Visa sponsorship is reviewed by legal")
        .with_chunk("a-5", "acme", "Badge access is issued on the first day")
        .with_chunk("g-0", "globex", "Globex visa status policy for contractors")
        .with_chunk("g-1", "globex", "Globex parental leave is twelve weeks")
        .with_chunk("g-2", "globex", "Globex expense reports use the travel portal")
        .with_chunk("g-3", "globex", "Globex remote work requires manager approval")
        .with_chunk("g-4", "globex", "Globex visa questions go to the HR inbox")
        .with_chunk("g-5", "globex", "Globex badge photos are taken at reception")
}
