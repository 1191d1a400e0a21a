#![forbid(unsafe_code)]
//! ragq-search library.
//!
//! Hybrid retrieval over a vector store: dense recall of `N` candidates,
//! BM25 rerank over exactly those candidates, min-max normalisation of both
//! signals, and an alpha-weighted linear fusion.
//!
//! # Conventions
//!
//! - **Errors**: library failures are [`ragq_core::RetrievalError`]; only
//!   dense recall can fail, everything after it is total.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).

pub mod context;
pub mod dense;
pub mod fusion;
pub mod lexical;
pub mod retriever;
pub mod tokenize;

pub use context::RetrievalContext;
pub use dense::{DenseSearchClient, Embedder, StoreRecord, VectorStore};
pub use retriever::{FilteredRetriever, HybridParams, HybridRetriever, Retriever, format_context};
