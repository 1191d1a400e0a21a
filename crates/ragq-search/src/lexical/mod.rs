//! Lexical scoring over the dense candidate set.

pub mod bm25;

pub use bm25::{Bm25Params, LocalCorpus, score_local};
