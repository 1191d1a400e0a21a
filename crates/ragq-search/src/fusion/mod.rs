//! Score normalisation and alpha-weighted fusion of dense and lexical signals.

pub mod normalize;
pub mod scoring;

pub use normalize::{FLAT_EPSILON, distance_to_score, min_max, normalize_bm25};
pub use scoring::{DEFAULT_ALPHA, fuse, rank_top_k};
