//! Request-scoped retrieval data model.
//!
//! Every value here lives for one request: candidates are created by dense
//! recall, scored by fusion, ranked, and dropped when the request completes.

pub mod candidate;
pub mod filter;
pub mod request;

pub use candidate::{Candidate, Document, Metadata, RankedChunk, ScoreSet};
pub use filter::{FilterValue, WhereFilter};
pub use request::RetrievalRequest;
