//! Candidates, score sets, and ranked output rows.

use serde::{Deserialize, Serialize, Serializer};

/// Chunk metadata as stored alongside the vector (tenant/source tags, ids).
pub type Metadata = serde_json::Map<String, serde_json::Value>;

/// Number of characters kept in [`RankedChunk::preview`].
pub const PREVIEW_CHARS: usize = 250;

/// One chunk returned by dense recall.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Chunk identifier from the `chunk_id` metadata key; empty when absent.
    #[serde(default)]
    pub chunk_id: String,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: Metadata,
    /// Store distance, smaller is more similar. `0.0` when the store omitted it.
    #[serde(default)]
    pub distance: f64,
}

impl Candidate {
    /// Build a candidate from possibly partial store fields.
    ///
    /// Missing text, metadata, or distance fall back to an empty string, an
    /// empty map, and `0.0`.
    #[must_use]
    pub fn from_parts(text: Option<String>, metadata: Option<Metadata>, distance: Option<f64>) -> Self {
        let metadata = metadata.unwrap_or_default();
        let chunk_id = metadata
            .get("chunk_id")
            .map(|value| match value {
                serde_json::Value::String(s) => s.clone(),
                serde_json::Value::Null => String::new(),
                other => other.to_string(),
            })
            .unwrap_or_default();

        Self {
            chunk_id,
            text: text.unwrap_or_default(),
            metadata,
            distance: distance.unwrap_or(0.0),
        }
    }

    /// The `source` metadata tag, or an empty string.
    #[must_use]
    pub fn source(&self) -> &str {
        self.metadata
            .get("source")
            .and_then(serde_json::Value::as_str)
            .unwrap_or("")
    }
}

/// Scores attached to a candidate during fusion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreSet {
    pub dense_raw: f64,
    pub dense_norm: f64,
    pub bm25_raw: f64,
    pub bm25_norm: f64,
    pub hybrid: f64,
}

/// Final output unit: a candidate, its scores, and its 1-based rank.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedChunk {
    pub rank: usize,
    pub candidate: Candidate,
    pub scores: ScoreSet,
}

impl RankedChunk {
    #[must_use]
    pub fn source(&self) -> &str {
        self.candidate.source()
    }

    /// The first [`PREVIEW_CHARS`] characters of the chunk text.
    #[must_use]
    pub fn preview(&self) -> &str {
        let text = self.candidate.text.as_str();
        match text.char_indices().nth(PREVIEW_CHARS) {
            Some((idx, _)) => &text[..idx],
            None => text,
        }
    }

    /// Drop scores and rank, keeping what prompt assembly needs.
    #[must_use]
    pub fn into_document(self) -> Document {
        Document {
            text: self.candidate.text,
            metadata: self.candidate.metadata,
        }
    }
}

#[derive(Serialize)]
struct RankedChunkWire<'a> {
    rank: usize,
    chunk_id: &'a str,
    source: &'a str,
    preview: &'a str,
    text: &'a str,
    scores: ScoresWire,
    metadata: &'a Metadata,
}

#[derive(Serialize)]
struct ScoresWire {
    bm25_raw: f64,
    bm25_norm: f64,
    dense_raw: f64,
    dense_norm: f64,
    distance: f64,
    hybrid: f64,
}

impl Serialize for RankedChunk {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        RankedChunkWire {
            rank: self.rank,
            chunk_id: &self.candidate.chunk_id,
            source: self.source(),
            preview: self.preview(),
            text: &self.candidate.text,
            scores: ScoresWire {
                bm25_raw: self.scores.bm25_raw,
                bm25_norm: self.scores.bm25_norm,
                dense_raw: self.scores.dense_raw,
                dense_norm: self.scores.dense_norm,
                distance: self.candidate.distance,
                hybrid: self.scores.hybrid,
            },
            metadata: &self.candidate.metadata,
        }
        .serialize(serializer)
    }
}

/// A `(text, metadata)` pair handed to prompt-context assembly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub text: String,
    pub metadata: Metadata,
}
