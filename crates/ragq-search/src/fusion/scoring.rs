//! Linear fusion of normalised dense and lexical scores.
//!
//! ```text
//! dense_raw  = 1 / (1 + max(distance, 0))
//! dense_norm = min_max(dense_raw)
//! bm25_norm  = normalize_bm25(bm25_raw)
//! hybrid     = alpha * dense_norm + (1 - alpha) * bm25_norm
//! ```
//!
//! Ranking is a stable descending sort on `hybrid`, so equal scores keep the
//! dense-recall order.

use ragq_core::model::{Candidate, RankedChunk, ScoreSet};

use super::normalize::{distance_to_score, min_max, normalize_bm25};

/// Dense weight used when neither settings nor the request override it.
pub const DEFAULT_ALPHA: f64 = 0.7;

/// Attach a [`ScoreSet`] to every candidate, keeping input order.
///
/// `bm25_raw` must be aligned with `candidates`; a short slice is padded with
/// zeros.
#[must_use]
pub fn fuse(candidates: Vec<Candidate>, bm25_raw: &[f64], alpha: f64) -> Vec<(Candidate, ScoreSet)> {
    let alpha = alpha.clamp(0.0, 1.0);
    let dense_raw: Vec<f64> = candidates
        .iter()
        .map(|c| distance_to_score(c.distance))
        .collect();
    let mut lexical_raw: Vec<f64> = bm25_raw.iter().copied().take(candidates.len()).collect();
    lexical_raw.resize(candidates.len(), 0.0);

    let dense_norm = min_max(&dense_raw);
    let bm25_norm = normalize_bm25(&lexical_raw);

    candidates
        .into_iter()
        .enumerate()
        .map(|(i, candidate)| {
            let scores = ScoreSet {
                dense_raw: dense_raw[i],
                dense_norm: dense_norm[i],
                bm25_raw: lexical_raw[i],
                bm25_norm: bm25_norm[i],
                hybrid: alpha.mul_add(dense_norm[i], (1.0 - alpha) * bm25_norm[i]),
            };
            (candidate, scores)
        })
        .collect()
}

/// Sort by hybrid score (stable, descending), keep the first `k`, assign ranks from 1.
#[must_use]
pub fn rank_top_k(mut fused: Vec<(Candidate, ScoreSet)>, k: usize) -> Vec<RankedChunk> {
    fused.sort_by(|a, b| b.1.hybrid.total_cmp(&a.1.hybrid));
    fused
        .into_iter()
        .take(k)
        .enumerate()
        .map(|(i, (candidate, scores))| RankedChunk {
            rank: i + 1,
            candidate,
            scores,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn cand(id: &str, distance: f64) -> Candidate {
        Candidate {
            chunk_id: id.to_string(),
            text: String::new(),
            metadata: ragq_core::model::Metadata::new(),
            distance,
        }
    }

    fn ids(ranked: &[RankedChunk]) -> Vec<&str> {
        ranked.iter().map(|r| r.candidate.chunk_id.as_str()).collect()
    }

    #[test]
    fn empty_input_fuses_to_empty() {
        assert!(fuse(Vec::new(), &[], DEFAULT_ALPHA).is_empty());
        assert!(rank_top_k(Vec::new(), 5).is_empty());
    }

    #[test]
    fn alpha_one_follows_dense_order() {
        let candidates = vec![cand("far", 0.9), cand("near", 0.1), cand("mid", 0.5)];
        let bm25 = [10.0, 0.0, 5.0];
        let ranked = rank_top_k(fuse(candidates, &bm25, 1.0), 3);
        assert_eq!(ids(&ranked), vec!["near", "mid", "far"]);
    }

    #[test]
    fn alpha_zero_follows_lexical_order() {
        let candidates = vec![cand("far", 0.9), cand("near", 0.1), cand("mid", 0.5)];
        let bm25 = [10.0, 0.0, 5.0];
        let ranked = rank_top_k(fuse(candidates, &bm25, 0.0), 3);
        assert_eq!(ids(&ranked), vec!["far", "mid", "near"]);
    }

    #[test]
    fn hybrid_is_the_weighted_sum() {
        let fused = fuse(vec![cand("a", 0.0), cand("b", 1.0)], &[0.0, 4.0], 0.7);
        let (_, a) = &fused[0];
        let (_, b) = &fused[1];
        assert!((a.dense_raw - 1.0).abs() < 1e-12);
        assert!((b.dense_raw - 0.5).abs() < 1e-12);
        assert!((a.hybrid - 0.7).abs() < 1e-12);
        assert!((b.hybrid - 0.3).abs() < 1e-12);
    }

    #[test]
    fn no_lexical_signal_leaves_dense_only() {
        let fused = fuse(vec![cand("a", 0.2), cand("b", 0.4)], &[0.0, 0.0], 0.7);
        assert!(fused.iter().all(|(_, s)| s.bm25_norm.abs() < f64::EPSILON));
        assert!((fused[0].1.hybrid - 0.7).abs() < 1e-12);
        assert!(fused[1].1.hybrid.abs() < 1e-12);
    }

    #[test]
    fn ties_keep_dense_recall_order() {
        let candidates = vec![cand("first", 0.3), cand("second", 0.3), cand("third", 0.3)];
        let ranked = rank_top_k(fuse(candidates, &[1.0, 1.0, 1.0], 0.5), 3);
        assert_eq!(ids(&ranked), vec!["first", "second", "third"]);
    }

    #[test]
    fn truncation_assigns_ranks_from_one() {
        let candidates = (0..10).map(|i| cand(&format!("c{i}"), f64::from(i))).collect();
        let ranked = rank_top_k(fuse(candidates, &[0.0; 10], 1.0), 4);
        assert_eq!(ranked.len(), 4);
        assert_eq!(
            ranked.iter().map(|r| r.rank).collect::<Vec<_>>(),
            vec![1, 2, 3, 4]
        );
    }

    #[test]
    fn short_bm25_slice_is_padded() {
        let fused = fuse(vec![cand("a", 0.1), cand("b", 0.2)], &[3.0], 0.5);
        assert!(fused[1].1.bm25_raw.abs() < f64::EPSILON);
    }

    proptest! {
        #[test]
        fn fusion_is_deterministic_and_sorted(
            distances in proptest::collection::vec(0.0f64..4.0, 0..40),
            alpha in 0.0f64..=1.0,
        ) {
            let bm25: Vec<f64> = distances.iter().map(|d| (d * 7.0) % 3.0).collect();
            let build = || distances.iter().enumerate()
                .map(|(i, d)| cand(&i.to_string(), *d))
                .collect::<Vec<_>>();

            let first = rank_top_k(fuse(build(), &bm25, alpha), distances.len());
            let second = rank_top_k(fuse(build(), &bm25, alpha), distances.len());
            prop_assert_eq!(&first, &second);

            for pair in first.windows(2) {
                prop_assert!(pair[0].scores.hybrid >= pair[1].scores.hybrid);
            }
            for chunk in &first {
                prop_assert!((0.0..=1.0 + 1e-12).contains(&chunk.scores.hybrid));
            }
        }
    }
}
