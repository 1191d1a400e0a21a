//! Per-signal normalisation into `[0, 1]`.
//!
//! Dense and lexical scores are normalised independently before fusion. The
//! two branches treat a flat input differently: a flat dense signal means
//! "all equally good" (1.0), while a BM25 signal with no positive score means
//! "no lexical evidence" (0.0).

/// Ranges and maxima below this are treated as zero.
pub const FLAT_EPSILON: f64 = 1e-12;

/// Min-max scale `values` into `[0, 1]`.
///
/// Empty input yields empty output. When `max - min < FLAT_EPSILON` every
/// value maps to 1.0.
#[must_use]
pub fn min_max(values: &[f64]) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let (lo, hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let range = hi - lo;
    if range < FLAT_EPSILON {
        return vec![1.0; values.len()];
    }

    values
        .iter()
        .map(|v| ((v - lo) / range).clamp(0.0, 1.0))
        .collect()
}

/// Normalise raw BM25 scores.
///
/// When the largest score is below [`FLAT_EPSILON`] there is no lexical
/// signal and every value maps to 0.0. Otherwise this is [`min_max`].
#[must_use]
pub fn normalize_bm25(raw: &[f64]) -> Vec<f64> {
    if raw.is_empty() {
        return Vec::new();
    }
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max < FLAT_EPSILON {
        return vec![0.0; raw.len()];
    }
    min_max(raw)
}

/// Map a store distance (smaller is closer) to a similarity in `(0, 1]`.
///
/// Negative distances are clamped to 0 and therefore map to 1.0.
#[must_use]
pub fn distance_to_score(distance: f64) -> f64 {
    1.0 / (1.0 + distance.max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn min_max_empty_is_empty() {
        assert!(min_max(&[]).is_empty());
        assert!(normalize_bm25(&[]).is_empty());
    }

    #[test]
    fn min_max_flat_is_all_ones() {
        assert_eq!(min_max(&[0.3, 0.3, 0.3]), vec![1.0, 1.0, 1.0]);
        assert_eq!(min_max(&[5.0]), vec![1.0]);
    }

    #[test]
    fn min_max_spans_unit_interval() {
        let out = min_max(&[2.0, 4.0, 3.0]);
        assert!((out[0] - 0.0).abs() < 1e-12);
        assert!((out[1] - 1.0).abs() < 1e-12);
        assert!((out[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn bm25_without_signal_is_all_zero() {
        assert_eq!(normalize_bm25(&[0.0, 0.0, 0.0]), vec![0.0, 0.0, 0.0]);
        assert_eq!(normalize_bm25(&[1e-13, 0.0]), vec![0.0, 0.0]);
    }

    #[test]
    fn bm25_with_flat_positive_signal_is_all_ones() {
        assert_eq!(normalize_bm25(&[0.8, 0.8]), vec![1.0, 1.0]);
    }

    #[test]
    fn bm25_with_signal_uses_min_max() {
        let out = normalize_bm25(&[0.0, 2.0, 1.0]);
        assert_eq!(out, vec![0.0, 1.0, 0.5]);
    }

    #[test]
    fn distance_to_score_reference_points() {
        assert!((distance_to_score(0.0) - 1.0).abs() < f64::EPSILON);
        assert!((distance_to_score(-3.0) - 1.0).abs() < f64::EPSILON);
        assert!((distance_to_score(1.0) - 0.5).abs() < f64::EPSILON);
        assert!(distance_to_score(999.0) < 0.01);
    }

    proptest! {
        #[test]
        fn min_max_stays_in_bounds(values in proptest::collection::vec(-1e6f64..1e6, 0..64)) {
            let out = min_max(&values);
            prop_assert_eq!(out.len(), values.len());
            for v in out {
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }

        #[test]
        fn min_max_preserves_strict_order(values in proptest::collection::vec(-1e3f64..1e3, 2..32)) {
            let out = min_max(&values);
            for i in 0..values.len() {
                for j in 0..values.len() {
                    if values[i] < values[j] && values[j] - values[i] > 1e-6 {
                        prop_assert!(out[i] < out[j]);
                    }
                }
            }
        }

        #[test]
        fn distance_score_is_strictly_decreasing(a in 0.0f64..1e4, delta in 1e-3f64..1e3) {
            prop_assert!(distance_to_score(a) > distance_to_score(a + delta));
        }

        #[test]
        fn bm25_normalised_stays_in_bounds(values in proptest::collection::vec(0.0f64..50.0, 0..64)) {
            for v in normalize_bm25(&values) {
                prop_assert!((0.0..=1.0).contains(&v));
            }
        }
    }
}
