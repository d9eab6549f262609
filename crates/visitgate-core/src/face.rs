//! Face descriptor matching by Euclidean distance.
//!
//! Descriptors are fixed-length embeddings (128 values from the browser
//! face model). A candidate is accepted when its distance to the probe does
//! not exceed the configured threshold.

use crate::types::{MatchResult, Matcher, Outcome, VerificationMethod, VisitorRecord};

/// Default maximum Euclidean distance for a positive face match.
pub const DEFAULT_FACE_THRESHOLD: f32 = 0.6;

/// Euclidean distance between two descriptors.
///
/// Descriptors of different lengths cannot be compared and yield
/// `f32::INFINITY`, so they never match.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return f32::INFINITY;
    }
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Map an accepted distance onto [0, 1]: 0 at the threshold, 1 at distance 0.
///
/// This is a display heuristic, not a calibrated probability.
pub fn distance_confidence(distance: f32, threshold: f32) -> f32 {
    if threshold <= 0.0 {
        return if distance <= 0.0 { 1.0 } else { 0.0 };
    }
    (1.0 - distance / threshold).clamp(0.0, 1.0)
}

/// Nearest-neighbour face matcher over a linear scan of the pool.
#[derive(Debug, Clone, Copy)]
pub struct FaceMatcher {
    pub threshold: f32,
}

impl Default for FaceMatcher {
    fn default() -> Self {
        Self { threshold: DEFAULT_FACE_THRESHOLD }
    }
}

impl Matcher for FaceMatcher {
    type Probe = [f32];

    fn compare<'a>(&self, probe: &[f32], candidates: &'a [VisitorRecord]) -> MatchResult<'a> {
        let method = VerificationMethod::Face;
        if probe.is_empty() {
            return MatchResult::unmatched(method, Outcome::InputMissing);
        }

        let mut best_distance = f32::INFINITY;
        let mut best: Option<&'a VisitorRecord> = None;
        let mut scored = 0usize;

        for candidate in candidates.iter().filter(|c| c.has_face()) {
            scored += 1;
            let distance = euclidean_distance(probe, &candidate.face_descriptor);
            if distance.is_infinite() {
                tracing::debug!(
                    visitor = %candidate.id,
                    probe_len = probe.len(),
                    candidate_len = candidate.face_descriptor.len(),
                    "face descriptor length mismatch; skipping"
                );
            }
            // Strict `<` keeps the first of equally close candidates.
            // NaN fails both comparisons and is never selected.
            if distance < best_distance && distance <= self.threshold {
                best_distance = distance;
                best = Some(candidate);
            }
        }

        if scored == 0 {
            return MatchResult::unmatched(method, Outcome::NoCandidatePool);
        }

        match best {
            Some(visitor) => {
                let confidence = distance_confidence(best_distance, self.threshold);
                tracing::debug!(
                    visitor = %visitor.id,
                    distance = best_distance,
                    confidence,
                    candidates = scored,
                    "face matched"
                );
                MatchResult::matched(method, visitor, confidence)
            }
            None => {
                tracing::debug!(candidates = scored, threshold = self.threshold, "face not recognized");
                MatchResult::unmatched(method, Outcome::BelowThreshold)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visitor(id: &str, descriptor: Vec<f32>) -> VisitorRecord {
        VisitorRecord {
            id: id.into(),
            face_descriptor: descriptor,
            ..Default::default()
        }
    }

    #[test]
    fn test_distance_identical() {
        assert_eq!(euclidean_distance(&[0.1, 0.2, 0.3], &[0.1, 0.2, 0.3]), 0.0);
    }

    #[test]
    fn test_distance_pythagorean() {
        assert!((euclidean_distance(&[0.0, 0.0], &[3.0, 4.0]) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_length_mismatch_is_infinite() {
        assert!(euclidean_distance(&[0.0, 0.0], &[0.0]).is_infinite());
    }

    #[test]
    fn test_confidence_range() {
        assert_eq!(distance_confidence(0.0, 0.6), 1.0);
        assert_eq!(distance_confidence(0.6, 0.6), 0.0);
        assert!((distance_confidence(0.3, 0.6) - 0.5).abs() < 1e-6);
        assert_eq!(distance_confidence(0.9, 0.6), 0.0);
    }

    #[test]
    fn test_perfect_match_full_confidence() {
        let pool = vec![
            visitor("a", vec![0.1, 0.2, 0.3]),
            visitor("b", vec![0.1, 0.2, 0.6]),
            visitor("c", vec![1.0, 0.2, 0.3]),
        ];
        let result = FaceMatcher::default().compare(&[0.1, 0.2, 0.3], &pool);
        assert!(result.accepted);
        assert_eq!(result.outcome, Outcome::Matched);
        assert_eq!(result.visitor.map(|v| v.id.as_str()), Some("a"));
        assert_eq!(result.confidence, 1.0);
    }

    #[test]
    fn test_best_match_is_last_entry() {
        let pool = vec![
            visitor("far", vec![0.5, 0.0]),
            visitor("near", vec![0.1, 0.0]),
        ];
        let result = FaceMatcher::default().compare(&[0.0, 0.0], &pool);
        assert_eq!(result.visitor.map(|v| v.id.as_str()), Some("near"));
    }

    #[test]
    fn test_threshold_boundary_inclusive() {
        let pool = vec![visitor("edge", vec![0.6])];
        let result = FaceMatcher::default().compare(&[0.0], &pool);
        assert!(result.accepted);
        assert_eq!(result.confidence, 0.0);
    }

    #[test]
    fn test_just_past_threshold_rejected() {
        let pool = vec![visitor("outside", vec![0.60001])];
        let result = FaceMatcher::default().compare(&[0.0], &pool);
        assert!(!result.accepted);
        assert_eq!(result.outcome, Outcome::BelowThreshold);
        assert!(result.visitor.is_none());
        assert_eq!(result.message(), Some("Face not recognized"));
    }

    #[test]
    fn test_tie_first_wins() {
        let pool = vec![
            visitor("first", vec![0.2, 0.0]),
            visitor("second", vec![0.0, 0.2]),
        ];
        let result = FaceMatcher::default().compare(&[0.0, 0.0], &pool);
        assert_eq!(result.visitor.map(|v| v.id.as_str()), Some("first"));
    }

    #[test]
    fn test_length_mismatch_continues_scan() {
        let pool = vec![
            visitor("short", vec![0.0]),
            visitor("ok", vec![0.0, 0.1]),
        ];
        let result = FaceMatcher::default().compare(&[0.0, 0.0], &pool);
        assert_eq!(result.visitor.map(|v| v.id.as_str()), Some("ok"));
    }

    #[test]
    fn test_nan_never_matches() {
        let pool = vec![visitor("nan", vec![f32::NAN])];
        let result = FaceMatcher::default().compare(&[0.0], &pool);
        assert!(!result.accepted);
        assert_eq!(result.outcome, Outcome::BelowThreshold);
    }

    #[test]
    fn test_empty_pool_distinct_from_rejection() {
        let result = FaceMatcher::default().compare(&[0.0, 0.0], &[]);
        assert_eq!(result.outcome, Outcome::NoCandidatePool);
        assert_eq!(result.message(), Some("No registered visitors with face data"));

        // Candidates without a descriptor do not form a pool either.
        let pool = vec![visitor("blank", vec![])];
        let result = FaceMatcher::default().compare(&[0.0, 0.0], &pool);
        assert_eq!(result.outcome, Outcome::NoCandidatePool);
    }

    #[test]
    fn test_empty_probe_is_input_missing() {
        let pool = vec![visitor("a", vec![0.0])];
        let result = FaceMatcher::default().compare(&[], &pool);
        assert_eq!(result.outcome, Outcome::InputMissing);
    }

    #[test]
    fn test_custom_threshold() {
        let pool = vec![visitor("a", vec![0.5])];
        let strict = FaceMatcher { threshold: 0.4 };
        assert!(!strict.compare(&[0.0], &pool).accepted);
        let loose = FaceMatcher { threshold: 1.0 };
        let result = loose.compare(&[0.0], &pool);
        assert!(result.accepted);
        assert!((result.confidence - 0.5).abs() < 1e-6);
    }
}
