//! Fingerprint matching by positional template agreement.

use crate::types::{MatchResult, Matcher, Outcome, TemplateValue, VerificationMethod, VisitorRecord};
use serde::{Deserialize, Serialize};

/// Default minimum similarity score for a positive fingerprint match.
pub const DEFAULT_FINGERPRINT_THRESHOLD: f32 = 0.7;

/// A live fingerprint capture: a quantized template, a raw image, or both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FingerprintSample {
    #[serde(default)]
    pub template: Vec<TemplateValue>,
    #[serde(default)]
    pub image: String,
}

impl FingerprintSample {
    pub fn is_empty(&self) -> bool {
        self.template.is_empty() && self.image.is_empty()
    }
}

/// Fraction of positions at which both templates hold equal values.
///
/// The denominator is the longer length, so positions past the end of the
/// shorter template count as disagreements.
pub fn template_score(probe: &[TemplateValue], stored: &[TemplateValue]) -> f32 {
    let len = probe.len().max(stored.len());
    if len == 0 {
        return 0.0;
    }
    let agree = probe.iter().zip(stored.iter()).filter(|(a, b)| a == b).count();
    agree as f32 / len as f32
}

/// Similarity of a sample to a stored visitor in [0, 1].
///
/// Templates are preferred when both sides have one. Otherwise the images
/// must be byte-identical, which in practice only holds for a replayed
/// capture.
pub fn sample_score(sample: &FingerprintSample, visitor: &VisitorRecord) -> f32 {
    if !sample.template.is_empty() && !visitor.fingerprint_template.is_empty() {
        template_score(&sample.template, &visitor.fingerprint_template)
    } else if !sample.image.is_empty() && sample.image == visitor.fingerprint_image {
        1.0
    } else {
        0.0
    }
}

/// Best-score fingerprint matcher over a linear scan of the pool.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintMatcher {
    pub threshold: f32,
}

impl Default for FingerprintMatcher {
    fn default() -> Self {
        Self { threshold: DEFAULT_FINGERPRINT_THRESHOLD }
    }
}

impl Matcher for FingerprintMatcher {
    type Probe = FingerprintSample;

    fn compare<'a>(&self, probe: &FingerprintSample, candidates: &'a [VisitorRecord]) -> MatchResult<'a> {
        let method = VerificationMethod::Fingerprint;
        if probe.is_empty() {
            return MatchResult::unmatched(method, Outcome::InputMissing);
        }

        let mut best_score = 0.0f32;
        let mut best: Option<&'a VisitorRecord> = None;
        let mut scored = 0usize;

        for candidate in candidates.iter().filter(|c| c.has_fingerprint()) {
            scored += 1;
            let score = sample_score(probe, candidate);
            // Strict `>` keeps the first of equally scored candidates.
            if score > best_score && score >= self.threshold {
                best_score = score;
                best = Some(candidate);
            }
        }

        if scored == 0 {
            return MatchResult::unmatched(method, Outcome::NoCandidatePool);
        }

        match best {
            Some(visitor) => {
                tracing::debug!(
                    visitor = %visitor.id,
                    score = best_score,
                    candidates = scored,
                    "thumbprint matched"
                );
                MatchResult::matched(method, visitor, best_score)
            }
            None => {
                tracing::debug!(candidates = scored, threshold = self.threshold, "thumbprint not recognized");
                MatchResult::unmatched(method, Outcome::BelowThreshold)
            }
        }
    }
}
