//! Verification engine: dispatches a probe to the matching strategy for its
//! method and scans the supplied candidate pool.
//!
//! The engine holds no mutable state and performs no I/O. Each call is a
//! pure function of the probe, the pool and the configured thresholds.

use crate::face::{FaceMatcher, DEFAULT_FACE_THRESHOLD};
use crate::fingerprint::{FingerprintMatcher, FingerprintSample, DEFAULT_FINGERPRINT_THRESHOLD};
use crate::qr::verify_by_qr;
use crate::types::{MatchResult, Matcher, Outcome, TemplateValue, VerificationMethod, VisitorRecord};
use serde::{Deserialize, Serialize};

/// Per-method acceptance thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Maximum Euclidean distance for a face match.
    pub face: f32,
    /// Minimum similarity score for a fingerprint match.
    pub fingerprint: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            face: DEFAULT_FACE_THRESHOLD,
            fingerprint: DEFAULT_FINGERPRINT_THRESHOLD,
        }
    }
}

/// A live sample submitted for verification.
#[derive(Debug, Clone, PartialEq)]
pub enum Probe {
    Qr(String),
    Face(Vec<f32>),
    Fingerprint(FingerprintSample),
}

impl Probe {
    pub fn method(&self) -> VerificationMethod {
        match self {
            Probe::Qr(_) => VerificationMethod::Qr,
            Probe::Face(_) => VerificationMethod::Face,
            Probe::Fingerprint(_) => VerificationMethod::Fingerprint,
        }
    }

    pub fn fingerprint(template: Vec<TemplateValue>, image: impl Into<String>) -> Self {
        Probe::Fingerprint(FingerprintSample { template, image: image.into() })
    }
}

/// Verification engine configured with acceptance thresholds.
#[derive(Debug, Clone, Copy, Default)]
pub struct Verifier {
    face: FaceMatcher,
    fingerprint: FingerprintMatcher,
}

impl Verifier {
    pub fn new(thresholds: Thresholds) -> Self {
        Self {
            face: FaceMatcher { threshold: thresholds.face },
            fingerprint: FingerprintMatcher { threshold: thresholds.fingerprint },
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            face: self.face.threshold,
            fingerprint: self.fingerprint.threshold,
        }
    }

    /// Exact QR token lookup; see [`verify_by_qr`].
    pub fn verify_by_qr<'a>(&self, token: &str, candidates: &'a [VisitorRecord]) -> Option<&'a VisitorRecord> {
        verify_by_qr(token, candidates)
    }

    pub fn verify_by_face<'a>(&self, descriptor: &[f32], candidates: &'a [VisitorRecord]) -> MatchResult<'a> {
        self.face.compare(descriptor, candidates)
    }

    pub fn verify_by_fingerprint<'a>(
        &self,
        sample: &FingerprintSample,
        candidates: &'a [VisitorRecord],
    ) -> MatchResult<'a> {
        self.fingerprint.compare(sample, candidates)
    }

    /// Verify a probe against the pool supplied for its method.
    pub fn verify<'a>(&self, probe: &Probe, candidates: &'a [VisitorRecord]) -> MatchResult<'a> {
        let result = match probe {
            Probe::Qr(token) if token.is_empty() => {
                MatchResult::unmatched(VerificationMethod::Qr, Outcome::InputMissing)
            }
            Probe::Qr(token) => match verify_by_qr(token, candidates) {
                Some(visitor) => MatchResult::matched(VerificationMethod::Qr, visitor, 1.0),
                None => MatchResult::unmatched(VerificationMethod::Qr, Outcome::NotFound),
            },
            Probe::Face(descriptor) => self.verify_by_face(descriptor, candidates),
            Probe::Fingerprint(sample) => self.verify_by_fingerprint(sample, candidates),
        };

        tracing::debug!(
            method = %result.method,
            accepted = result.accepted,
            outcome = ?result.outcome,
            confidence = result.confidence,
            pool = candidates.len(),
            "verification finished"
        );
        result
    }
}
