//! visitgate-core — Visitor identity verification engine.
//!
//! Matches a live probe (QR token, face descriptor or fingerprint sample)
//! against registered visitors and decides whether the best candidate is
//! confident enough to accept.

pub mod contract;
pub mod engine;
pub mod face;
pub mod fingerprint;
pub mod qr;
pub mod types;

pub use contract::{VerifyRequest, VerifyResponse, VisitorSummary};
pub use engine::{Probe, Thresholds, Verifier};
pub use face::{euclidean_distance, FaceMatcher};
pub use fingerprint::{template_score, FingerprintMatcher, FingerprintSample};
pub use qr::verify_by_qr;
pub use types::{
    MatchResult, Matcher, Outcome, TemplateValue, VerificationMethod, VisitorRecord, VisitorStatus,
};
