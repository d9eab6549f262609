use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a registered visitor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VisitorStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
    CheckedIn,
    CheckedOut,
}

impl VisitorStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::CheckedIn => "checked-in",
            Self::CheckedOut => "checked-out",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "checked-in" => Some(Self::CheckedIn),
            "checked-out" => Some(Self::CheckedOut),
            _ => None,
        }
    }
}

impl fmt::Display for VisitorStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a visitor was identified.
///
/// Serialized as `"qr"`, `"face"` and `"thumbprint"` to stay wire-compatible
/// with existing clients; `"fingerprint"` is accepted as an alias.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VerificationMethod {
    #[serde(rename = "qr")]
    Qr,
    #[serde(rename = "face")]
    Face,
    #[serde(rename = "thumbprint", alias = "fingerprint")]
    Fingerprint,
}

impl VerificationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Face => "face",
            Self::Fingerprint => "thumbprint",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qr" => Some(Self::Qr),
            "face" => Some(Self::Face),
            "thumbprint" | "fingerprint" => Some(Self::Fingerprint),
            _ => None,
        }
    }
}

impl fmt::Display for VerificationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One quantized position of a fingerprint template.
///
/// Integers and floats compare numerically, so `1` equals `1.0`.
/// Values of different kinds otherwise never compare equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TemplateValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl PartialEq for TemplateValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a == b,
            (Self::Int(a), Self::Float(b)) | (Self::Float(b), Self::Int(a)) => *a as f64 == *b,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Text(a), Self::Text(b)) => a == b,
            _ => false,
        }
    }
}

impl From<i64> for TemplateValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f64> for TemplateValue {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

/// A registered visitor as supplied by the visitor store.
///
/// The engine only reads these records; approval, entry and exit are
/// mutated elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub purpose: String,
    #[serde(default)]
    pub department: String,
    #[serde(default)]
    pub person_to_meet: String,
    /// Absent until registration completes.
    #[serde(default, rename = "qrCode")]
    pub qr_token: Option<String>,
    #[serde(default)]
    pub photo: String,
    /// Empty when no face was captured.
    #[serde(default)]
    pub face_descriptor: Vec<f32>,
    #[serde(default, rename = "thumbprintTemplate")]
    pub fingerprint_template: Vec<TemplateValue>,
    /// Base64 image (or a hash of it); empty when not captured.
    #[serde(default, rename = "thumbprint")]
    pub fingerprint_image: String,
    #[serde(default)]
    pub status: VisitorStatus,
    /// Set by the most recent entry.
    #[serde(default)]
    pub check_in_time: Option<DateTime<Utc>>,
    /// Set by the most recent exit.
    #[serde(default)]
    pub check_out_time: Option<DateTime<Utc>>,
    /// True while an entry log without an exit time references this visitor.
    #[serde(default)]
    pub currently_inside: bool,
}

impl VisitorRecord {
    pub fn has_face(&self) -> bool {
        !self.face_descriptor.is_empty()
    }

    pub fn has_fingerprint(&self) -> bool {
        !self.fingerprint_template.is_empty() || !self.fingerprint_image.is_empty()
    }
}

/// Why a verification call ended the way it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Matched,
    /// The probe carried no data for the selected method. No scan was run.
    InputMissing,
    /// No candidate carried data for the selected method. No scoring was run.
    NoCandidatePool,
    /// Candidates were scored but none cleared the acceptance threshold.
    BelowThreshold,
    /// No candidate holds the presented QR token.
    NotFound,
}

/// Result of verifying a probe against a candidate pool.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult<'a> {
    pub visitor: Option<&'a VisitorRecord>,
    pub method: VerificationMethod,
    /// Normalized to [0, 1]; 0 for unmatched results.
    pub confidence: f32,
    pub accepted: bool,
    pub outcome: Outcome,
}

impl<'a> MatchResult<'a> {
    pub fn matched(method: VerificationMethod, visitor: &'a VisitorRecord, confidence: f32) -> Self {
        Self {
            visitor: Some(visitor),
            method,
            confidence,
            accepted: true,
            outcome: Outcome::Matched,
        }
    }

    pub fn unmatched(method: VerificationMethod, outcome: Outcome) -> Self {
        Self {
            visitor: None,
            method,
            confidence: 0.0,
            accepted: false,
            outcome,
        }
    }

    /// User-facing message for an unmatched result.
    pub fn message(&self) -> Option<&'static str> {
        use VerificationMethod::*;
        match (self.outcome, self.method) {
            (Outcome::Matched, _) => None,
            (Outcome::InputMissing, Face) => Some("No face descriptor provided"),
            (Outcome::InputMissing, Fingerprint) => Some("No thumbprint data provided"),
            (Outcome::InputMissing, Qr) => Some("No verification data provided"),
            (Outcome::NoCandidatePool, Face) => Some("No registered visitors with face data"),
            (Outcome::NoCandidatePool, Fingerprint) => {
                Some("No registered visitors with thumbprint data")
            }
            (Outcome::BelowThreshold, Face) => Some("Face not recognized"),
            (Outcome::BelowThreshold, Fingerprint) => Some("Thumbprint not recognized"),
            (Outcome::NoCandidatePool, Qr)
            | (Outcome::BelowThreshold, Qr)
            | (Outcome::NotFound, _) => Some("Visitor not found"),
        }
    }
}

/// Strategy for comparing a probe against a pool of registered visitors.
pub trait Matcher {
    type Probe: ?Sized;

    fn compare<'a>(&self, probe: &Self::Probe, candidates: &'a [VisitorRecord]) -> MatchResult<'a>;
}
