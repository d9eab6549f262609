//! Request and response shapes exchanged with clients of the daemon.

use crate::engine::Probe;
use crate::fingerprint::FingerprintSample;
use crate::types::{MatchResult, TemplateValue, VerificationMethod, VisitorRecord, VisitorStatus};
use serde::{Deserialize, Serialize};

/// A verification (or entry/exit) request as sent by a client.
///
/// Any combination of fields may be present; [`VerifyRequest::probe`]
/// decides which one is used.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub face_descriptor: Vec<f32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub thumbprint_template: Vec<TemplateValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbprint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<VerificationMethod>,
}

impl VerifyRequest {
    /// Build the probe for this request.
    ///
    /// An explicit `method` selects the probe kind directly, even when its
    /// field is empty (the engine then reports the input as missing).
    /// Otherwise a QR code wins over a face descriptor, which wins over
    /// fingerprint data. Returns `None` when nothing usable was supplied.
    pub fn probe(&self) -> Option<Probe> {
        let qr = self.qr_code.as_deref().unwrap_or_default();
        let image = self.thumbprint.as_deref().unwrap_or_default();
        let fingerprint = || {
            Probe::Fingerprint(FingerprintSample {
                template: self.thumbprint_template.clone(),
                image: image.to_string(),
            })
        };

        match self.method {
            Some(VerificationMethod::Qr) => Some(Probe::Qr(qr.to_string())),
            Some(VerificationMethod::Face) => Some(Probe::Face(self.face_descriptor.clone())),
            Some(VerificationMethod::Fingerprint) => Some(fingerprint()),
            None if !qr.is_empty() => Some(Probe::Qr(qr.to_string())),
            None if !self.face_descriptor.is_empty() => Some(Probe::Face(self.face_descriptor.clone())),
            None if !self.thumbprint_template.is_empty() || !image.is_empty() => Some(fingerprint()),
            None => None,
        }
    }
}

/// The subset of a visitor record returned to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorSummary {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub email: String,
    pub purpose: String,
    pub person_to_meet: String,
    pub status: VisitorStatus,
    pub photo: String,
}

impl From<&VisitorRecord> for VisitorSummary {
    fn from(v: &VisitorRecord) -> Self {
        Self {
            id: v.id.clone(),
            name: v.name.clone(),
            phone: v.phone.clone(),
            email: v.email.clone(),
            purpose: v.purpose.clone(),
            person_to_meet: v.person_to_meet.clone(),
            status: v.status,
            photo: v.photo.clone(),
        }
    }
}

/// Verification response sent back to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub verified: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_method: Option<VerificationMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visitor: Option<VisitorSummary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_inside: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerifyResponse {
    /// Response for a request that carried no verification data at all.
    pub fn input_missing() -> Self {
        Self {
            verified: false,
            verification_method: None,
            match_confidence: None,
            visitor: None,
            is_inside: None,
            message: Some("No verification data provided".to_string()),
        }
    }

    /// Build a response from an engine result and the matched visitor's
    /// inside/outside state.
    pub fn from_result(result: &MatchResult<'_>, is_inside: bool) -> Self {
        match result.visitor.filter(|_| result.accepted) {
            Some(visitor) => Self {
                verified: true,
                verification_method: Some(result.method),
                match_confidence: Some(result.confidence),
                visitor: Some(VisitorSummary::from(visitor)),
                is_inside: Some(is_inside),
                message: None,
            },
            None => Self {
                verified: false,
                verification_method: Some(result.method),
                match_confidence: None,
                visitor: None,
                is_inside: None,
                message: result.message().map(String::from),
            },
        }
    }
}
