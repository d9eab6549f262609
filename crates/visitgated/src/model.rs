use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use visitgate_core::{TemplateValue, VerificationMethod, VisitorStatus};

/// Registration form submitted by a visitor.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewVisitor {
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
    #[serde(default)]
    pub photo: String,
    #[serde(default)]
    pub face_descriptor: Vec<f32>,
    #[serde(default)]
    pub thumbprint_template: Vec<TemplateValue>,
    #[serde(default)]
    pub thumbprint: String,
}

/// Staff edit of a registered visitor. `None` and empty strings leave the
/// stored value alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisitorUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub purpose: Option<String>,
    pub department: Option<String>,
    pub person_to_meet: Option<String>,
    pub status: Option<VisitorStatus>,
}

/// Reason for a visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Purpose {
    Official,
    Personal,
    Interview,
    Meeting,
    Delivery,
    Other,
}

impl Purpose {
    pub const ALL: [Purpose; 6] = [
        Self::Official,
        Self::Personal,
        Self::Interview,
        Self::Meeting,
        Self::Delivery,
        Self::Other,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Official => "official",
            Self::Personal => "personal",
            Self::Interview => "interview",
            Self::Meeting => "meeting",
            Self::Delivery => "delivery",
            Self::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl fmt::Display for Purpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an entry or exit was authorized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryMethod {
    Qr,
    Face,
    Thumbprint,
    Manual,
}

impl EntryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qr => "qr",
            Self::Face => "face",
            Self::Thumbprint => "thumbprint",
            Self::Manual => "manual",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "qr" => Some(Self::Qr),
            "face" => Some(Self::Face),
            "thumbprint" => Some(Self::Thumbprint),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

impl From<VerificationMethod> for EntryMethod {
    fn from(m: VerificationMethod) -> Self {
        match m {
            VerificationMethod::Qr => Self::Qr,
            VerificationMethod::Face => Self::Face,
            VerificationMethod::Fingerprint => Self::Thumbprint,
        }
    }
}

impl fmt::Display for EntryMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogStatus {
    Inside,
    Exited,
}

impl LogStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Inside => "inside",
            Self::Exited => "exited",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "inside" => Some(Self::Inside),
            "exited" => Some(Self::Exited),
            _ => None,
        }
    }
}

/// One visit: an entry and, once the visitor leaves, its exit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryLog {
    pub id: String,
    pub visitor_id: String,
    pub visitor_name: String,
    pub visitor_phone: String,
    pub entry_time: DateTime<Utc>,
    pub exit_time: Option<DateTime<Utc>>,
    pub entry_method: EntryMethod,
    pub exit_method: Option<EntryMethod>,
    pub purpose: String,
    pub person_to_meet: String,
    pub status: LogStatus,
}

/// Filter and paging for log listings. Pages are 1-based.
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub status: Option<LogStatus>,
    /// Restrict to entries made on this UTC day.
    pub date: Option<NaiveDate>,
    pub page: u32,
    pub limit: u32,
}

impl Default for LogFilter {
    fn default() -> Self {
        Self {
            status: None,
            date: None,
            page: 1,
            limit: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogPage {
    pub logs: Vec<EntryLog>,
    pub total: u64,
    pub total_pages: u64,
    pub current_page: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PurposeCount {
    pub purpose: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourCount {
    pub hour: u32,
    pub count: u64,
}

/// Aggregate entry statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub today_visitors: u64,
    pub week_visitors: u64,
    pub month_visitors: u64,
    pub total_visitors: u64,
    pub currently_inside: u64,
    pub today_exits: u64,
    pub purpose_stats: Vec<PurposeCount>,
    pub hourly_stats: Vec<HourCount>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_purpose_parse() {
        assert_eq!(Purpose::parse("delivery"), Some(Purpose::Delivery));
        assert_eq!(Purpose::parse("Delivery"), None);
        assert_eq!(Purpose::parse(""), None);
        for p in Purpose::ALL {
            assert_eq!(Purpose::parse(p.as_str()), Some(p));
        }
    }

    #[test]
    fn test_update_from_partial_json() {
        let update: VisitorUpdate =
            serde_json::from_str(r#"{"personToMeet":"Dean","status":"approved"}"#).unwrap();
        assert_eq!(update.person_to_meet.as_deref(), Some("Dean"));
        assert_eq!(update.status, Some(VisitorStatus::Approved));
        assert!(update.name.is_none());
    }
}
