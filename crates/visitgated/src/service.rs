//! Gate operations: verification, registration and entry/exit recording.
//!
//! Loads candidate pools from the store, hands them to the engine, and
//! turns engine results into client responses.

use crate::model::{EntryLog, EntryMethod, LogFilter, LogPage, NewVisitor, Purpose, Stats, VisitorUpdate};
use crate::store::{StoreError, VisitorStore};
use thiserror::Error;
use visitgate_core::{
    Outcome, Probe, Verifier, VerifyRequest, VerifyResponse, VisitorRecord, VisitorStatus,
};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error("{0}")]
    NotFound(String),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

pub struct GateService {
    store: VisitorStore,
    verifier: Verifier,
    face_descriptor_len: usize,
}

impl GateService {
    pub fn new(store: VisitorStore, verifier: Verifier, face_descriptor_len: usize) -> Self {
        Self {
            store,
            verifier,
            face_descriptor_len,
        }
    }

    pub fn verifier(&self) -> &Verifier {
        &self.verifier
    }

    /// Load the candidate pool for a probe from the store.
    async fn pool_for(&self, probe: &Probe) -> Result<Vec<VisitorRecord>, StoreError> {
        match probe {
            Probe::Qr(token) if token.is_empty() => Ok(Vec::new()),
            Probe::Qr(token) => self.store.qr_holders(token).await,
            Probe::Face(_) => self.store.face_candidates().await,
            Probe::Fingerprint(_) => self.store.fingerprint_candidates().await,
        }
    }

    /// Verify a request and report the visitor's inside/outside state.
    pub async fn verify(&self, request: &VerifyRequest) -> Result<VerifyResponse, ServiceError> {
        let Some(probe) = request.probe() else {
            tracing::info!("verify: no verification data supplied");
            return Ok(VerifyResponse::input_missing());
        };

        let pool = self.pool_for(&probe).await?;
        let result = self.verifier.verify(&probe, &pool);
        let is_inside = match result.visitor.filter(|_| result.accepted) {
            Some(visitor) => self.store.is_inside(&visitor.id).await?,
            None => false,
        };

        tracing::info!(
            method = %result.method,
            verified = result.accepted,
            visitor = result.visitor.map(|v| v.id.as_str()).unwrap_or(""),
            confidence = result.confidence,
            "verify"
        );
        Ok(VerifyResponse::from_result(&result, is_inside))
    }

    /// Identify the visitor an entry/exit request refers to.
    ///
    /// A QR code or biometric probe goes through the engine. When the probe
    /// carries no data for its method, an explicit visitor id is looked up
    /// directly and recorded as manual.
    async fn resolve(&self, request: &VerifyRequest) -> Result<(VisitorRecord, EntryMethod), ServiceError> {
        let mut missing = "No verification data provided";
        if let Some(probe) = request.probe() {
            let pool = self.pool_for(&probe).await?;
            let result = self.verifier.verify(&probe, &pool);
            match result.visitor.filter(|_| result.accepted) {
                Some(visitor) => return Ok((visitor.clone(), EntryMethod::from(result.method))),
                None if result.outcome == Outcome::InputMissing => {
                    missing = result.message().unwrap_or(missing);
                }
                None => {
                    return Err(ServiceError::NotFound(
                        result.message().unwrap_or("Visitor not found").to_string(),
                    ))
                }
            }
        }

        match request.visitor_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => self
                .store
                .get(id)
                .await?
                .map(|v| (v, EntryMethod::Manual))
                .ok_or_else(|| ServiceError::NotFound("Visitor not found".to_string())),
            None => Err(ServiceError::InvalidRequest(missing.to_string())),
        }
    }

    /// Re-read a visitor after the store has changed its status.
    async fn reload(&self, id: &str) -> Result<VisitorRecord, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Visitor not found".to_string()))
    }

    pub async fn record_entry(&self, request: &VerifyRequest) -> Result<(VisitorRecord, EntryLog), ServiceError> {
        let (visitor, method) = self.resolve(request).await?;
        let log = self.store.record_entry(&visitor.id, method).await?;
        Ok((self.reload(&visitor.id).await?, log))
    }

    pub async fn record_exit(&self, request: &VerifyRequest) -> Result<(VisitorRecord, EntryLog), ServiceError> {
        let (visitor, method) = self.resolve(request).await?;
        let log = self.store.record_exit(&visitor.id, method).await?;
        Ok((self.reload(&visitor.id).await?, log))
    }

    pub async fn register(&self, form: NewVisitor) -> Result<VisitorRecord, ServiceError> {
        for (field, value) in [
            ("name", &form.name),
            ("email", &form.email),
            ("phone", &form.phone),
            ("personToMeet", &form.person_to_meet),
        ] {
            if value.trim().is_empty() {
                return Err(ServiceError::InvalidRequest(format!("{field} is required")));
            }
        }
        check_purpose(&form.purpose)?;
        let len = form.face_descriptor.len();
        if len != 0 && len != self.face_descriptor_len {
            return Err(ServiceError::InvalidRequest(format!(
                "face descriptor must have {} values, got {len}",
                self.face_descriptor_len
            )));
        }
        Ok(self.store.register(form).await?)
    }

    pub async fn update(&self, id: &str, update: VisitorUpdate) -> Result<VisitorRecord, ServiceError> {
        if let Some(purpose) = update.purpose.as_deref().filter(|p| !p.is_empty()) {
            check_purpose(purpose)?;
        }
        Ok(self.store.update(id, update).await?)
    }

    pub async fn set_status(&self, id: &str, status: VisitorStatus) -> Result<VisitorRecord, ServiceError> {
        Ok(self.store.set_status(id, status).await?)
    }

    pub async fn remove(&self, id: &str) -> Result<bool, ServiceError> {
        Ok(self.store.remove(id).await?)
    }

    pub async fn visitor(&self, id: &str) -> Result<VisitorRecord, ServiceError> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Visitor not found".to_string()))
    }

    pub async fn visitors(&self) -> Result<Vec<VisitorRecord>, ServiceError> {
        Ok(self.store.all_visitors().await?)
    }

    pub async fn logs(&self, filter: LogFilter) -> Result<LogPage, ServiceError> {
        Ok(self.store.logs(filter).await?)
    }

    pub async fn visitor_logs(&self, id: &str) -> Result<Vec<EntryLog>, ServiceError> {
        Ok(self.store.visitor_logs(id).await?)
    }

    pub async fn stats(&self) -> Result<Stats, ServiceError> {
        Ok(self.store.stats().await?)
    }
}

fn check_purpose(purpose: &str) -> Result<Purpose, ServiceError> {
    Purpose::parse(purpose).ok_or_else(|| {
        let allowed: Vec<_> = Purpose::ALL.iter().map(Purpose::as_str).collect();
        ServiceError::InvalidRequest(format!(
            "purpose must be one of {}, got {purpose:?}",
            allowed.join(", ")
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use visitgate_core::{TemplateValue, Thresholds, VerificationMethod};

    async fn service() -> GateService {
        let store = VisitorStore::open_in_memory().await.unwrap();
        GateService::new(store, Verifier::new(Thresholds::default()), 4)
    }

    fn form(name: &str, face: Vec<f32>) -> NewVisitor {
        NewVisitor {
            name: name.into(),
            email: "guest@example.com".into(),
            phone: "555-0100".into(),
            purpose: "meeting".into(),
            person_to_meet: "Registrar".into(),
            face_descriptor: face,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_verify_face_reports_inside_state() {
        let svc = service().await;
        let a = svc.register(form("A", vec![0.0, 0.0, 0.0, 0.0])).await.unwrap();
        svc.register(form("B", vec![0.3, 0.0, 0.0, 0.0])).await.unwrap();

        let request = VerifyRequest {
            face_descriptor: vec![0.0, 0.0, 0.0, 0.0],
            ..Default::default()
        };
        let resp = svc.verify(&request).await.unwrap();
        assert!(resp.verified);
        assert_eq!(resp.visitor.as_ref().map(|v| v.id.as_str()), Some(a.id.as_str()));
        assert_eq!(resp.match_confidence, Some(1.0));
        assert_eq!(resp.is_inside, Some(false));

        svc.record_entry(&request).await.unwrap();
        let resp = svc.verify(&request).await.unwrap();
        assert_eq!(resp.is_inside, Some(true));
    }

    #[tokio::test]
    async fn test_verify_empty_pool_message() {
        let svc = service().await;
        svc.register(form("NoFace", vec![])).await.unwrap();
        let request = VerifyRequest {
            face_descriptor: vec![0.0; 4],
            ..Default::default()
        };
        let resp = svc.verify(&request).await.unwrap();
        assert!(!resp.verified);
        assert_eq!(resp.message.as_deref(), Some("No registered visitors with face data"));
    }

    #[tokio::test]
    async fn test_verify_qr_and_unknown_token() {
        let svc = service().await;
        let a = svc.register(form("A", vec![])).await.unwrap();
        let request = VerifyRequest { qr_code: a.qr_token.clone(), ..Default::default() };
        let resp = svc.verify(&request).await.unwrap();
        assert!(resp.verified);
        assert_eq!(resp.verification_method, Some(VerificationMethod::Qr));

        let request = VerifyRequest { qr_code: Some("abc123".into()), ..Default::default() };
        let resp = svc.verify(&request).await.unwrap();
        assert!(!resp.verified);
        assert_eq!(resp.message.as_deref(), Some("Visitor not found"));
    }

    #[tokio::test]
    async fn test_verify_thumbprint() {
        let svc = service().await;
        let mut f = form("Print", vec![]);
        f.thumbprint_template = [1, 0, 0, 1].into_iter().map(TemplateValue::Int).collect();
        let p = svc.register(f).await.unwrap();

        let request = VerifyRequest {
            thumbprint_template: [1, 0, 1, 1].into_iter().map(TemplateValue::Int).collect(),
            ..Default::default()
        };
        let resp = svc.verify(&request).await.unwrap();
        assert!(resp.verified);
        assert_eq!(resp.match_confidence, Some(0.75));
        assert_eq!(resp.visitor.map(|v| v.id), Some(p.id));
    }

    #[tokio::test]
    async fn test_verify_without_data() {
        let svc = service().await;
        let resp = svc.verify(&VerifyRequest::default()).await.unwrap();
        assert!(!resp.verified);
        assert_eq!(resp.message.as_deref(), Some("No verification data provided"));
    }

    #[tokio::test]
    async fn test_manual_entry_by_id_then_exit_by_qr() {
        let svc = service().await;
        let a = svc.register(form("A", vec![])).await.unwrap();

        let by_id = VerifyRequest { visitor_id: Some(a.id.clone()), ..Default::default() };
        let (_, entry) = svc.record_entry(&by_id).await.unwrap();
        assert_eq!(entry.entry_method, EntryMethod::Manual);

        let by_qr = VerifyRequest { qr_code: a.qr_token.clone(), ..Default::default() };
        let (visitor, exit) = svc.record_exit(&by_qr).await.unwrap();
        assert_eq!(visitor.id, a.id);
        assert_eq!(exit.exit_method, Some(EntryMethod::Qr));
    }

    #[tokio::test]
    async fn test_entry_exit_reply_carries_updated_visitor() {
        let svc = service().await;
        let a = svc.register(form("A", vec![])).await.unwrap();
        let by_qr = VerifyRequest { qr_code: a.qr_token.clone(), ..Default::default() };

        let (visitor, entry) = svc.record_entry(&by_qr).await.unwrap();
        assert_eq!(visitor.status, VisitorStatus::CheckedIn);
        assert!(visitor.currently_inside);
        assert_eq!(visitor.check_in_time, Some(entry.entry_time));

        let (visitor, exit) = svc.record_exit(&by_qr).await.unwrap();
        assert_eq!(visitor.status, VisitorStatus::CheckedOut);
        assert!(!visitor.currently_inside);
        assert_eq!(visitor.check_out_time, exit.exit_time);
    }

    #[tokio::test]
    async fn test_qr_hint_without_code_falls_back_to_id() {
        let svc = service().await;
        let a = svc.register(form("A", vec![])).await.unwrap();
        let request = VerifyRequest {
            method: Some(VerificationMethod::Qr),
            visitor_id: Some(a.id.clone()),
            ..Default::default()
        };
        let (visitor, entry) = svc.record_entry(&request).await.unwrap();
        assert_eq!(visitor.id, a.id);
        assert_eq!(entry.entry_method, EntryMethod::Manual);

        let request = VerifyRequest { method: Some(VerificationMethod::Face), ..Default::default() };
        let err = svc.record_exit(&request).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(ref m) if m == "No face descriptor provided"));
    }

    #[tokio::test]
    async fn test_entry_for_unrecognized_face() {
        let svc = service().await;
        svc.register(form("A", vec![0.0; 4])).await.unwrap();
        let request = VerifyRequest { face_descriptor: vec![1.0; 4], ..Default::default() };
        let err = svc.record_entry(&request).await.unwrap_err();
        assert_eq!(err.to_string(), "Face not recognized");
    }

    #[tokio::test]
    async fn test_register_validates_descriptor_length() {
        let svc = service().await;
        let err = svc.register(form("A", vec![0.0; 3])).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
        let err = svc.register(form(" ", vec![])).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_register_requires_contact_fields() {
        let svc = service().await;
        let cases: [(&str, fn(&mut NewVisitor)); 3] = [
            ("email is required", |f| f.email.clear()),
            ("phone is required", |f| f.phone = "  ".into()),
            ("personToMeet is required", |f| f.person_to_meet.clear()),
        ];
        for (expected, blank) in cases {
            let mut f = form("A", vec![]);
            blank(&mut f);
            let err = svc.register(f).await.unwrap_err();
            assert_eq!(err.to_string(), format!("invalid request: {expected}"));
        }
        assert!(svc.visitors().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_unknown_purpose() {
        let svc = service().await;
        for purpose in ["", "sightseeing", "Meeting"] {
            let mut f = form("A", vec![]);
            f.purpose = purpose.into();
            let err = svc.register(f).await.unwrap_err();
            assert!(matches!(err, ServiceError::InvalidRequest(ref m) if m.starts_with("purpose must be one of")));
        }
        let mut f = form("A", vec![]);
        f.purpose = "delivery".into();
        assert_eq!(svc.register(f).await.unwrap().purpose, "delivery");
    }

    #[tokio::test]
    async fn test_update_visitor() {
        let svc = service().await;
        let a = svc.register(form("A", vec![])).await.unwrap();

        let update = VisitorUpdate { department: Some("Physics".into()), ..Default::default() };
        let updated = svc.update(&a.id, update).await.unwrap();
        assert_eq!(updated.department, "Physics");
        assert_eq!(updated.name, "A");

        let bad = VisitorUpdate { purpose: Some("tour".into()), ..Default::default() };
        assert!(matches!(svc.update(&a.id, bad).await, Err(ServiceError::InvalidRequest(_))));
        assert_eq!(svc.visitor(&a.id).await.unwrap().purpose, "meeting");

        let err = svc.update("missing", VisitorUpdate::default()).await.unwrap_err();
        assert!(matches!(err, ServiceError::Store(StoreError::NotFound(_))));
    }
}
