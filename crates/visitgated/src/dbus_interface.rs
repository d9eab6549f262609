use crate::model::{LogFilter, LogStatus, NewVisitor, VisitorUpdate};
use crate::service::{GateService, ServiceError};
use crate::store::StoreError;
use chrono::NaiveDate;
use serde::Serialize;
use std::sync::Arc;
use visitgate_core::{VerifyRequest, VisitorStatus};
use zbus::fdo;
use zbus::interface;
use zbus::object_server::SignalEmitter;

pub const BUS_NAME: &str = "org.visitgate.Gate1";
pub const OBJECT_PATH: &str = "/org/visitgate/Gate1";

/// D-Bus interface for the visitgate daemon.
///
/// Bus name: org.visitgate.Gate1
/// Object path: /org/visitgate/Gate1
///
/// Requests and replies are JSON documents.
pub struct GateInterface {
    service: Arc<GateService>,
}

impl GateInterface {
    pub fn new(service: Arc<GateService>) -> Self {
        Self { service }
    }
}

fn to_fdo(err: ServiceError) -> fdo::Error {
    match err {
        ServiceError::NotFound(msg) => fdo::Error::FileNotFound(msg),
        ServiceError::InvalidRequest(msg) => fdo::Error::InvalidArgs(msg),
        ServiceError::Store(e @ StoreError::NotFound(_)) => fdo::Error::FileNotFound(e.to_string()),
        ServiceError::Store(
            e @ (StoreError::AlreadyInside | StoreError::AccessDenied | StoreError::NoActiveEntry),
        ) => fdo::Error::AccessDenied(e.to_string()),
        ServiceError::Store(e) => {
            tracing::error!(error = %e, "store failure");
            fdo::Error::Failed(e.to_string())
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(json: &str) -> fdo::Result<T> {
    serde_json::from_str(json).map_err(|e| fdo::Error::InvalidArgs(format!("bad request: {e}")))
}

fn to_json<T: Serialize>(value: &T) -> fdo::Result<String> {
    serde_json::to_string(value).map_err(|e| fdo::Error::Failed(e.to_string()))
}

#[interface(name = "org.visitgate.Gate1")]
impl GateInterface {
    /// Verify a visitor by QR code, face descriptor or thumbprint.
    async fn verify(&self, request: &str) -> fdo::Result<String> {
        let request: VerifyRequest = parse_json(request)?;
        let response = self.service.verify(&request).await.map_err(to_fdo)?;
        to_json(&response)
    }

    /// Register a new visitor; replies with the stored record including its QR token.
    async fn register(&self, visitor: &str) -> fdo::Result<String> {
        let form: NewVisitor = parse_json(visitor)?;
        tracing::info!(name = %form.name, "register requested");
        let record = self.service.register(form).await.map_err(to_fdo)?;
        to_json(&record)
    }

    async fn approve(&self, id: &str) -> fdo::Result<String> {
        tracing::info!(visitor = id, "approve requested");
        let record = self
            .service
            .set_status(id, VisitorStatus::Approved)
            .await
            .map_err(to_fdo)?;
        to_json(&record)
    }

    async fn reject(&self, id: &str) -> fdo::Result<String> {
        tracing::info!(visitor = id, "reject requested");
        let record = self
            .service
            .set_status(id, VisitorStatus::Rejected)
            .await
            .map_err(to_fdo)?;
        to_json(&record)
    }

    /// Edit a visitor's details. Fields missing from `update` are kept.
    async fn update_visitor(&self, id: &str, update: &str) -> fdo::Result<String> {
        let update: VisitorUpdate = parse_json(update)?;
        tracing::info!(visitor = id, "update requested");
        let record = self.service.update(id, update).await.map_err(to_fdo)?;
        to_json(&record)
    }

    async fn remove_visitor(&self, id: &str) -> fdo::Result<bool> {
        tracing::info!(visitor = id, "remove requested");
        self.service.remove(id).await.map_err(to_fdo)
    }

    async fn get_visitor(&self, id: &str) -> fdo::Result<String> {
        to_json(&self.service.visitor(id).await.map_err(to_fdo)?)
    }

    async fn list_visitors(&self) -> fdo::Result<String> {
        to_json(&self.service.visitors().await.map_err(to_fdo)?)
    }

    /// Record an entry and notify listeners.
    async fn record_entry(
        &self,
        request: &str,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> fdo::Result<String> {
        let request: VerifyRequest = parse_json(request)?;
        let (visitor, log) = self.service.record_entry(&request).await.map_err(to_fdo)?;
        Self::entry_recorded(&emitter, &visitor.id, &log.id, &visitor.department).await?;
        to_json(&serde_json::json!({
            "message": "Entry recorded successfully",
            "visitor": visitor,
            "entryLog": log,
        }))
    }

    /// Record an exit and notify listeners.
    async fn record_exit(
        &self,
        request: &str,
        #[zbus(signal_emitter)] emitter: SignalEmitter<'_>,
    ) -> fdo::Result<String> {
        let request: VerifyRequest = parse_json(request)?;
        let (visitor, log) = self.service.record_exit(&request).await.map_err(to_fdo)?;
        Self::exit_recorded(&emitter, &visitor.id, &log.id, &visitor.department).await?;
        to_json(&serde_json::json!({
            "message": "Exit recorded successfully",
            "visitor": visitor,
            "entryLog": log,
        }))
    }

    /// Page through entry logs. Empty `status`/`date` mean no filter;
    /// `date` is `YYYY-MM-DD` (UTC).
    async fn logs(&self, status: &str, date: &str, page: u32, limit: u32) -> fdo::Result<String> {
        let status = match status {
            "" => None,
            s => Some(
                LogStatus::parse(s)
                    .ok_or_else(|| fdo::Error::InvalidArgs(format!("unknown log status {s:?}")))?,
            ),
        };
        let date = match date {
            "" => None,
            d => Some(
                NaiveDate::parse_from_str(d, "%Y-%m-%d")
                    .map_err(|e| fdo::Error::InvalidArgs(format!("bad date {d:?}: {e}")))?,
            ),
        };
        let filter = LogFilter {
            status,
            date,
            page,
            limit,
        };
        to_json(&self.service.logs(filter).await.map_err(to_fdo)?)
    }

    async fn visitor_logs(&self, visitor_id: &str) -> fdo::Result<String> {
        to_json(&self.service.visitor_logs(visitor_id).await.map_err(to_fdo)?)
    }

    async fn stats(&self) -> fdo::Result<String> {
        to_json(&self.service.stats().await.map_err(to_fdo)?)
    }

    /// Return daemon status information.
    async fn status(&self) -> fdo::Result<String> {
        let thresholds = self.service.verifier().thresholds();
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "faceThreshold": thresholds.face,
            "fingerprintThreshold": thresholds.fingerprint,
        })
        .to_string())
    }

    #[zbus(signal)]
    async fn entry_recorded(
        emitter: &SignalEmitter<'_>,
        visitor_id: &str,
        log_id: &str,
        department: &str,
    ) -> zbus::Result<()>;

    #[zbus(signal)]
    async fn exit_recorded(
        emitter: &SignalEmitter<'_>,
        visitor_id: &str,
        log_id: &str,
        department: &str,
    ) -> zbus::Result<()>;
}
