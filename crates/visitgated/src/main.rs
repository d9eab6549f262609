use anyhow::{Context, Result};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use visitgate_core::Verifier;

mod config;
mod dbus_interface;
mod model;
mod service;
mod store;

use config::Config;
use dbus_interface::{GateInterface, BUS_NAME, OBJECT_PATH};
use service::GateService;
use store::VisitorStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("visitgated starting");

    let config = Config::load().context("loading configuration")?;
    tracing::info!(
        db = %config.db_path.display(),
        face_threshold = config.thresholds.face,
        fingerprint_threshold = config.thresholds.fingerprint,
        system_bus = config.system_bus,
        "configuration loaded"
    );

    let store = VisitorStore::open(&config.db_path)
        .await
        .with_context(|| format!("opening {}", config.db_path.display()))?;
    let service = GateService::new(
        store,
        Verifier::new(config.thresholds),
        config.face_descriptor_len,
    );
    let interface = GateInterface::new(Arc::new(service));

    let builder = if config.system_bus {
        zbus::connection::Builder::system()?
    } else {
        zbus::connection::Builder::session()?
    };
    let _conn = builder
        .name(BUS_NAME)?
        .serve_at(OBJECT_PATH, interface)?
        .build()
        .await
        .context("registering on D-Bus")?;

    tracing::info!(name = BUS_NAME, path = OBJECT_PATH, "visitgated ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("visitgated shutting down");

    Ok(())
}
