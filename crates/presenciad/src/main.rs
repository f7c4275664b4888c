use anyhow::Result;
use presencia_core::ModelPaths;
use presencia_store::{Store, SyncConfig};
use std::sync::{Arc, RwLock};
use tracing_subscriber::EnvFilter;

mod config;
mod dbus_interface;
mod engine;
mod gate;
mod identity;
mod pipeline;
mod scanner;
mod tasks;

use config::Config;
use gate::{GateState, KioskGate};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("presenciad starting");
    let config = Config::from_env();

    let store = Arc::new(Store::open(&config.db_path)?);
    let kiosk_id = store.device_id()?;
    seed_sync_config(&store)?;
    let sync_config = store.sync_config()?;

    tracing::info!(
        kiosk_id = %kiosk_id,
        db = %config.db_path.display(),
        server = %sync_config.server_url,
        "local store ready"
    );

    let matcher = Arc::new(RwLock::new(identity::build_matcher(&store)?));

    // With a server configured the kiosk starts gated until the first
    // status poll resolves; offline-only kiosks are always permitted.
    let gate = Arc::new(KioskGate::new(if sync_config.has_server() {
        GateState::Pending
    } else {
        GateState::Offline
    }));

    let engine = engine::spawn_engine(
        &config.camera_device,
        ModelPaths {
            detector: config.detector_model_path(),
            encoder: config.encoder_model_path(),
        },
    )?;

    let deps = tasks::SyncDeps {
        store: store.clone(),
        matcher: matcher.clone(),
        gate: gate.clone(),
        kiosk_id: kiosk_id.clone(),
        kiosk_name: config.kiosk_name.clone(),
    };

    // Resolve the moderation verdict before the first scan cycle runs.
    if let Err(error) = tasks::refresh_device_status(&deps).await {
        tracing::warn!(%error, "initial device status poll failed");
    }

    tokio::spawn(tasks::run_autosync(deps, config.autosync_interval_secs));

    tokio::spawn(scanner::run_scan_loop(
        scanner::Scanner {
            store: store.clone(),
            matcher: matcher.clone(),
            engine: engine.clone(),
            gate: gate.clone(),
            kiosk_id: kiosk_id.clone(),
        },
        pipeline::ScanPolicy {
            match_cooldown: std::time::Duration::from_secs(config.match_cooldown_secs),
            unknown_streak: config.unknown_streak,
            unknown_alert_gap: std::time::Duration::from_secs(config.unknown_alert_gap_secs),
        },
        config.scan_interval_ms,
    ));

    let service = dbus_interface::KioskService {
        store,
        matcher,
        engine,
        gate,
        kiosk_id,
        kiosk_name: config.kiosk_name.clone(),
        enroll_samples: config.enroll_samples,
    };

    let _connection = zbus::connection::Builder::session()?
        .name("org.presencia.Kiosk1")?
        .serve_at("/org/presencia/Kiosk1", service)?
        .build()
        .await?;

    tracing::info!("presenciad ready");

    tokio::signal::ctrl_c().await?;
    tracing::info!("presenciad shutting down");
    Ok(())
}

/// First-boot convenience: adopt the environment's server settings when
/// nothing is persisted yet. After that the store copy is authoritative
/// and mutable over D-Bus.
fn seed_sync_config(store: &Store) -> Result<()> {
    let current = store.sync_config()?;
    if current.has_server() {
        return Ok(());
    }
    let Ok(server_url) = std::env::var("PRESENCIA_SERVER_URL") else {
        return Ok(());
    };
    if server_url.trim().is_empty() {
        return Ok(());
    }

    let config = SyncConfig {
        server_url: server_url.trim().to_string(),
        api_key: std::env::var("PRESENCIA_API_KEY").unwrap_or_default(),
        enabled: std::env::var("PRESENCIA_SYNC_ENABLED").map(|v| v != "0").unwrap_or(true),
    };
    store.set_sync_config(&config)?;
    tracing::info!(server = %config.server_url, "seeded sync config from environment");
    Ok(())
}
