//! Background sync: the recurring autosync timer and the shared cycle
//! used by both the timer and the manual D-Bus trigger.

use crate::gate::KioskGate;
use crate::identity;
use presencia_core::FaceMatcher;
use presencia_store::Store;
use presencia_sync::{HttpBackend, SyncReport, SyncService};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::time::MissedTickBehavior;

/// Everything a sync cycle needs; cheap to clone into tasks.
#[derive(Clone)]
pub struct SyncDeps {
    pub store: Arc<Store>,
    pub matcher: Arc<RwLock<FaceMatcher>>,
    pub gate: Arc<KioskGate>,
    pub kiosk_id: String,
    pub kiosk_name: String,
}

/// Recurring autosync. The timer always ticks; each tick re-reads the
/// persisted config, so toggling `enabled` at runtime takes effect on
/// the next tick without restarting anything.
pub async fn run_autosync(deps: SyncDeps, interval_secs: u64) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;

        let config = match deps.store.sync_config() {
            Ok(config) => config,
            Err(error) => {
                tracing::warn!(%error, "reading sync config failed");
                continue;
            }
        };
        if !config.has_server() {
            deps.gate.set_offline();
            continue;
        }
        if !config.enabled {
            continue;
        }

        match run_sync_cycle(&deps).await {
            Ok(report) => tracing::debug!(
                success = report.success,
                downloaded = report.downloaded,
                uploaded = report.uploaded,
                "autosync cycle done"
            ),
            Err(error) => tracing::warn!(%error, "autosync cycle failed"),
        }
    }
}

/// One full sync cycle: blocking HTTP work off the runtime, then the
/// gate refresh and a matcher swap (the download phase may have
/// rewritten users).
pub async fn run_sync_cycle(deps: &SyncDeps) -> anyhow::Result<SyncReport> {
    let config = deps.store.sync_config()?;
    if !config.has_server() {
        anyhow::bail!("no sync server configured");
    }

    let store = deps.store.clone();
    let kiosk_id = deps.kiosk_id.clone();
    let kiosk_name = deps.kiosk_name.clone();

    let (report, status) = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let backend = HttpBackend::new(&config.server_url, &config.api_key)?;
        let service = SyncService::new(backend, &store, kiosk_id, kiosk_name);
        let report = service.full_sync();
        let status = service.check_device_status();
        Ok((report, status))
    })
    .await??;

    match status {
        Ok(status) => deps.gate.set_status(status),
        Err(error) => {
            tracing::warn!(%error, "device status poll failed; keeping previous gate state");
        }
    }

    identity::swap_matcher(&deps.matcher, &deps.store)?;
    Ok(report)
}

/// Startup (and on-demand) device-status poll. With no server
/// configured the kiosk runs fully offline.
pub async fn refresh_device_status(deps: &SyncDeps) -> anyhow::Result<()> {
    let config = deps.store.sync_config()?;
    if !config.has_server() {
        deps.gate.set_offline();
        return Ok(());
    }

    let store = deps.store.clone();
    let kiosk_id = deps.kiosk_id.clone();
    let kiosk_name = deps.kiosk_name.clone();

    let status = tokio::task::spawn_blocking(move || -> anyhow::Result<_> {
        let backend = HttpBackend::new(&config.server_url, &config.api_key)?;
        let service = SyncService::new(backend, &store, kiosk_id, kiosk_name);
        Ok(service.check_device_status())
    })
    .await??;

    match status {
        Ok(status) => deps.gate.set_status(status),
        Err(error) => {
            tracing::warn!(%error, "device status poll failed; keeping previous gate state");
        }
    }
    Ok(())
}
