//! D-Bus control interface for the kiosk daemon.
//!
//! Bus name: org.presencia.Kiosk1
//! Object path: /org/presencia/Kiosk1
//!
//! Consumed by the `presencia` CLI and the kiosk UI shell. Structured
//! results travel as JSON strings to keep the interface signature flat.

use crate::engine::EngineHandle;
use crate::gate::KioskGate;
use crate::identity;
use crate::tasks::{self, SyncDeps};
use base64::Engine as _;
use presencia_core::FaceMatcher;
use presencia_store::{AttendanceKind, NewAttendance, Store, StoreError, SyncConfig, UserProfile};
use presencia_sync::{HttpBackend, SyncService};
use std::sync::{Arc, RwLock};
use zbus::fdo;
use zbus::interface;

pub struct KioskService {
    pub store: Arc<Store>,
    pub matcher: Arc<RwLock<FaceMatcher>>,
    pub engine: EngineHandle,
    pub gate: Arc<KioskGate>,
    pub kiosk_id: String,
    pub kiosk_name: String,
    pub enroll_samples: usize,
}

fn internal(error: impl std::fmt::Display) -> fdo::Error {
    fdo::Error::Failed(error.to_string())
}

impl KioskService {
    fn sync_deps(&self) -> SyncDeps {
        SyncDeps {
            store: self.store.clone(),
            matcher: self.matcher.clone(),
            gate: self.gate.clone(),
            kiosk_id: self.kiosk_id.clone(),
            kiosk_name: self.kiosk_name.clone(),
        }
    }
}

#[interface(name = "org.presencia.Kiosk1")]
impl KioskService {
    /// Daemon status snapshot as JSON.
    async fn status(&self) -> fdo::Result<String> {
        let users = self.store.list_users().map_err(internal)?;
        let pending = self.store.list_unsynced_attendance().map_err(internal)?;
        let config = self.store.sync_config().map_err(internal)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "kioskId": self.kiosk_id,
            "kioskName": self.kiosk_name,
            "gate": self.gate.state().as_str(),
            "enrolled": users.len(),
            "pendingUploads": pending.len(),
            "sync": { "serverUrl": config.server_url, "enabled": config.enabled },
        })
        .to_string())
    }

    /// Capture face samples from the camera and enroll a new identity.
    async fn enroll(&self, dni: &str, name: &str) -> fdo::Result<String> {
        if !self.gate.allows_scanning() {
            return Err(fdo::Error::AccessDenied(format!(
                "kiosk is {}; enrollment refused",
                self.gate.state().as_str()
            )));
        }

        let outcome = self.engine.enroll(self.enroll_samples).await.map_err(internal)?;
        let samples = outcome.descriptors.len();
        let profile = UserProfile {
            dni: dni.to_string(),
            name: name.to_string(),
            descriptors: outcome.descriptors.into_iter().map(|d| d.values).collect(),
            photos: outcome
                .photos
                .iter()
                .map(|jpeg| base64::engine::general_purpose::STANDARD.encode(jpeg))
                .collect(),
            ..Default::default()
        };

        match self.store.insert_user(&profile) {
            Ok(id) => {
                identity::swap_matcher(&self.matcher, &self.store).map_err(internal)?;
                tracing::info!(dni, name, samples, "identity enrolled");
                Ok(serde_json::json!({
                    "id": id,
                    "samples": samples,
                    "quality": outcome.quality,
                })
                .to_string())
            }
            Err(error @ StoreError::DuplicateDni(_)) => Err(fdo::Error::Failed(error.to_string())),
            Err(error) => Err(internal(error)),
        }
    }

    /// Remove an identity; its attendance history cascades away with it.
    async fn remove_user(&self, dni: &str) -> fdo::Result<bool> {
        let Some(user) = self.store.get_user_by_dni(dni).map_err(internal)? else {
            return Ok(false);
        };
        let removed = self.store.delete_user(user.id).map_err(internal)?;
        if removed {
            identity::swap_matcher(&self.matcher, &self.store).map_err(internal)?;
            tracing::info!(dni, "identity removed");
        }
        Ok(removed)
    }

    /// Enrolled identities as a JSON array (no biometric payloads).
    async fn list_users(&self) -> fdo::Result<String> {
        let users = self.store.list_users().map_err(internal)?;
        let rows: Vec<serde_json::Value> = users
            .iter()
            .map(|user| {
                serde_json::json!({
                    "id": user.id,
                    "dni": user.dni,
                    "name": user.name,
                    "samples": user.descriptors.len(),
                    "falsePositives": user.false_positives,
                })
            })
            .collect();
        serde_json::to_string(&rows).map_err(internal)
    }

    /// Manual attendance entry by an operator.
    async fn record_attendance(&self, dni: &str, kind: &str) -> fdo::Result<i64> {
        let kind = AttendanceKind::from_label(kind)
            .ok_or_else(|| fdo::Error::InvalidArgs(format!("unknown attendance kind: {kind}")))?;
        let user = self
            .store
            .get_user_by_dni(dni)
            .map_err(internal)?
            .ok_or_else(|| fdo::Error::Failed(format!("no identity with dni {dni}")))?;

        let id = self
            .store
            .insert_attendance(&NewAttendance {
                user_id: user.id,
                user_name: user.name.clone(),
                user_dni: user.dni.clone(),
                kind,
                timestamp_ms: chrono::Utc::now().timestamp_millis(),
                photo: None,
                kiosk_id: self.kiosk_id.clone(),
                notes: Some("manual".to_string()),
            })
            .map_err(internal)?;
        Ok(id)
    }

    /// The subject rejected a confirmed match; track it on their profile.
    async fn flag_false_positive(&self, dni: &str) -> fdo::Result<()> {
        self.store.record_false_positive(dni).map_err(internal)
    }

    /// Operator correction of an existing attendance row. Stamps the
    /// audit fields and puts the row back in the upload queue.
    async fn amend_attendance(
        &self,
        id: i64,
        kind: &str,
        timestamp_ms: i64,
        observation: &str,
        modified_by: &str,
    ) -> fdo::Result<()> {
        let kind = AttendanceKind::from_label(kind)
            .ok_or_else(|| fdo::Error::InvalidArgs(format!("unknown attendance kind: {kind}")))?;
        let observation = if observation.is_empty() { None } else { Some(observation) };
        self.store
            .amend_attendance(
                id,
                kind,
                timestamp_ms,
                observation,
                modified_by,
                chrono::Utc::now().timestamp_millis(),
                true,
            )
            .map_err(internal)
    }

    /// Recent activity as JSON, re-derived per call from a time window.
    async fn recent_attendance(&self, window_secs: u64) -> fdo::Result<String> {
        let since_ms = chrono::Utc::now().timestamp_millis() - (window_secs as i64) * 1000;
        let rows = self.store.recent_attendance(since_ms).map_err(internal)?;
        let view: Vec<serde_json::Value> = rows
            .iter()
            .map(|record| {
                serde_json::json!({
                    "id": record.id,
                    "dni": record.user_dni,
                    "name": record.user_name,
                    "type": record.kind.label(),
                    "timestamp": record.timestamp_ms,
                    "synced": record.synced,
                })
            })
            .collect();
        serde_json::to_string(&view).map_err(internal)
    }

    /// Run a full sync cycle now. Always allowed, independent of the
    /// autosync timer and the `enabled` flag.
    async fn sync_now(&self) -> fdo::Result<String> {
        let report = tasks::run_sync_cycle(&self.sync_deps()).await.map_err(internal)?;
        serde_json::to_string(&report).map_err(internal)
    }

    /// Replace the persisted sync configuration. An empty api key keeps
    /// the stored one, so partial updates never wipe credentials.
    async fn set_sync_config(&self, server_url: &str, api_key: &str, enabled: bool) -> fdo::Result<()> {
        let current = self.store.sync_config().map_err(internal)?;
        let config = SyncConfig {
            server_url: server_url.trim().to_string(),
            api_key: if api_key.is_empty() { current.api_key } else { api_key.to_string() },
            enabled,
        };
        self.store.set_sync_config(&config).map_err(internal)?;
        if !config.has_server() {
            self.gate.set_offline();
        }
        tracing::info!(server = %config.server_url, enabled, "sync config updated");
        Ok(())
    }

    /// Current sync configuration (key never leaves the daemon).
    async fn get_sync_config(&self) -> fdo::Result<String> {
        let config = self.store.sync_config().map_err(internal)?;
        Ok(serde_json::json!({
            "serverUrl": config.server_url,
            "enabled": config.enabled,
            "hasApiKey": !config.api_key.is_empty(),
        })
        .to_string())
    }

    /// Poll the device registry and refresh the gate.
    async fn device_status(&self) -> fdo::Result<String> {
        tasks::refresh_device_status(&self.sync_deps()).await.map_err(internal)?;
        Ok(self.gate.state().as_str().to_string())
    }

    /// 5-second health probe with a distinct verdict per failure class.
    async fn test_connection(&self) -> fdo::Result<String> {
        let config = self.store.sync_config().map_err(internal)?;
        if !config.has_server() {
            return Ok("no sync server configured".to_string());
        }

        let store = self.store.clone();
        let kiosk_id = self.kiosk_id.clone();
        let kiosk_name = self.kiosk_name.clone();
        let verdict = tokio::task::spawn_blocking(move || -> anyhow::Result<String> {
            let backend = HttpBackend::probe(&config.server_url, &config.api_key)?;
            let service = SyncService::new(backend, &store, kiosk_id, kiosk_name);
            Ok(service.test_connection().to_string())
        })
        .await
        .map_err(internal)?
        .map_err(internal)?;
        Ok(verdict)
    }
}
