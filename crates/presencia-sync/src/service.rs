//! Three-phase sync cycle: attendance upload, employee reconciliation,
//! device heartbeat. Each phase is independently fault-tolerant; each
//! attendance record is retried on later cycles until the server accepts
//! it.

use crate::backend::{BackendError, DeviceStatus, RemoteBackend};
use crate::codec::{self, CodecError};
use crate::wire::{AttendanceUpload, DeviceRegistration, EmployeeRow};
use presencia_store::{Store, StoreError};
use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Outcome of one full sync cycle. Counts are informational.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Conjunction of the attendance and employee phases; the heartbeat
    /// never affects it.
    pub success: bool,
    pub downloaded: usize,
    pub uploaded: usize,
}

/// Operator-facing verdict from the 5-second health probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionVerdict {
    Reachable { database: Option<String> },
    Unauthorized,
    TimedOut,
    Unreachable(String),
}

impl fmt::Display for ConnectionVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionVerdict::Reachable { database: Some(db) } => {
                write!(f, "server reachable (database: {db})")
            }
            ConnectionVerdict::Reachable { database: None } => write!(f, "server reachable"),
            ConnectionVerdict::Unauthorized => {
                write!(f, "authorization failed: the server rejected the API key")
            }
            ConnectionVerdict::TimedOut => {
                write!(f, "no response within 5 seconds: server unreachable or overloaded")
            }
            ConnectionVerdict::Unreachable(msg) => write!(f, "connection failed: {msg}"),
        }
    }
}

#[derive(Error, Debug)]
enum ApplyError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Reconciles the local store with one remote backend.
///
/// Constructed per cycle from the current persisted configuration, so a
/// runtime config change simply takes effect on the next cycle.
pub struct SyncService<'s, B> {
    backend: B,
    store: &'s Store,
    kiosk_id: String,
    kiosk_name: String,
}

impl<'s, B: RemoteBackend> SyncService<'s, B> {
    pub fn new(backend: B, store: &'s Store, kiosk_id: String, kiosk_name: String) -> Self {
        Self { backend, store, kiosk_id, kiosk_name }
    }

    /// Run the three phases in order. A failing phase never prevents the
    /// following ones from attempting.
    pub fn full_sync(&self) -> SyncReport {
        let (uploaded, attendance_ok) = self.sync_attendance();
        let (downloaded, employees_ok) = self.sync_employees();

        if let Err(error) = self.heartbeat() {
            tracing::warn!(%error, "device heartbeat failed");
        }

        let report = SyncReport { success: attendance_ok && employees_ok, downloaded, uploaded };
        tracing::info!(
            success = report.success,
            downloaded = report.downloaded,
            uploaded = report.uploaded,
            "sync cycle finished"
        );
        report
    }

    /// Phase 1: POST every pending row individually; flip `synced` only
    /// on acceptance. One rejected record must not block the rest.
    fn sync_attendance(&self) -> (usize, bool) {
        let pending = match self.store.list_unsynced_attendance() {
            Ok(rows) => rows,
            Err(error) => {
                tracing::warn!(%error, "listing pending attendance failed");
                return (0, false);
            }
        };

        let mut uploaded = 0usize;
        let mut ok = true;
        for record in &pending {
            match self.backend.push_attendance(&AttendanceUpload::from_record(record)) {
                Ok(()) => match self.store.mark_attendance_synced(record.id) {
                    Ok(()) => uploaded += 1,
                    Err(error) => {
                        tracing::error!(
                            id = record.id,
                            %error,
                            "record accepted upstream but the synced flag did not persist"
                        );
                        ok = false;
                    }
                },
                Err(error) => {
                    tracing::warn!(
                        id = record.id,
                        %error,
                        "attendance upload failed; row stays pending for the next cycle"
                    );
                    ok = false;
                }
            }
        }
        (uploaded, ok)
    }

    /// Phase 2: download (remote wins on differing descriptor sets), then
    /// unconditionally upload every local user keyed by dni.
    fn sync_employees(&self) -> (usize, bool) {
        let mut ok = true;
        let mut downloaded = 0usize;

        match self.backend.fetch_employees() {
            Ok(rows) => {
                for row in &rows {
                    match self.apply_remote_employee(row) {
                        Ok(true) => downloaded += 1,
                        Ok(false) => {}
                        Err(error) => {
                            tracing::warn!(dni = %row.dni, %error, "applying remote employee failed");
                            ok = false;
                        }
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "employee download failed");
                ok = false;
            }
        }

        // The upload half still runs when the download failed; it is
        // not delta-based, the server upserts by dni.
        match self.store.list_users() {
            Ok(users) => {
                for user in &users {
                    if let Err(error) = self.backend.upsert_employee(&EmployeeRow::from_user(user)) {
                        tracing::warn!(dni = %user.dni, %error, "employee upload failed");
                        ok = false;
                    }
                }
            }
            Err(error) => {
                tracing::warn!(%error, "listing local users failed");
                ok = false;
            }
        }

        (downloaded, ok)
    }

    /// Returns true when the local row changed (insert or overwrite).
    fn apply_remote_employee(&self, row: &EmployeeRow) -> Result<bool, ApplyError> {
        let descriptors = codec::hydrate_set(&row.face_descriptors)?;

        match self.store.get_user_by_dni(&row.dni)? {
            None => {
                self.store.insert_user(&row.to_profile(descriptors))?;
                Ok(true)
            }
            Some(local) => {
                if !codec::sets_differ(&local.descriptors, &descriptors) {
                    return Ok(false);
                }
                let mut profile = row.to_profile(descriptors);
                // Device-local fields never travel; keep what we have.
                profile.sector = local.sector.clone();
                profile.role = local.role.clone();
                profile.tenant_id = local.tenant_id.clone();
                profile.assigned_kiosks = local.assigned_kiosks.clone();
                self.store.update_user(local.id, &profile)?;
                Ok(true)
            }
        }
    }

    /// Phase 3: announce this device, regardless of the sync outcome.
    pub fn heartbeat(&self) -> Result<(), BackendError> {
        self.backend.register_device(&DeviceRegistration {
            kiosk_id: self.kiosk_id.clone(),
            name: self.kiosk_name.clone(),
        })
    }

    /// Moderation status for this kiosk, independent of `full_sync`.
    pub fn check_device_status(&self) -> Result<DeviceStatus, BackendError> {
        self.backend.device_status(&self.kiosk_id)
    }

    /// Health probe verdict, keeping "wrong key" distinguishable from
    /// "server unreachable" for the operator.
    pub fn test_connection(&self) -> ConnectionVerdict {
        match self.backend.health() {
            Ok(health) => ConnectionVerdict::Reachable { database: health.database },
            Err(BackendError::Unauthorized) => ConnectionVerdict::Unauthorized,
            Err(BackendError::TimedOut) => ConnectionVerdict::TimedOut,
            Err(error) => ConnectionVerdict::Unreachable(error.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::HealthResponse;
    use presencia_store::{AttendanceKind, NewAttendance, UserProfile};
    use std::collections::HashSet;
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeBackend {
        remote_employees: Vec<EmployeeRow>,
        reject_timestamps: Mutex<HashSet<i64>>,
        fail_fetch: bool,
        fail_health: Option<&'static str>,
        status: Option<DeviceStatus>,
        pushed: Mutex<Vec<AttendanceUpload>>,
        upserted: Mutex<Vec<EmployeeRow>>,
        registered: Mutex<Vec<DeviceRegistration>>,
    }

    impl RemoteBackend for FakeBackend {
        fn health(&self) -> Result<HealthResponse, BackendError> {
            match self.fail_health {
                Some("401") => Err(BackendError::Unauthorized),
                Some("timeout") => Err(BackendError::TimedOut),
                Some(other) => Err(BackendError::Transport(other.to_string())),
                None => Ok(HealthResponse {
                    status: "ok".into(),
                    database: Some("postgres".into()),
                    public_key: None,
                }),
            }
        }

        fn fetch_employees(&self) -> Result<Vec<EmployeeRow>, BackendError> {
            if self.fail_fetch {
                return Err(BackendError::Transport("connection refused".into()));
            }
            Ok(self.remote_employees.clone())
        }

        fn upsert_employee(&self, row: &EmployeeRow) -> Result<(), BackendError> {
            self.upserted.lock().unwrap().push(row.clone());
            Ok(())
        }

        fn push_attendance(&self, upload: &AttendanceUpload) -> Result<(), BackendError> {
            if self.reject_timestamps.lock().unwrap().contains(&upload.timestamp) {
                return Err(BackendError::Status { status: 500 });
            }
            self.pushed.lock().unwrap().push(upload.clone());
            Ok(())
        }

        fn register_device(&self, registration: &DeviceRegistration) -> Result<(), BackendError> {
            self.registered.lock().unwrap().push(registration.clone());
            Ok(())
        }

        fn device_status(&self, _kiosk_id: &str) -> Result<DeviceStatus, BackendError> {
            self.status.ok_or(BackendError::Status { status: 500 })
        }
    }

    fn store_with_user(dni: &str, descriptors: Vec<Vec<f32>>) -> (Store, i64) {
        let store = Store::open_in_memory().unwrap();
        let id = store
            .insert_user(&UserProfile {
                dni: dni.into(),
                name: "Ana".into(),
                descriptors,
                ..Default::default()
            })
            .unwrap();
        (store, id)
    }

    fn pending_attendance(user_id: i64, ts: i64) -> NewAttendance {
        NewAttendance {
            user_id,
            user_name: "Ana".into(),
            user_dni: "12345678".into(),
            kind: AttendanceKind::Entrada,
            timestamp_ms: ts,
            photo: None,
            kiosk_id: "kiosk-1".into(),
            notes: None,
        }
    }

    fn service<'s>(backend: FakeBackend, store: &'s Store) -> SyncService<'s, FakeBackend> {
        SyncService::new(backend, store, "kiosk-1".into(), "Front door".into())
    }

    #[test]
    fn test_partial_upload_leaves_rejected_rows_pending() {
        let (store, user_id) = store_with_user("12345678", vec![vec![0.1]]);
        for ts in 1..=5 {
            store.insert_attendance(&pending_attendance(user_id, ts)).unwrap();
        }

        let backend = FakeBackend::default();
        backend.reject_timestamps.lock().unwrap().extend([2i64, 4]);
        let svc = service(backend, &store);

        let report = svc.full_sync();
        assert_eq!(report.uploaded, 3);
        assert!(!report.success, "rejected records fail the attendance phase");

        let pending = store.list_unsynced_attendance().unwrap();
        let pending_ts: Vec<i64> = pending.iter().map(|r| r.timestamp_ms).collect();
        assert_eq!(pending_ts, vec![2, 4]);
    }

    #[test]
    fn test_repeat_sync_skips_already_synced_rows() {
        let (store, user_id) = store_with_user("12345678", vec![vec![0.1]]);
        for ts in 1..=5 {
            store.insert_attendance(&pending_attendance(user_id, ts)).unwrap();
        }

        let backend = FakeBackend::default();
        backend.reject_timestamps.lock().unwrap().extend([2i64, 4]);
        let svc = service(backend, &store);

        svc.full_sync();
        // The server recovers; only the two pending rows may be retried.
        svc.backend.reject_timestamps.lock().unwrap().clear();
        let report = svc.full_sync();

        assert_eq!(report.uploaded, 2);
        assert!(report.success);
        assert!(store.list_unsynced_attendance().unwrap().is_empty());

        // 3 accepted in cycle one + 2 in cycle two; never a re-send.
        let pushed = svc.backend.pushed.lock().unwrap();
        assert_eq!(pushed.len(), 5);
    }

    #[test]
    fn test_remote_descriptors_win_and_get_reuploaded() {
        let (store, _) = store_with_user("12345678", vec![vec![0.1, 0.2]]);
        let remote = vec![vec![0.9f32, 0.8]];

        let backend = FakeBackend {
            remote_employees: vec![EmployeeRow {
                name: "Ana Maria".into(),
                dni: "12345678".into(),
                email: None,
                phone: None,
                whatsapp: None,
                pin: None,
                face_descriptors: codec::serialize_set(&remote),
                photos: vec![],
            }],
            ..Default::default()
        };
        let svc = service(backend, &store);
        let report = svc.full_sync();

        assert!(report.success);
        assert_eq!(report.downloaded, 1);

        let local = store.get_user_by_dni("12345678").unwrap().unwrap();
        assert_eq!(local.descriptors, remote);
        assert_eq!(local.name, "Ana Maria");

        // The upload half sends the now-updated row.
        let upserted = svc.backend.upserted.lock().unwrap();
        assert_eq!(upserted.len(), 1);
        assert_eq!(codec::hydrate_set(&upserted[0].face_descriptors).unwrap(), remote);
    }

    #[test]
    fn test_unchanged_remote_row_is_not_rewritten() {
        let descriptors = vec![vec![0.1f32, 0.2]];
        let (store, _) = store_with_user("12345678", descriptors.clone());

        let backend = FakeBackend {
            remote_employees: vec![EmployeeRow {
                name: "Ana".into(),
                dni: "12345678".into(),
                email: None,
                phone: None,
                whatsapp: None,
                pin: None,
                face_descriptors: codec::serialize_set(&descriptors),
                photos: vec![],
            }],
            ..Default::default()
        };
        let report = service(backend, &store).full_sync();
        assert_eq!(report.downloaded, 0);
        assert!(report.success);
    }

    #[test]
    fn test_download_inserts_unseen_dni() {
        let store = Store::open_in_memory().unwrap();
        let backend = FakeBackend {
            remote_employees: vec![EmployeeRow {
                name: "Luis".into(),
                dni: "99".into(),
                email: Some("luis@example.com".into()),
                phone: None,
                whatsapp: None,
                pin: None,
                // Legacy object-with-numeric-keys payload.
                face_descriptors: serde_json::json!([{"0": 0.5, "1": 0.6}]),
                photos: vec![],
            }],
            ..Default::default()
        };
        let report = service(backend, &store).full_sync();
        assert_eq!(report.downloaded, 1);

        let user = store.get_user_by_dni("99").unwrap().unwrap();
        assert_eq!(user.descriptors, vec![vec![0.5, 0.6]]);
        assert_eq!(user.email.as_deref(), Some("luis@example.com"));
    }

    #[test]
    fn test_remote_win_preserves_device_local_fields() {
        let store = Store::open_in_memory().unwrap();
        store
            .insert_user(&UserProfile {
                dni: "12345678".into(),
                name: "Ana".into(),
                sector: Some("Depósito".into()),
                assigned_kiosks: vec!["kiosk-1".into()],
                descriptors: vec![vec![0.1]],
                ..Default::default()
            })
            .unwrap();

        let backend = FakeBackend {
            remote_employees: vec![EmployeeRow {
                name: "Ana".into(),
                dni: "12345678".into(),
                email: None,
                phone: None,
                whatsapp: None,
                pin: None,
                face_descriptors: codec::serialize_set(&[vec![0.7f32]]),
                photos: vec![],
            }],
            ..Default::default()
        };
        service(backend, &store).full_sync();

        let user = store.get_user_by_dni("12345678").unwrap().unwrap();
        assert_eq!(user.descriptors, vec![vec![0.7]]);
        assert_eq!(user.sector.as_deref(), Some("Depósito"));
        assert_eq!(user.assigned_kiosks, vec!["kiosk-1".to_string()]);
    }

    #[test]
    fn test_heartbeat_runs_even_when_phases_fail() {
        let (store, _) = store_with_user("12345678", vec![vec![0.1]]);
        let backend = FakeBackend { fail_fetch: true, ..Default::default() };
        let svc = service(backend, &store);

        let report = svc.full_sync();
        assert!(!report.success);
        // Upload half of the employee phase still ran.
        assert_eq!(svc.backend.upserted.lock().unwrap().len(), 1);
        // And the device announced itself.
        let registered = svc.backend.registered.lock().unwrap();
        assert_eq!(registered.len(), 1);
        assert_eq!(registered[0].kiosk_id, "kiosk-1");
        assert_eq!(registered[0].name, "Front door");
    }

    #[test]
    fn test_connection_verdicts_are_distinct() {
        let store = Store::open_in_memory().unwrap();

        let ok = service(FakeBackend::default(), &store).test_connection();
        assert_eq!(ok, ConnectionVerdict::Reachable { database: Some("postgres".into()) });

        let unauthorized = service(
            FakeBackend { fail_health: Some("401"), ..Default::default() },
            &store,
        )
        .test_connection();
        assert_eq!(unauthorized, ConnectionVerdict::Unauthorized);

        let timed_out = service(
            FakeBackend { fail_health: Some("timeout"), ..Default::default() },
            &store,
        )
        .test_connection();
        assert_eq!(timed_out, ConnectionVerdict::TimedOut);

        let failed = service(
            FakeBackend { fail_health: Some("dns"), ..Default::default() },
            &store,
        )
        .test_connection();
        assert!(matches!(failed, ConnectionVerdict::Unreachable(_)));

        // Each renders a different operator message.
        let messages: HashSet<String> = [&ok, &unauthorized, &timed_out, &failed]
            .iter()
            .map(|v| v.to_string())
            .collect();
        assert_eq!(messages.len(), 4);
    }

    #[test]
    fn test_device_status_passthrough() {
        let store = Store::open_in_memory().unwrap();
        let svc = service(
            FakeBackend { status: Some(DeviceStatus::Blocked), ..Default::default() },
            &store,
        );
        assert_eq!(svc.check_device_status().unwrap(), DeviceStatus::Blocked);
    }
}
