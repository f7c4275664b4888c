//! presencia-store — Embedded local store for kiosk-local operation.
//!
//! Single SQLite database owned by the kiosk process. The scan pipeline
//! appends attendance and unknown-face rows; the sync service rewrites
//! users and flips `synced` flags. Writers are serialized behind one
//! connection mutex.

pub mod models;

pub use models::{
    AttendanceKind, AttendanceRecord, NewAttendance, Shift, SyncConfig, UnknownCapture, User,
    UserProfile,
};

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("an identity with dni {0} already exists")]
    DuplicateDni(String),
    #[error("row not found")]
    NotFound,
    #[error("store mutex poisoned")]
    Poisoned,
    #[error("corrupt json column: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id               INTEGER PRIMARY KEY AUTOINCREMENT,
    dni              TEXT NOT NULL UNIQUE,
    name             TEXT NOT NULL,
    email            TEXT,
    phone            TEXT,
    whatsapp         TEXT,
    pin              TEXT,
    sector           TEXT,
    role             TEXT,
    tenant_id        TEXT,
    assigned_kiosks  TEXT NOT NULL DEFAULT '[]',
    false_positives  INTEGER NOT NULL DEFAULT 0,
    descriptors      TEXT NOT NULL DEFAULT '[]',
    photos           TEXT NOT NULL DEFAULT '[]'
);

CREATE TABLE IF NOT EXISTS attendance (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id       INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    user_name     TEXT NOT NULL,
    user_dni      TEXT NOT NULL,
    kind          TEXT NOT NULL,
    kind_id       INTEGER NOT NULL,
    timestamp_ms  INTEGER NOT NULL,
    photo         BLOB,
    synced        INTEGER NOT NULL DEFAULT 0,
    kiosk_id      TEXT NOT NULL,
    client_uuid   TEXT NOT NULL UNIQUE,
    notes         TEXT,
    observation   TEXT,
    modified_at   INTEGER,
    modified_by   TEXT
);
CREATE INDEX IF NOT EXISTS idx_attendance_synced ON attendance(synced);
CREATE INDEX IF NOT EXISTS idx_attendance_ts ON attendance(timestamp_ms);

CREATE TABLE IF NOT EXISTS unknown_faces (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    timestamp_ms  INTEGER NOT NULL,
    photo         BLOB NOT NULL,
    kiosk_id      TEXT NOT NULL,
    synced        INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE IF NOT EXISTS shifts (
    id         INTEGER PRIMARY KEY AUTOINCREMENT,
    name       TEXT NOT NULL,
    starts_at  TEXT NOT NULL,
    ends_at    TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS settings (
    key    TEXT PRIMARY KEY,
    value  TEXT NOT NULL
);
";

const DEVICE_ID_KEY: &str = "device_id";
const SYNC_CONFIG_KEY: &str = "sync_config";

/// Handle to the kiosk-local database.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (creating if needed) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        Self::from_connection(conn)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // --- users ---

    /// Enroll a new identity. Fails with [`StoreError::DuplicateDni`]
    /// without committing anything when the dni is already taken.
    pub fn insert_user(&self, profile: &UserProfile) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        let taken: Option<i64> = conn
            .query_row("SELECT id FROM users WHERE dni = ?1", params![profile.dni], |row| {
                row.get(0)
            })
            .optional()?;
        if taken.is_some() {
            return Err(StoreError::DuplicateDni(profile.dni.clone()));
        }

        conn.execute(
            "INSERT INTO users (dni, name, email, phone, whatsapp, pin, sector, role, tenant_id,
                                assigned_kiosks, descriptors, photos)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                profile.dni,
                profile.name,
                profile.email,
                profile.phone,
                profile.whatsapp,
                profile.pin,
                profile.sector,
                profile.role,
                profile.tenant_id,
                serde_json::to_string(&profile.assigned_kiosks)?,
                serde_json::to_string(&profile.descriptors)?,
                serde_json::to_string(&profile.photos)?,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Overwrite every profile field of an existing row (re-enrollment,
    /// admin edit, or a remote row winning reconciliation).
    pub fn update_user(&self, id: i64, profile: &UserProfile) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET dni = ?1, name = ?2, email = ?3, phone = ?4, whatsapp = ?5,
                              pin = ?6, sector = ?7, role = ?8, tenant_id = ?9,
                              assigned_kiosks = ?10, descriptors = ?11, photos = ?12
             WHERE id = ?13",
            params![
                profile.dni,
                profile.name,
                profile.email,
                profile.phone,
                profile.whatsapp,
                profile.pin,
                profile.sector,
                profile.role,
                profile.tenant_id,
                serde_json::to_string(&profile.assigned_kiosks)?,
                serde_json::to_string(&profile.descriptors)?,
                serde_json::to_string(&profile.photos)?,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    pub fn get_user(&self, id: i64) -> Result<Option<User>, StoreError> {
        self.query_user("SELECT * FROM users WHERE id = ?1", params![id])
    }

    pub fn get_user_by_dni(&self, dni: &str) -> Result<Option<User>, StoreError> {
        self.query_user("SELECT * FROM users WHERE dni = ?1", params![dni])
    }

    fn query_user(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Option<User>, StoreError> {
        let conn = self.conn()?;
        let user = conn
            .query_row(sql, args, |row| RawUser::from_row(row))
            .optional()?;
        user.map(RawUser::decode).transpose()
    }

    pub fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM users ORDER BY id")?;
        let raw: Vec<RawUser> = stmt
            .query_map([], |row| RawUser::from_row(row))?
            .collect::<Result<_, _>>()?;
        raw.into_iter().map(RawUser::decode).collect()
    }

    /// Delete a user; attendance rows cascade via the foreign key.
    pub fn delete_user(&self, id: i64) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        Ok(conn.execute("DELETE FROM users WHERE id = ?1", params![id])? > 0)
    }

    /// Bump the counter tracking matches the subject rejected.
    pub fn record_false_positive(&self, dni: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET false_positives = false_positives + 1 WHERE dni = ?1",
            params![dni],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    // --- attendance ---

    /// Append one attendance event. The client uuid (server idempotency
    /// key) is generated here, exactly once per row.
    pub fn insert_attendance(&self, new: &NewAttendance) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO attendance (user_id, user_name, user_dni, kind, kind_id, timestamp_ms,
                                     photo, kiosk_id, client_uuid, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.user_id,
                new.user_name,
                new.user_dni,
                new.kind.label(),
                new.kind.kind_id(),
                new.timestamp_ms,
                new.photo,
                new.kiosk_id,
                uuid::Uuid::new_v4().to_string(),
                new.notes,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// All rows the server has not accepted yet, oldest first.
    pub fn list_unsynced_attendance(&self) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.query_attendance(
            "SELECT * FROM attendance WHERE synced = 0 ORDER BY timestamp_ms",
            params![],
        )
    }

    pub fn mark_attendance_synced(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed =
            conn.execute("UPDATE attendance SET synced = 1 WHERE id = ?1", params![id])?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Time-windowed activity view; the UI re-derives "recent" by polling
    /// this query rather than via push eventing.
    pub fn recent_attendance(&self, since_ms: i64) -> Result<Vec<AttendanceRecord>, StoreError> {
        self.query_attendance(
            "SELECT * FROM attendance WHERE timestamp_ms >= ?1 ORDER BY timestamp_ms DESC, id DESC",
            params![since_ms],
        )
    }

    /// Most recent event for a user inside [from_ms, to_ms), used to
    /// toggle Entrada/Salida on consecutive scans.
    pub fn last_attendance_between(
        &self,
        user_id: i64,
        from_ms: i64,
        to_ms: i64,
    ) -> Result<Option<AttendanceRecord>, StoreError> {
        let rows = self.query_attendance(
            "SELECT * FROM attendance
             WHERE user_id = ?1 AND timestamp_ms >= ?2 AND timestamp_ms < ?3
             ORDER BY timestamp_ms DESC, id DESC LIMIT 1",
            params![user_id, from_ms, to_ms],
        )?;
        Ok(rows.into_iter().next())
    }

    /// Manual correction by an admin. Stamps the audit fields and, when
    /// requested, puts the row back in the upload queue.
    pub fn amend_attendance(
        &self,
        id: i64,
        kind: AttendanceKind,
        timestamp_ms: i64,
        observation: Option<&str>,
        modified_by: &str,
        modified_at_ms: i64,
        reset_synced: bool,
    ) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE attendance
             SET kind = ?1, kind_id = ?2, timestamp_ms = ?3, observation = ?4,
                 modified_by = ?5, modified_at = ?6,
                 synced = CASE WHEN ?7 THEN 0 ELSE synced END
             WHERE id = ?8",
            params![
                kind.label(),
                kind.kind_id(),
                timestamp_ms,
                observation,
                modified_by,
                modified_at_ms,
                reset_synced,
                id,
            ],
        )?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn query_attendance(
        &self,
        sql: &str,
        args: impl rusqlite::Params,
    ) -> Result<Vec<AttendanceRecord>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(sql)?;
        let rows = stmt
            .query_map(args, |row| {
                Ok(AttendanceRecord {
                    id: row.get("id")?,
                    user_id: row.get("user_id")?,
                    user_name: row.get("user_name")?,
                    user_dni: row.get("user_dni")?,
                    kind: AttendanceKind::from_id(row.get("kind_id")?)
                        .unwrap_or(AttendanceKind::Entrada),
                    timestamp_ms: row.get("timestamp_ms")?,
                    photo: row.get("photo")?,
                    synced: row.get("synced")?,
                    kiosk_id: row.get("kiosk_id")?,
                    client_uuid: row.get("client_uuid")?,
                    notes: row.get("notes")?,
                    observation: row.get("observation")?,
                    modified_at: row.get("modified_at")?,
                    modified_by: row.get("modified_by")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- unknown faces ---

    pub fn insert_unknown_capture(
        &self,
        timestamp_ms: i64,
        photo: &[u8],
        kiosk_id: &str,
    ) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO unknown_faces (timestamp_ms, photo, kiosk_id) VALUES (?1, ?2, ?3)",
            params![timestamp_ms, photo, kiosk_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_unknown_captures(&self) -> Result<Vec<UnknownCapture>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT * FROM unknown_faces ORDER BY timestamp_ms DESC")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(UnknownCapture {
                    id: row.get("id")?,
                    timestamp_ms: row.get("timestamp_ms")?,
                    photo: row.get("photo")?,
                    kiosk_id: row.get("kiosk_id")?,
                    synced: row.get("synced")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- shifts ---

    pub fn insert_shift(&self, name: &str, starts_at: &str, ends_at: &str) -> Result<i64, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO shifts (name, starts_at, ends_at) VALUES (?1, ?2, ?3)",
            params![name, starts_at, ends_at],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn list_shifts(&self) -> Result<Vec<Shift>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT * FROM shifts ORDER BY id")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(Shift {
                    id: row.get("id")?,
                    name: row.get("name")?,
                    starts_at: row.get("starts_at")?,
                    ends_at: row.get("ends_at")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // --- settings / identity ---

    pub fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        let conn = self.conn()?;
        Ok(conn
            .query_row("SELECT value FROM settings WHERE key = ?1", params![key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }

    /// Stable kiosk identity: generated once, never regenerated unless the
    /// database itself is cleared.
    pub fn device_id(&self) -> Result<String, StoreError> {
        if let Some(id) = self.get_setting(DEVICE_ID_KEY)? {
            return Ok(id);
        }
        let id = uuid::Uuid::new_v4().to_string();
        self.set_setting(DEVICE_ID_KEY, &id)?;
        tracing::info!(kiosk_id = %id, "generated device identity");
        Ok(id)
    }

    pub fn sync_config(&self) -> Result<SyncConfig, StoreError> {
        match self.get_setting(SYNC_CONFIG_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(SyncConfig::default()),
        }
    }

    pub fn set_sync_config(&self, config: &SyncConfig) -> Result<(), StoreError> {
        self.set_setting(SYNC_CONFIG_KEY, &serde_json::to_string(config)?)
    }
}

/// Users row with JSON columns still encoded.
struct RawUser {
    id: i64,
    dni: String,
    name: String,
    email: Option<String>,
    phone: Option<String>,
    whatsapp: Option<String>,
    pin: Option<String>,
    sector: Option<String>,
    role: Option<String>,
    tenant_id: Option<String>,
    assigned_kiosks: String,
    false_positives: i64,
    descriptors: String,
    photos: String,
}

impl RawUser {
    fn from_row(row: &rusqlite::Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            dni: row.get("dni")?,
            name: row.get("name")?,
            email: row.get("email")?,
            phone: row.get("phone")?,
            whatsapp: row.get("whatsapp")?,
            pin: row.get("pin")?,
            sector: row.get("sector")?,
            role: row.get("role")?,
            tenant_id: row.get("tenant_id")?,
            assigned_kiosks: row.get("assigned_kiosks")?,
            false_positives: row.get("false_positives")?,
            descriptors: row.get("descriptors")?,
            photos: row.get("photos")?,
        })
    }

    fn decode(self) -> Result<User, StoreError> {
        Ok(User {
            id: self.id,
            dni: self.dni,
            name: self.name,
            email: self.email,
            phone: self.phone,
            whatsapp: self.whatsapp,
            pin: self.pin,
            sector: self.sector,
            role: self.role,
            tenant_id: self.tenant_id,
            assigned_kiosks: serde_json::from_str(&self.assigned_kiosks)?,
            false_positives: self.false_positives,
            descriptors: serde_json::from_str(&self.descriptors)?,
            photos: serde_json::from_str(&self.photos)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn profile(dni: &str, name: &str) -> UserProfile {
        UserProfile {
            dni: dni.to_string(),
            name: name.to_string(),
            descriptors: vec![vec![0.1, 0.2, 0.3]],
            ..Default::default()
        }
    }

    fn attendance(user_id: i64, dni: &str, ts: i64) -> NewAttendance {
        NewAttendance {
            user_id,
            user_name: "Ana".into(),
            user_dni: dni.into(),
            kind: AttendanceKind::Entrada,
            timestamp_ms: ts,
            photo: None,
            kiosk_id: "kiosk-1".into(),
            notes: None,
        }
    }

    #[test]
    fn test_insert_and_fetch_user() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user(&profile("123", "Ana")).unwrap();
        let user = store.get_user(id).unwrap().unwrap();
        assert_eq!(user.dni, "123");
        assert_eq!(user.descriptors, vec![vec![0.1, 0.2, 0.3]]);
        assert_eq!(user.false_positives, 0);
    }

    #[test]
    fn test_duplicate_dni_rejected() {
        let store = Store::open_in_memory().unwrap();
        store.insert_user(&profile("123", "Ana")).unwrap();
        let err = store.insert_user(&profile("123", "Other")).unwrap_err();
        assert!(matches!(err, StoreError::DuplicateDni(d) if d == "123"));
        // Nothing partially committed.
        assert_eq!(store.list_users().unwrap().len(), 1);
    }

    #[test]
    fn test_delete_user_cascades_attendance() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user(&profile("123", "Ana")).unwrap();
        store.insert_attendance(&attendance(id, "123", 1_000)).unwrap();
        store.insert_attendance(&attendance(id, "123", 2_000)).unwrap();
        assert_eq!(store.recent_attendance(0).unwrap().len(), 2);

        assert!(store.delete_user(id).unwrap());
        assert!(store.recent_attendance(0).unwrap().is_empty());
    }

    #[test]
    fn test_unsynced_flow() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user(&profile("123", "Ana")).unwrap();
        let a = store.insert_attendance(&attendance(id, "123", 1_000)).unwrap();
        let b = store.insert_attendance(&attendance(id, "123", 2_000)).unwrap();

        let pending = store.list_unsynced_attendance().unwrap();
        assert_eq!(pending.len(), 2);
        assert_eq!(pending[0].id, a, "oldest first");

        store.mark_attendance_synced(a).unwrap();
        let pending = store.list_unsynced_attendance().unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, b);
    }

    #[test]
    fn test_client_uuid_unique_per_row() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user(&profile("123", "Ana")).unwrap();
        store.insert_attendance(&attendance(id, "123", 1_000)).unwrap();
        store.insert_attendance(&attendance(id, "123", 2_000)).unwrap();
        let rows = store.recent_attendance(0).unwrap();
        assert_ne!(rows[0].client_uuid, rows[1].client_uuid);
        assert!(!rows[0].client_uuid.is_empty());
    }

    #[test]
    fn test_recent_attendance_window() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user(&profile("123", "Ana")).unwrap();
        store.insert_attendance(&attendance(id, "123", 1_000)).unwrap();
        store.insert_attendance(&attendance(id, "123", 5_000)).unwrap();
        let recent = store.recent_attendance(2_000).unwrap();
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].timestamp_ms, 5_000);
    }

    #[test]
    fn test_last_attendance_between() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user(&profile("123", "Ana")).unwrap();
        store.insert_attendance(&attendance(id, "123", 1_000)).unwrap();
        let mut salida = attendance(id, "123", 2_000);
        salida.kind = AttendanceKind::Salida;
        store.insert_attendance(&salida).unwrap();

        let last = store.last_attendance_between(id, 0, 10_000).unwrap().unwrap();
        assert_eq!(last.kind, AttendanceKind::Salida);
        assert!(store.last_attendance_between(id, 3_000, 10_000).unwrap().is_none());
    }

    #[test]
    fn test_amend_attendance_resets_sync_flag() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user(&profile("123", "Ana")).unwrap();
        let a = store.insert_attendance(&attendance(id, "123", 1_000)).unwrap();
        store.mark_attendance_synced(a).unwrap();

        store
            .amend_attendance(a, AttendanceKind::Falta, 1_500, Some("olvido"), "admin", 9_000, true)
            .unwrap();

        let row = &store.recent_attendance(0).unwrap()[0];
        assert_eq!(row.kind, AttendanceKind::Falta);
        assert_eq!(row.observation.as_deref(), Some("olvido"));
        assert_eq!(row.modified_by.as_deref(), Some("admin"));
        assert!(!row.synced);
    }

    #[test]
    fn test_false_positive_counter() {
        let store = Store::open_in_memory().unwrap();
        store.insert_user(&profile("123", "Ana")).unwrap();
        store.record_false_positive("123").unwrap();
        store.record_false_positive("123").unwrap();
        let user = store.get_user_by_dni("123").unwrap().unwrap();
        assert_eq!(user.false_positives, 2);
        assert!(matches!(store.record_false_positive("999"), Err(StoreError::NotFound)));
    }

    #[test]
    fn test_unknown_capture_append() {
        let store = Store::open_in_memory().unwrap();
        store.insert_unknown_capture(1_000, &[1, 2, 3], "kiosk-1").unwrap();
        let captures = store.list_unknown_captures().unwrap();
        assert_eq!(captures.len(), 1);
        assert_eq!(captures[0].photo, vec![1, 2, 3]);
        assert!(!captures[0].synced);
    }

    #[test]
    fn test_device_id_stable() {
        let store = Store::open_in_memory().unwrap();
        let first = store.device_id().unwrap();
        let second = store.device_id().unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 36);
    }

    #[test]
    fn test_sync_config_round_trip() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.sync_config().unwrap(), SyncConfig::default());

        let cfg = SyncConfig {
            server_url: "http://server:3000".into(),
            api_key: "secret".into(),
            enabled: true,
        };
        store.set_sync_config(&cfg).unwrap();
        assert_eq!(store.sync_config().unwrap(), cfg);
    }

    #[test]
    fn test_update_user_replaces_descriptors() {
        let store = Store::open_in_memory().unwrap();
        let id = store.insert_user(&profile("123", "Ana")).unwrap();
        let mut p = profile("123", "Ana Maria");
        p.descriptors = vec![vec![0.9; 4], vec![0.8; 4]];
        store.update_user(id, &p).unwrap();

        let user = store.get_user(id).unwrap().unwrap();
        assert_eq!(user.name, "Ana Maria");
        assert_eq!(user.descriptors.len(), 2);
    }

    #[test]
    fn test_shift_surface() {
        let store = Store::open_in_memory().unwrap();
        store.insert_shift("Turno Mañana", "08:00", "16:00").unwrap();
        let shifts = store.list_shifts().unwrap();
        assert_eq!(shifts.len(), 1);
        assert_eq!(shifts[0].name, "Turno Mañana");
    }
}
