use serde::{Deserialize, Serialize};

/// Attendance event kind with its stable integer mirror (1..=5).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceKind {
    Entrada,
    Salida,
    EntradaDescanso,
    SalidaDescanso,
    Falta,
}

impl AttendanceKind {
    pub fn kind_id(self) -> i64 {
        match self {
            AttendanceKind::Entrada => 1,
            AttendanceKind::Salida => 2,
            AttendanceKind::EntradaDescanso => 3,
            AttendanceKind::SalidaDescanso => 4,
            AttendanceKind::Falta => 5,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AttendanceKind::Entrada => "Entrada",
            AttendanceKind::Salida => "Salida",
            AttendanceKind::EntradaDescanso => "Entrada Descanso",
            AttendanceKind::SalidaDescanso => "Salida Descanso",
            AttendanceKind::Falta => "Falta",
        }
    }

    pub fn from_id(id: i64) -> Option<Self> {
        match id {
            1 => Some(AttendanceKind::Entrada),
            2 => Some(AttendanceKind::Salida),
            3 => Some(AttendanceKind::EntradaDescanso),
            4 => Some(AttendanceKind::SalidaDescanso),
            5 => Some(AttendanceKind::Falta),
            _ => None,
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Entrada" => Some(AttendanceKind::Entrada),
            "Salida" => Some(AttendanceKind::Salida),
            "Entrada Descanso" => Some(AttendanceKind::EntradaDescanso),
            "Salida Descanso" => Some(AttendanceKind::SalidaDescanso),
            "Falta" => Some(AttendanceKind::Falta),
            _ => None,
        }
    }
}

/// An enrolled identity as stored locally.
///
/// `id` is device-local and never travels; `dni` is the reconciliation key.
#[derive(Debug, Clone)]
pub struct User {
    pub id: i64,
    pub dni: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub pin: Option<String>,
    pub sector: Option<String>,
    pub role: Option<String>,
    pub tenant_id: Option<String>,
    /// Empty list means the user may clock in on any kiosk.
    pub assigned_kiosks: Vec<String>,
    pub false_positives: i64,
    /// One fixed-length vector per captured sample; never empty for a
    /// usable profile.
    pub descriptors: Vec<Vec<f32>>,
    /// Base64 JPEG reference photos, parallel to the samples, best-effort.
    pub photos: Vec<String>,
}

/// Field set for inserting or overwriting a user row.
#[derive(Debug, Clone, Default)]
pub struct UserProfile {
    pub dni: String,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub whatsapp: Option<String>,
    pub pin: Option<String>,
    pub sector: Option<String>,
    pub role: Option<String>,
    pub tenant_id: Option<String>,
    pub assigned_kiosks: Vec<String>,
    pub descriptors: Vec<Vec<f32>>,
    pub photos: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AttendanceRecord {
    pub id: i64,
    pub user_id: i64,
    /// Snapshot of the user at write time; authoritative for history even
    /// if the user row later changes.
    pub user_name: String,
    pub user_dni: String,
    pub kind: AttendanceKind,
    /// Event time, not insertion time.
    pub timestamp_ms: i64,
    pub photo: Option<Vec<u8>>,
    pub synced: bool,
    pub kiosk_id: String,
    /// Client-generated idempotency key sent with every upload.
    pub client_uuid: String,
    pub notes: Option<String>,
    pub observation: Option<String>,
    pub modified_at: Option<i64>,
    pub modified_by: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewAttendance {
    pub user_id: i64,
    pub user_name: String,
    pub user_dni: String,
    pub kind: AttendanceKind,
    pub timestamp_ms: i64,
    pub photo: Option<Vec<u8>>,
    pub kiosk_id: String,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct UnknownCapture {
    pub id: i64,
    pub timestamp_ms: i64,
    pub photo: Vec<u8>,
    pub kiosk_id: String,
    pub synced: bool,
}

/// Foreign-key surface only; untouched by recognition and sync.
#[derive(Debug, Clone)]
pub struct Shift {
    pub id: i64,
    pub name: String,
    pub starts_at: String,
    pub ends_at: String,
}

/// Persisted sync configuration, mutable at runtime.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub server_url: String,
    pub api_key: String,
    pub enabled: bool,
}

impl SyncConfig {
    /// A server is "configured" only with a non-empty URL.
    pub fn has_server(&self) -> bool {
        !self.server_url.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_id_round_trip() {
        for kind in [
            AttendanceKind::Entrada,
            AttendanceKind::Salida,
            AttendanceKind::EntradaDescanso,
            AttendanceKind::SalidaDescanso,
            AttendanceKind::Falta,
        ] {
            assert_eq!(AttendanceKind::from_id(kind.kind_id()), Some(kind));
            assert_eq!(AttendanceKind::from_label(kind.label()), Some(kind));
        }
    }

    #[test]
    fn test_kind_unknown_id() {
        assert_eq!(AttendanceKind::from_id(0), None);
        assert_eq!(AttendanceKind::from_id(6), None);
    }

    #[test]
    fn test_sync_config_has_server() {
        assert!(!SyncConfig::default().has_server());
        let cfg = SyncConfig { server_url: "http://s".into(), api_key: String::new(), enabled: true };
        assert!(cfg.has_server());
    }
}
