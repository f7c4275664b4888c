//! JSON wire types for the central-server API.
//!
//! Field names mirror the server contract verbatim (camelCase on
//! attendance/device payloads, snake_case `face_descriptors` on employee
//! rows), so these structs are the single source of truth for the
//! protocol shape.

use crate::codec;
use base64::Engine as _;
use presencia_store::{AttendanceRecord, User, UserProfile};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    #[serde(default)]
    pub database: Option<String>,
    /// Web-push VAPID key; transported but unused by the kiosk core.
    #[serde(rename = "publicKey", default)]
    pub public_key: Option<String>,
}

/// Employee row as the server sends and accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmployeeRow {
    pub name: String,
    pub dni: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub whatsapp: Option<String>,
    #[serde(default)]
    pub pin: Option<String>,
    /// Array-of-arrays on the way out; array or numeric-keyed object on
    /// the way in (see [`crate::codec`]).
    #[serde(default)]
    pub face_descriptors: Value,
    #[serde(default)]
    pub photos: Vec<String>,
}

impl EmployeeRow {
    pub fn from_user(user: &User) -> Self {
        Self {
            name: user.name.clone(),
            dni: user.dni.clone(),
            email: user.email.clone(),
            phone: user.phone.clone(),
            whatsapp: user.whatsapp.clone(),
            pin: user.pin.clone(),
            face_descriptors: codec::serialize_set(&user.descriptors),
            photos: user.photos.clone(),
        }
    }

    /// Local profile for an incoming remote row. Device-local fields
    /// (sector, role, tenant, kiosk assignment) are not on the wire and
    /// are preserved by the caller.
    pub fn to_profile(&self, descriptors: Vec<Vec<f32>>) -> UserProfile {
        UserProfile {
            dni: self.dni.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            whatsapp: self.whatsapp.clone(),
            pin: self.pin.clone(),
            descriptors,
            photos: self.photos.clone(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceUpload {
    #[serde(rename = "userId")]
    pub user_id: i64,
    #[serde(rename = "userName")]
    pub user_name: String,
    #[serde(rename = "userDni")]
    pub user_dni: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub type_id: i64,
    /// Event time in milliseconds since epoch.
    pub timestamp: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(rename = "kioskId")]
    pub kiosk_id: String,
    /// Client-generated idempotency key; lets the server drop duplicates
    /// when a manual sync races the autosync timer.
    #[serde(rename = "clientUuid")]
    pub client_uuid: String,
}

impl AttendanceUpload {
    pub fn from_record(record: &AttendanceRecord) -> Self {
        Self {
            user_id: record.user_id,
            user_name: record.user_name.clone(),
            user_dni: record.user_dni.clone(),
            kind: record.kind.label().to_string(),
            type_id: record.kind.kind_id(),
            timestamp: record.timestamp_ms,
            photo: record
                .photo
                .as_ref()
                .map(|bytes| base64::engine::general_purpose::STANDARD.encode(bytes)),
            notes: record.notes.clone(),
            kiosk_id: record.kiosk_id.clone(),
            client_uuid: record.client_uuid.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AttendanceAck {
    #[serde(default)]
    pub success: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRegistration {
    #[serde(rename = "kioskId")]
    pub kiosk_id: String,
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceStatusResponse {
    pub status: String,
}
