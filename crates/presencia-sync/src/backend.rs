//! The remote-server seam: everything the sync service needs from the
//! central API, abstracted so tests can run against an in-memory fake.

use crate::wire::{AttendanceUpload, DeviceRegistration, EmployeeRow, HealthResponse};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    /// 401 — the operator configured a wrong or expired API key.
    #[error("authorization failed (401) — check the configured API key")]
    Unauthorized,
    #[error("request timed out")]
    TimedOut,
    #[error("server returned HTTP {status}")]
    Status { status: u16 },
    #[error("transport error: {0}")]
    Transport(String),
}

/// Moderation verdict for this kiosk from the server-side device registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Approved,
    Pending,
    Blocked,
    Unregistered,
}

impl DeviceStatus {
    pub fn parse(raw: &str) -> Self {
        match raw {
            "approved" => DeviceStatus::Approved,
            "pending" => DeviceStatus::Pending,
            "blocked" => DeviceStatus::Blocked,
            _ => DeviceStatus::Unregistered,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceStatus::Approved => "approved",
            DeviceStatus::Pending => "pending",
            DeviceStatus::Blocked => "blocked",
            DeviceStatus::Unregistered => "unregistered",
        }
    }
}

/// Remote API consumed by the sync service, one method per endpoint.
pub trait RemoteBackend {
    fn health(&self) -> Result<HealthResponse, BackendError>;
    fn fetch_employees(&self) -> Result<Vec<EmployeeRow>, BackendError>;
    fn upsert_employee(&self, row: &EmployeeRow) -> Result<(), BackendError>;
    fn push_attendance(&self, upload: &AttendanceUpload) -> Result<(), BackendError>;
    fn register_device(&self, registration: &DeviceRegistration) -> Result<(), BackendError>;
    fn device_status(&self, kiosk_id: &str) -> Result<DeviceStatus, BackendError>;
}
