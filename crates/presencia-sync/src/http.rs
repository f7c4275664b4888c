//! Blocking HTTP implementation of [`RemoteBackend`] over reqwest.
//!
//! The daemon drives sync cycles from `spawn_blocking`, so a blocking
//! client keeps the per-record upload loop sequential and the
//! partial-failure bookkeeping trivial.

use crate::backend::{BackendError, DeviceStatus, RemoteBackend};
use crate::wire::{
    AttendanceAck, AttendanceUpload, DeviceRegistration, DeviceStatusResponse, EmployeeRow,
    HealthResponse,
};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
/// Health probes abort hard after this long so the operator gets a
/// prompt verdict.
const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_key: String,
}

impl HttpBackend {
    /// Backend for regular sync traffic.
    pub fn new(server_url: &str, api_key: &str) -> Result<Self, BackendError> {
        Self::with_timeout(server_url, api_key, REQUEST_TIMEOUT)
    }

    /// Short-fuse backend for `test_connection`: self-aborts after 5s.
    pub fn probe(server_url: &str, api_key: &str) -> Result<Self, BackendError> {
        Self::with_timeout(server_url, api_key, PROBE_TIMEOUT)
    }

    fn with_timeout(server_url: &str, api_key: &str, timeout: Duration) -> Result<Self, BackendError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT.min(timeout))
            .timeout(timeout)
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            base_url: server_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Bearer auth on every endpoint when a key is configured.
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        if self.api_key.is_empty() {
            request
        } else {
            request.bearer_auth(&self.api_key)
        }
    }

    fn check(response: Response) -> Result<Response, BackendError> {
        match response.status() {
            StatusCode::UNAUTHORIZED => Err(BackendError::Unauthorized),
            status if !status.is_success() => Err(BackendError::Status { status: status.as_u16() }),
            _ => Ok(response),
        }
    }

    fn transport(error: reqwest::Error) -> BackendError {
        if error.is_timeout() {
            BackendError::TimedOut
        } else {
            BackendError::Transport(error.to_string())
        }
    }
}

impl RemoteBackend for HttpBackend {
    fn health(&self) -> Result<HealthResponse, BackendError> {
        let response = self
            .authorize(self.client.get(self.url("/api/health")))
            .send()
            .map_err(Self::transport)?;
        Self::check(response)?.json().map_err(Self::transport)
    }

    fn fetch_employees(&self) -> Result<Vec<EmployeeRow>, BackendError> {
        let response = self
            .authorize(self.client.get(self.url("/api/employees")))
            .send()
            .map_err(Self::transport)?;
        Self::check(response)?.json().map_err(Self::transport)
    }

    fn upsert_employee(&self, row: &EmployeeRow) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client.post(self.url("/api/employees")).json(row))
            .send()
            .map_err(Self::transport)?;
        Self::check(response)?;
        Ok(())
    }

    fn push_attendance(&self, upload: &AttendanceUpload) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client.post(self.url("/api/attendance")).json(upload))
            .send()
            .map_err(Self::transport)?;
        let ack: AttendanceAck = Self::check(response)?.json().map_err(Self::transport)?;
        if !ack.success {
            return Err(BackendError::Transport("server did not acknowledge the record".into()));
        }
        Ok(())
    }

    fn register_device(&self, registration: &DeviceRegistration) -> Result<(), BackendError> {
        let response = self
            .authorize(self.client.post(self.url("/api/devices/register")).json(registration))
            .send()
            .map_err(Self::transport)?;
        Self::check(response)?;
        Ok(())
    }

    fn device_status(&self, kiosk_id: &str) -> Result<DeviceStatus, BackendError> {
        let response = self
            .authorize(self.client.get(self.url(&format!("/api/devices/check/{kiosk_id}"))))
            .send()
            .map_err(Self::transport)?;

        // An unknown kiosk is a domain answer, not a failure.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(DeviceStatus::Unregistered);
        }
        let body: DeviceStatusResponse = Self::check(response)?.json().map_err(Self::transport)?;
        Ok(DeviceStatus::parse(&body.status))
    }
}
