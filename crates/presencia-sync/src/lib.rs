//! presencia-sync — Bidirectional reconciliation between the kiosk-local
//! store and a central server over HTTP+JSON.
//!
//! The service owns conflict resolution (remote wins on biometric
//! downloads), client-side idempotency, and the device
//! heartbeat/approval contract. All network I/O sits behind the
//! [`RemoteBackend`] trait; production uses the blocking
//! [`HttpBackend`], tests use an in-memory fake.

pub mod backend;
pub mod codec;
pub mod http;
pub mod service;
pub mod wire;

pub use backend::{BackendError, DeviceStatus, RemoteBackend};
pub use http::HttpBackend;
pub use service::{ConnectionVerdict, SyncReport, SyncService};
