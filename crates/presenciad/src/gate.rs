//! Kiosk-side enforcement of the server's device moderation verdict.

use presencia_sync::DeviceStatus;
use std::sync::RwLock;

/// Effective gate state. `Offline` means no server is configured at
/// all, in which case local-only operation is fully permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Offline,
    Approved,
    Pending,
    Blocked,
    Unregistered,
}

impl From<DeviceStatus> for GateState {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Approved => GateState::Approved,
            DeviceStatus::Pending => GateState::Pending,
            DeviceStatus::Blocked => GateState::Blocked,
            DeviceStatus::Unregistered => GateState::Unregistered,
        }
    }
}

impl GateState {
    pub fn as_str(self) -> &'static str {
        match self {
            GateState::Offline => "offline",
            GateState::Approved => "approved",
            GateState::Pending => "pending",
            GateState::Blocked => "blocked",
            GateState::Unregistered => "unregistered",
        }
    }
}

/// Shared gate consulted by the scan loop before every cycle.
///
/// A blocked or unresolved state is never bypassed for biometric
/// attendance; a failed status poll keeps the previous verdict.
pub struct KioskGate {
    state: RwLock<GateState>,
}

impl KioskGate {
    pub fn new(initial: GateState) -> Self {
        Self { state: RwLock::new(initial) }
    }

    pub fn state(&self) -> GateState {
        *self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub fn set_status(&self, status: DeviceStatus) {
        let next = GateState::from(status);
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if *state != next {
            tracing::info!(from = state.as_str(), to = next.as_str(), "device gate changed");
        }
        *state = next;
    }

    /// Called when the operator clears the server configuration.
    pub fn set_offline(&self) {
        *self.state.write().unwrap_or_else(|e| e.into_inner()) = GateState::Offline;
    }

    /// Scanning is allowed only offline or when explicitly approved.
    pub fn allows_scanning(&self) -> bool {
        matches!(self.state(), GateState::Offline | GateState::Approved)
    }
}
