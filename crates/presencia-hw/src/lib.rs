//! presencia-hw — Kiosk camera capture and frame processing.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, DeviceInfo};
pub use frame::{Frame, FrameError};
