use std::path::PathBuf;

/// Daemon configuration, loaded from environment variables.
///
/// The sync server/key/enabled triple is NOT here: it lives in the store
/// so it can be changed at runtime and survives restarts.
pub struct Config {
    /// V4L2 device path (default: /dev/video0).
    pub camera_device: String,
    /// Directory containing ONNX model files.
    pub model_dir: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: PathBuf,
    /// Operator-facing kiosk name sent with every heartbeat.
    pub kiosk_name: String,
    /// Scan loop cadence in milliseconds.
    pub scan_interval_ms: u64,
    /// Same-identity match suppression window in seconds.
    pub match_cooldown_secs: u64,
    /// Consecutive ambiguous cycles before an unknown-face alert.
    pub unknown_streak: u32,
    /// Minimum gap between unknown-face alerts in seconds.
    pub unknown_alert_gap_secs: u64,
    /// Autosync timer period in seconds.
    pub autosync_interval_secs: u64,
    /// Number of face samples captured per enrollment.
    pub enroll_samples: usize,
}

impl Config {
    /// Load configuration from `PRESENCIA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        let model_dir = std::env::var("PRESENCIA_MODEL_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/usr/share/presencia/models"));

        let data_dir = std::env::var("XDG_DATA_HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
                PathBuf::from(home).join(".local/share")
            })
            .join("presencia");

        let db_path = std::env::var("PRESENCIA_DB_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.join("kiosk.db"));

        Self {
            camera_device: std::env::var("PRESENCIA_CAMERA_DEVICE")
                .unwrap_or_else(|_| "/dev/video0".to_string()),
            model_dir,
            db_path,
            kiosk_name: std::env::var("PRESENCIA_KIOSK_NAME")
                .unwrap_or_else(|_| "Presencia kiosk".to_string()),
            scan_interval_ms: env_u64("PRESENCIA_SCAN_INTERVAL_MS", 250),
            match_cooldown_secs: env_u64("PRESENCIA_MATCH_COOLDOWN_SECS", 5),
            unknown_streak: env_u32("PRESENCIA_UNKNOWN_STREAK", 3),
            unknown_alert_gap_secs: env_u64("PRESENCIA_UNKNOWN_ALERT_GAP_SECS", 10),
            autosync_interval_secs: env_u64("PRESENCIA_AUTOSYNC_INTERVAL_SECS", 300),
            enroll_samples: env_usize("PRESENCIA_ENROLL_SAMPLES", 3),
        }
    }

    /// Path to the face detection model.
    pub fn detector_model_path(&self) -> String {
        self.model_dir
            .join("face_detector.onnx")
            .to_string_lossy()
            .into_owned()
    }

    /// Path to the face embedding model.
    pub fn encoder_model_path(&self) -> String {
        self.model_dir
            .join("face_encoder.onnx")
            .to_string_lossy()
            .into_owned()
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_usize(key: &str, default: usize) -> usize {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
