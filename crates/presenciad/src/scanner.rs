//! Async driver for the decision pipeline: fixed-cadence scan loop,
//! gate check, and the store side effects for each event.

use crate::engine::EngineHandle;
use crate::gate::KioskGate;
use crate::pipeline::{observation_for, Observation, ScanEvent, ScanPipeline, ScanPolicy};
use anyhow::Context as _;
use presencia_core::FaceMatcher;
use presencia_hw::Frame;
use presencia_store::{AttendanceKind, NewAttendance, Store};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tokio::time::MissedTickBehavior;

pub struct Scanner {
    pub store: Arc<Store>,
    pub matcher: Arc<RwLock<FaceMatcher>>,
    pub engine: EngineHandle,
    pub gate: Arc<KioskGate>,
    pub kiosk_id: String,
}

/// Scan forever at the configured cadence.
///
/// `MissedTickBehavior::Skip` gives the no-overlap guarantee: a cycle
/// that overruns simply swallows the ticks it missed. Any cycle error
/// is logged and the loop continues; a bad frame never ends the session.
pub async fn run_scan_loop(scanner: Scanner, policy: ScanPolicy, interval_ms: u64) {
    let mut interval = tokio::time::interval(Duration::from_millis(interval_ms));
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut pipeline = ScanPipeline::new(policy);

    loop {
        interval.tick().await;
        if !scanner.gate.allows_scanning() {
            continue;
        }
        if let Err(error) = scan_cycle(&scanner, &mut pipeline).await {
            tracing::warn!(%error, "scan cycle failed; continuing");
        }
    }
}

async fn scan_cycle(scanner: &Scanner, pipeline: &mut ScanPipeline) -> anyhow::Result<()> {
    let capture = scanner.engine.scan().await?;

    let observation = match &capture.sample {
        None => Observation::NoFace,
        Some(sample) => {
            let outcome = {
                let matcher = scanner.matcher.read().unwrap_or_else(|e| e.into_inner());
                matcher.classify(&sample.descriptor)
            };
            observation_for(outcome)
        }
    };

    match pipeline.observe(&observation, Instant::now()) {
        Some(ScanEvent::Match { dni, distance, confidence }) => {
            record_match(&scanner.store, &scanner.kiosk_id, &capture.frame, &dni, distance, confidence)?;
        }
        Some(ScanEvent::Unknown) => {
            let photo = capture.frame.to_jpeg()?;
            scanner.store.insert_unknown_capture(
                chrono::Utc::now().timestamp_millis(),
                &photo,
                &scanner.kiosk_id,
            )?;
            tracing::info!("unknown face captured");
        }
        None => {}
    }
    Ok(())
}

/// Write the attendance row for a fired match: denormalized user
/// snapshot, event-time timestamp, frame photo, auto-toggled kind.
fn record_match(
    store: &Store,
    kiosk_id: &str,
    frame: &Frame,
    dni: &str,
    distance: f32,
    confidence: u8,
) -> anyhow::Result<()> {
    let user = store
        .get_user_by_dni(dni)?
        .with_context(|| format!("matched dni {dni} has no local row"))?;

    let now = chrono::Local::now();
    let now_ms = now.timestamp_millis();
    let since_midnight = now.time().signed_duration_since(chrono::NaiveTime::MIN);
    let day_start_ms = now_ms - since_midnight.num_milliseconds();

    let last = store.last_attendance_between(user.id, day_start_ms, now_ms + 1)?;
    let kind = next_kind(last.map(|record| record.kind));

    store.insert_attendance(&NewAttendance {
        user_id: user.id,
        user_name: user.name.clone(),
        user_dni: user.dni.clone(),
        kind,
        timestamp_ms: now_ms,
        photo: frame.to_jpeg().ok(),
        kiosk_id: kiosk_id.to_string(),
        notes: None,
    })?;

    // The UI layer picks this up for the confirmation screen and the
    // success chime.
    tracing::info!(
        dni,
        name = %user.name,
        kind = kind.label(),
        confidence,
        distance,
        "match fired; attendance recorded"
    );
    Ok(())
}

/// Auto mode toggles against the user's last event of the day; break
/// kinds pair up, everything else starts a new Entrada.
pub fn next_kind(last: Option<AttendanceKind>) -> AttendanceKind {
    match last {
        Some(AttendanceKind::Entrada) => AttendanceKind::Salida,
        Some(AttendanceKind::EntradaDescanso) => AttendanceKind::SalidaDescanso,
        _ => AttendanceKind::Entrada,
    }
}
