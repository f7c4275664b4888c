use presencia_core::{Descriptor, FaceEngine, FaceSample, ModelPaths};
use presencia_hw::{Camera, Frame};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("camera error: {0}")]
    Camera(#[from] presencia_hw::CameraError),
    #[error("recognition error: {0}")]
    Recognition(#[from] presencia_core::EngineError),
    #[error("no face detected in any captured frame")]
    NoFaceDetected,
    #[error("engine thread exited")]
    ChannelClosed,
}

/// One scan cycle's capture: the frame plus at most one detected face.
pub struct ScanCapture {
    /// `None` when no face cleared the detector threshold (a dark frame
    /// is treated the same way).
    pub sample: Option<FaceSample>,
    pub frame: Frame,
}

/// Result of an enrollment capture sequence.
pub struct EnrollOutcome {
    /// One descriptor per frame in which a face was found.
    pub descriptors: Vec<Descriptor>,
    /// JPEG reference snapshots, parallel to the descriptors.
    pub photos: Vec<Vec<u8>>,
    /// Best detector confidence across the sequence.
    pub quality: f32,
}

/// Messages sent from async handlers to the engine thread.
enum EngineRequest {
    Scan {
        reply: oneshot::Sender<Result<ScanCapture, EngineError>>,
    },
    Enroll {
        samples: usize,
        reply: oneshot::Sender<Result<EnrollOutcome, EngineError>>,
    },
}

/// Clone-safe handle to the engine thread.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::Sender<EngineRequest>,
}

impl EngineHandle {
    /// Capture one frame and run detection + embedding on it.
    pub async fn scan(&self) -> Result<ScanCapture, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Scan { reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }

    /// Capture several frames and extract one descriptor per usable frame.
    pub async fn enroll(&self, samples: usize) -> Result<EnrollOutcome, EngineError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(EngineRequest::Enroll { samples, reply: reply_tx })
            .await
            .map_err(|_| EngineError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
    }
}

/// Spawn the camera + models on a dedicated OS thread.
///
/// Opens the camera and loads both ONNX models synchronously, failing
/// fast at startup if any resource is unavailable, then enters the
/// request loop. Detection never overlaps: the thread serves one
/// request at a time.
pub fn spawn_engine(camera_device: &str, paths: ModelPaths) -> Result<EngineHandle, EngineError> {
    let camera = Camera::open(camera_device)?;
    tracing::info!(
        device = camera_device,
        width = camera.width,
        height = camera.height,
        "camera opened"
    );

    let mut engine = FaceEngine::new(paths);
    engine.load_models()?;

    let (tx, mut rx) = mpsc::channel::<EngineRequest>(4);

    std::thread::Builder::new()
        .name("presencia-engine".into())
        .spawn(move || {
            tracing::info!("engine thread started");
            while let Some(req) = rx.blocking_recv() {
                match req {
                    EngineRequest::Scan { reply } => {
                        let _ = reply.send(run_scan(&camera, &mut engine));
                    }
                    EngineRequest::Enroll { samples, reply } => {
                        let _ = reply.send(run_enroll(&camera, &mut engine, samples));
                    }
                }
            }
            tracing::info!("engine thread exiting");
        })
        .expect("failed to spawn engine thread");

    Ok(EngineHandle { tx })
}

fn run_scan(camera: &Camera, engine: &mut FaceEngine) -> Result<ScanCapture, EngineError> {
    let frame = camera.capture_frame()?;
    if frame.is_dark {
        return Ok(ScanCapture { sample: None, frame });
    }
    let sample = engine.detect_face(&frame.data, frame.width, frame.height)?;
    Ok(ScanCapture { sample, frame })
}

/// Capture frames and keep a descriptor per frame with a face. Multiple
/// samples become multiple reference points in the matcher, never an
/// average.
fn run_enroll(
    camera: &Camera,
    engine: &mut FaceEngine,
    samples: usize,
) -> Result<EnrollOutcome, EngineError> {
    let (frames, dark_skipped) = camera.capture_frames(samples)?;
    tracing::debug!(captured = frames.len(), dark_skipped, "enroll: captured frames");

    let mut descriptors = Vec::new();
    let mut photos = Vec::new();
    let mut quality = 0.0f32;

    for frame in &frames {
        let Some(sample) = engine.detect_face(&frame.data, frame.width, frame.height)? else {
            continue;
        };
        if sample.quality > quality {
            quality = sample.quality;
        }
        if let Ok(jpeg) = frame.to_jpeg() {
            photos.push(jpeg);
        }
        descriptors.push(sample.descriptor);
    }

    if descriptors.is_empty() {
        return Err(EngineError::NoFaceDetected);
    }

    tracing::info!(samples = descriptors.len(), quality, "enroll: captured descriptor set");
    Ok(EnrollOutcome { descriptors, photos, quality })
}
