//! Engine facade: one detector + one encoder behind an idempotent loader.

use crate::detector::{DetectorError, FaceDetector};
use crate::encoder::{EncoderError, FaceEncoder};
use crate::types::Descriptor;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("models not loaded yet")]
    NotReady,
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("encoder: {0}")]
    Encoder(#[from] EncoderError),
}

/// A single detected face: its embedding and the detector confidence.
#[derive(Debug, Clone)]
pub struct FaceSample {
    pub descriptor: Descriptor,
    /// Detector confidence in [0, 1].
    pub quality: f32,
}

/// Model paths for the detector/encoder pair.
#[derive(Debug, Clone)]
pub struct ModelPaths {
    pub detector: String,
    pub encoder: String,
}

/// Detector + encoder pair with lazy, idempotent model loading.
///
/// Detection calls return [`EngineError::NotReady`] until [`load_models`]
/// has succeeded once; repeat loads are no-ops.
///
/// [`load_models`]: FaceEngine::load_models
pub struct FaceEngine {
    paths: ModelPaths,
    detector: Option<FaceDetector>,
    encoder: Option<FaceEncoder>,
}

impl FaceEngine {
    pub fn new(paths: ModelPaths) -> Self {
        Self { paths, detector: None, encoder: None }
    }

    pub fn is_ready(&self) -> bool {
        self.detector.is_some() && self.encoder.is_some()
    }

    /// Load both models. Idempotent: a ready engine returns immediately.
    pub fn load_models(&mut self) -> Result<(), EngineError> {
        if self.is_ready() {
            return Ok(());
        }
        let detector = FaceDetector::load(&self.paths.detector)?;
        let encoder = FaceEncoder::load(&self.paths.encoder)?;
        self.detector = Some(detector);
        self.encoder = Some(encoder);
        tracing::info!("face engine ready");
        Ok(())
    }

    /// Detect at most one face in a grayscale frame and return its
    /// descriptor with the detector confidence, or `None` when no face
    /// clears the detector threshold.
    pub fn detect_face(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Option<FaceSample>, EngineError> {
        let (detector, encoder) = match (self.detector.as_mut(), self.encoder.as_mut()) {
            (Some(d), Some(e)) => (d, e),
            _ => return Err(EngineError::NotReady),
        };

        let faces = detector.detect(frame, width, height)?;
        let Some(face) = faces.first() else {
            return Ok(None);
        };

        let descriptor = encoder.encode(frame, width, height, face)?;
        Ok(Some(FaceSample { descriptor, quality: face.confidence }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_before_load_is_not_ready() {
        let mut engine = FaceEngine::new(ModelPaths {
            detector: "/nonexistent/det.onnx".into(),
            encoder: "/nonexistent/enc.onnx".into(),
        });
        assert!(!engine.is_ready());
        let err = engine.detect_face(&[0u8; 16], 4, 4).unwrap_err();
        assert!(matches!(err, EngineError::NotReady));
    }

    #[test]
    fn test_load_missing_models_fails_and_stays_not_ready() {
        let mut engine = FaceEngine::new(ModelPaths {
            detector: "/nonexistent/det.onnx".into(),
            encoder: "/nonexistent/enc.onnx".into(),
        });
        assert!(engine.load_models().is_err());
        assert!(!engine.is_ready());
    }
}
