//! Face embedding encoder via ONNX Runtime.
//!
//! Crops the detected box (with margin), resizes to the model input and
//! extracts an L2-normalized embedding. MobileFaceNet-class exports emit
//! 128 dimensions; downstream code only assumes a fixed, non-empty length.

use crate::detector::FaceBox;
use crate::imaging;
use crate::types::Descriptor;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ENCODER_INPUT_SIZE: usize = 112;
const ENCODER_MEAN: f32 = 127.5;
const ENCODER_STD: f32 = 127.5;
/// Box margin as a fraction of the box size, context for chin/forehead.
const ENCODER_CROP_MARGIN: f32 = 0.15;

#[derive(Error, Debug)]
pub enum EncoderError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("model produced an empty embedding")]
    EmptyEmbedding,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// ONNX embedding encoder session.
pub struct FaceEncoder {
    session: Session,
}

impl FaceEncoder {
    /// Load the encoder model from the given path.
    pub fn load(model_path: &str) -> Result<Self, EncoderError> {
        if !Path::new(model_path).exists() {
            return Err(EncoderError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded face encoder model"
        );

        Ok(Self { session })
    }

    /// Extract a descriptor for one detected face in a grayscale frame.
    pub fn encode(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
        face: &FaceBox,
    ) -> Result<Descriptor, EncoderError> {
        let input = preprocess(frame, width as usize, height as usize, face);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| EncoderError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.is_empty() {
            return Err(EncoderError::EmptyEmbedding);
        }

        Ok(Descriptor::new(l2_normalize(raw)))
    }
}

/// Crop the face box with margin and build a normalized NCHW tensor.
fn preprocess(frame: &[u8], width: usize, height: usize, face: &FaceBox) -> Array4<f32> {
    let margin_x = face.width * ENCODER_CROP_MARGIN;
    let margin_y = face.height * ENCODER_CROP_MARGIN;
    let (cropped, cw, ch) = imaging::crop(
        frame,
        width,
        height,
        (face.x - margin_x).round() as i32,
        (face.y - margin_y).round() as i32,
        (face.width + 2.0 * margin_x).round().max(1.0) as u32,
        (face.height + 2.0 * margin_y).round().max(1.0) as u32,
    );
    let resized = imaging::resize_bilinear(&cropped, cw, ch, ENCODER_INPUT_SIZE, ENCODER_INPUT_SIZE);

    let size = ENCODER_INPUT_SIZE;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..size {
        for x in 0..size {
            let normalized = (resized[y * size + x] as f32 - ENCODER_MEAN) / ENCODER_STD;
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }
    tensor
}

fn l2_normalize(raw: &[f32]) -> Vec<f32> {
    let norm: f32 = raw.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        raw.iter().map(|x| x / norm).collect()
    } else {
        raw.to_vec()
    }
}
