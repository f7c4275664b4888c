//! Face detector via ONNX Runtime.
//!
//! Wraps a lightweight single-shot detector (Ultra-Light-Fast RFB-320
//! export) producing per-anchor scores and normalized corner boxes, with
//! NMS post-processing. One kiosk camera, near-frontal subjects: the
//! highest-confidence box is all downstream code consumes.

use crate::imaging;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const DETECTOR_INPUT_W: usize = 320;
const DETECTOR_INPUT_H: usize = 240;
const DETECTOR_MEAN: f32 = 127.0;
const DETECTOR_STD: f32 = 128.0;
const DETECTOR_CONFIDENCE_THRESHOLD: f32 = 0.7;
const DETECTOR_NMS_THRESHOLD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// A detected face in frame pixel coordinates.
#[derive(Debug, Clone)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    /// Detector confidence in [0, 1].
    pub confidence: f32,
}

/// ONNX face detector session plus discovered output ordering.
pub struct FaceDetector {
    session: Session,
    scores_idx: usize,
    boxes_idx: usize,
}

impl FaceDetector {
    /// Load the detector model from the given path.
    pub fn load(model_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "detector model requires 2 outputs (scores, boxes), got {}",
                output_names.len()
            )));
        }
        let (scores_idx, boxes_idx) = discover_output_indices(&output_names);

        tracing::info!(
            path = model_path,
            outputs = ?output_names,
            scores_idx,
            boxes_idx,
            "loaded face detector model"
        );

        Ok(Self { session, scores_idx, boxes_idx })
    }

    /// Detect faces in a grayscale frame, sorted by descending confidence.
    pub fn detect(
        &mut self,
        frame: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<FaceBox>, DetectorError> {
        let input = preprocess(frame, width as usize, height as usize);

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, scores) = outputs[self.scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;
        let (_, boxes) = outputs[self.boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;

        let candidates = decode_detections(
            scores,
            boxes,
            width as f32,
            height as f32,
            DETECTOR_CONFIDENCE_THRESHOLD,
        );

        let mut result = nms(candidates, DETECTOR_NMS_THRESHOLD);
        result.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(result)
    }
}

/// Discover the (scores, boxes) output slots by name, falling back to
/// positional order when the export uses generic tensor names.
fn discover_output_indices(names: &[String]) -> (usize, usize) {
    let scores = names.iter().position(|n| n == "scores");
    let boxes = names.iter().position(|n| n == "boxes");
    match (scores, boxes) {
        (Some(s), Some(b)) => (s, b),
        _ => (0, 1),
    }
}

/// Squash the frame to the model input size and build a normalized NCHW
/// tensor, replicating the grayscale channel.
fn preprocess(frame: &[u8], width: usize, height: usize) -> Array4<f32> {
    let resized = imaging::resize_bilinear(frame, width, height, DETECTOR_INPUT_W, DETECTOR_INPUT_H);

    let mut tensor = Array4::<f32>::zeros((1, 3, DETECTOR_INPUT_H, DETECTOR_INPUT_W));
    for y in 0..DETECTOR_INPUT_H {
        for x in 0..DETECTOR_INPUT_W {
            let normalized =
                (resized[y * DETECTOR_INPUT_W + x] as f32 - DETECTOR_MEAN) / DETECTOR_STD;
            tensor[[0, 0, y, x]] = normalized;
            tensor[[0, 1, y, x]] = normalized;
            tensor[[0, 2, y, x]] = normalized;
        }
    }
    tensor
}

/// Decode per-anchor outputs into frame-space boxes.
///
/// `scores` holds [background, face] pairs per anchor; `boxes` holds
/// normalized [x1, y1, x2, y2] corners per anchor.
fn decode_detections(
    scores: &[f32],
    boxes: &[f32],
    frame_w: f32,
    frame_h: f32,
    threshold: f32,
) -> Vec<FaceBox> {
    let num_anchors = scores.len() / 2;
    let mut detections = Vec::new();

    for idx in 0..num_anchors {
        let confidence = scores[idx * 2 + 1];
        if confidence <= threshold {
            continue;
        }
        let off = idx * 4;
        if off + 3 >= boxes.len() {
            break;
        }

        let x1 = boxes[off] * frame_w;
        let y1 = boxes[off + 1] * frame_h;
        let x2 = boxes[off + 2] * frame_w;
        let y2 = boxes[off + 3] * frame_h;
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        detections.push(FaceBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: confidence.clamp(0.0, 1.0),
        });
    }

    detections
}

fn iou(a: &FaceBox, b: &FaceBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

/// Greedy non-maximum suppression, highest confidence first.
fn nms(mut detections: Vec<FaceBox>, threshold: f32) -> Vec<FaceBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut kept: Vec<FaceBox> = Vec::new();
    for det in detections {
        if kept.iter().all(|k| iou(k, &det) <= threshold) {
            kept.push(det);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_box(x: f32, y: f32, w: f32, h: f32, conf: f32) -> FaceBox {
        FaceBox { x, y, width: w, height: h, confidence: conf }
    }

    #[test]
    fn test_decode_scales_to_frame() {
        // One anchor above threshold covering the center quarter.
        let scores = vec![0.1, 0.9];
        let boxes = vec![0.25, 0.25, 0.75, 0.75];
        let dets = decode_detections(&scores, &boxes, 640.0, 480.0, 0.7);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].x - 160.0).abs() < 1e-3);
        assert!((dets[0].y - 120.0).abs() < 1e-3);
        assert!((dets[0].width - 320.0).abs() < 1e-3);
        assert!((dets[0].height - 240.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_skips_below_threshold() {
        let scores = vec![0.8, 0.2, 0.1, 0.9];
        let boxes = vec![0.0, 0.0, 0.5, 0.5, 0.5, 0.5, 1.0, 1.0];
        let dets = decode_detections(&scores, &boxes, 100.0, 100.0, 0.7);
        assert_eq!(dets.len(), 1);
        assert!((dets[0].x - 50.0).abs() < 1e-3);
    }

    #[test]
    fn test_decode_rejects_degenerate_box() {
        let scores = vec![0.0, 0.95];
        let boxes = vec![0.6, 0.6, 0.4, 0.4]; // inverted corners
        let dets = decode_detections(&scores, &boxes, 100.0, 100.0, 0.7);
        assert!(dets.is_empty());
    }

    #[test]
    fn test_nms_suppresses_overlap() {
        let dets = vec![
            make_box(0.0, 0.0, 100.0, 100.0, 0.9),
            make_box(5.0, 5.0, 100.0, 100.0, 0.8),
            make_box(200.0, 200.0, 50.0, 50.0, 0.75),
        ];
        let kept = nms(dets, 0.5);
        assert_eq!(kept.len(), 2);
        assert!((kept[0].confidence - 0.9).abs() < 1e-6);
        assert!((kept[1].confidence - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_disjoint() {
        let dets = vec![
            make_box(0.0, 0.0, 10.0, 10.0, 0.9),
            make_box(50.0, 50.0, 10.0, 10.0, 0.8),
        ];
        assert_eq!(nms(dets, 0.5).len(), 2);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(vec![], 0.5).is_empty());
    }

    #[test]
    fn test_iou_identical() {
        let a = make_box(0.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_discover_output_indices_named() {
        let names = vec!["boxes".to_string(), "scores".to_string()];
        assert_eq!(discover_output_indices(&names), (1, 0));
    }

    #[test]
    fn test_discover_output_indices_positional_fallback() {
        let names = vec!["437".to_string(), "438".to_string()];
        assert_eq!(discover_output_indices(&names), (0, 1));
    }

    #[test]
    fn test_preprocess_shape_and_normalization() {
        let frame = vec![127u8; 64 * 48];
        let tensor = preprocess(&frame, 64, 48);
        assert_eq!(tensor.shape(), &[1, 3, DETECTOR_INPUT_H, DETECTOR_INPUT_W]);
        // 127 is the model mean: normalizes to 0.0 on every channel.
        assert!(tensor[[0, 0, 0, 0]].abs() < 1e-6);
        assert_eq!(tensor[[0, 1, 10, 10]], tensor[[0, 2, 10, 10]]);
    }
}
