//! Frame type and image processing — YUYV conversion, dark detection,
//! JPEG snapshot encoding.

use std::io::Cursor;

/// A captured grayscale camera frame.
#[derive(Clone)]
pub struct Frame {
    /// Grayscale pixel data (width * height bytes).
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: std::time::Instant,
    pub sequence: u32,
    pub is_dark: bool,
}

impl Frame {
    /// Average pixel brightness (0.0–255.0).
    pub fn avg_brightness(&self) -> f32 {
        if self.data.is_empty() {
            return 0.0;
        }
        self.data.iter().map(|&b| b as f32).sum::<f32>() / self.data.len() as f32
    }

    /// Encode the frame as a JPEG snapshot for attendance/audit records.
    pub fn to_jpeg(&self) -> Result<Vec<u8>, FrameError> {
        let img = image::GrayImage::from_raw(self.width, self.height, self.data.clone())
            .ok_or(FrameError::InvalidDimensions { width: self.width, height: self.height })?;
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Jpeg)
            .map_err(|e| FrameError::EncodeFailed(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

/// Convert packed YUYV (4:2:2) to grayscale by extracting the Y channel.
///
/// YUYV packs two pixels per 4 bytes: [Y0, U, Y1, V].
pub fn yuyv_to_grayscale(yuyv: &[u8], width: u32, height: u32) -> Result<Vec<u8>, FrameError> {
    let expected = (width * height * 2) as usize;
    if yuyv.len() < expected {
        return Err(FrameError::InvalidLength { expected, actual: yuyv.len() });
    }
    Ok(yuyv[..expected].iter().step_by(2).copied().collect())
}

/// Decode an MJPG buffer to grayscale.
pub fn mjpg_to_grayscale(buf: &[u8]) -> Result<Vec<u8>, FrameError> {
    let img = image::load_from_memory_with_format(buf, image::ImageFormat::Jpeg)
        .map_err(|e| FrameError::DecodeFailed(e.to_string()))?;
    Ok(img.to_luma8().into_raw())
}

/// True when more than `threshold_pct` of pixels sit in the darkest band.
///
/// A kiosk with its camera covered or in a dark room produces frames the
/// detector will hallucinate on; they are skipped upstream.
pub fn is_dark_frame(gray: &[u8], threshold_pct: f32) -> bool {
    if gray.is_empty() {
        return true;
    }
    let dark_count = gray.iter().filter(|&&p| p < 32).count();
    (dark_count as f32 / gray.len() as f32) > threshold_pct
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid YUYV length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
    #[error("JPEG decode failed: {0}")]
    DecodeFailed(String),
    #[error("JPEG encode failed: {0}")]
    EncodeFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_yuyv_to_grayscale() {
        // 2x1 image: [Y0=100, U=128, Y1=200, V=128]
        let yuyv = vec![100, 128, 200, 128];
        let gray = yuyv_to_grayscale(&yuyv, 2, 1).unwrap();
        assert_eq!(gray, vec![100, 200]);
    }

    #[test]
    fn test_yuyv_invalid_length() {
        let yuyv = vec![100, 128];
        assert!(yuyv_to_grayscale(&yuyv, 2, 1).is_err());
    }

    #[test]
    fn test_dark_frame_all_black() {
        assert!(is_dark_frame(&vec![0u8; 1000], 0.95));
    }

    #[test]
    fn test_dark_frame_normal() {
        assert!(!is_dark_frame(&vec![128u8; 1000], 0.95));
    }

    #[test]
    fn test_dark_frame_empty() {
        assert!(is_dark_frame(&[], 0.95));
    }

    #[test]
    fn test_dark_frame_borderline_bright() {
        // 94% dark, 6% bright: not dark.
        let mut gray = vec![10u8; 940];
        gray.extend(vec![128u8; 60]);
        assert!(!is_dark_frame(&gray, 0.95));
    }

    #[test]
    fn test_jpeg_snapshot_round_trip() {
        let frame = Frame {
            data: vec![200u8; 32 * 24],
            width: 32,
            height: 24,
            timestamp: std::time::Instant::now(),
            sequence: 0,
            is_dark: false,
        };
        let jpeg = frame.to_jpeg().unwrap();
        // JPEG SOI marker
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
        let gray = mjpg_to_grayscale(&jpeg).unwrap();
        assert_eq!(gray.len(), 32 * 24);
    }

    #[test]
    fn test_jpeg_invalid_dimensions() {
        let frame = Frame {
            data: vec![0u8; 4],
            width: 100,
            height: 100,
            timestamp: std::time::Instant::now(),
            sequence: 0,
            is_dark: true,
        };
        assert!(frame.to_jpeg().is_err());
    }
}
