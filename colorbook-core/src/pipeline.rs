//! Line-art pipeline:
//! bitmap -> fit to canvas -> grayscale (BT.601) -> contrast -> box blur -> Sobel edges

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use image::imageops::{self, FilterType};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::buffer::{try_map_rows, PixelBuffer};
use crate::edge_detect::{edge_row, EdgeParams};
use crate::preprocess::{box_blur_row, contrast_factor, contrast_row, grayscale_row};

/// A decoded source photograph.
pub type Bitmap = RgbaImage;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProcessingError {
    #[error("invalid line-art parameters: {0}")]
    InvalidParams(String),

    #[error("source image is empty")]
    EmptyImage,

    #[error("line-art generation was cancelled")]
    Cancelled,
}

/// Cooperative cancellation shared between a caller and a running pipeline.
///
/// Stages poll the flag between rows; clones observe the same state.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    pub(crate) fn check(&self) -> Result<(), ProcessingError> {
        if self.is_cancelled() {
            Err(ProcessingError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Processing parameters for line-art generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineArtParams {
    /// Contrast amount in `[-255, 255]`; 0 leaves the image unchanged.
    pub contrast: f32,
    /// Run the 3x3 box blur before edge detection.
    pub smoothing: bool,
    /// Edge magnitudes at or below this become white background.
    pub threshold: f32,
    /// Edge strength multiplier.
    pub multiplier: f32,
    /// Fit the photo into this width before processing.
    pub max_width: Option<u32>,
    /// Fit the photo into this height before processing.
    pub max_height: Option<u32>,
}

impl Default for LineArtParams {
    fn default() -> Self {
        Self::standard()
    }
}

impl LineArtParams {
    /// Balanced outlines for typical photos.
    pub fn standard() -> Self {
        Self {
            contrast: 50.0,
            smoothing: true,
            threshold: 30.0,
            multiplier: 1.5,
            max_width: None,
            max_height: None,
        }
    }

    /// Thicker, darker strokes; picks up softer gradients.
    pub fn bold() -> Self {
        Self {
            contrast: 80.0,
            smoothing: true,
            threshold: 20.0,
            multiplier: 2.0,
            ..Self::standard()
        }
    }

    /// Only strong edges; keeps fine texture off the page.
    pub fn fine() -> Self {
        Self {
            contrast: 30.0,
            smoothing: false,
            threshold: 40.0,
            multiplier: 1.2,
            ..Self::standard()
        }
    }

    /// Unsmoothed Sobel on the raw image with a fixed threshold of 50.
    pub fn classic() -> Self {
        Self {
            contrast: 0.0,
            smoothing: false,
            threshold: 50.0,
            multiplier: 1.0,
            ..Self::standard()
        }
    }

    pub fn from_preset(name: &str) -> Option<Self> {
        match name {
            "standard" => Some(Self::standard()),
            "bold" => Some(Self::bold()),
            "fine" => Some(Self::fine()),
            "classic" => Some(Self::classic()),
            _ => None,
        }
    }

    pub fn all_presets() -> Vec<(&'static str, Self)> {
        vec![
            ("standard", Self::standard()),
            ("bold", Self::bold()),
            ("fine", Self::fine()),
            ("classic", Self::classic()),
        ]
    }

    /// Return a copy that fits output into `width` x `height`.
    pub fn with_canvas(mut self, width: u32, height: u32) -> Self {
        self.max_width = Some(width);
        self.max_height = Some(height);
        self
    }

    pub fn edge_params(&self) -> EdgeParams {
        EdgeParams {
            threshold: self.threshold,
            multiplier: self.multiplier,
        }
    }

    pub fn validate(&self) -> Result<(), ProcessingError> {
        if !self.threshold.is_finite() {
            return Err(ProcessingError::InvalidParams(format!(
                "threshold must be finite, got {}",
                self.threshold
            )));
        }
        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(ProcessingError::InvalidParams(format!(
                "multiplier must be a non-negative number, got {}",
                self.multiplier
            )));
        }
        if self.max_width == Some(0) || self.max_height == Some(0) {
            return Err(ProcessingError::InvalidParams(
                "canvas bounds must be at least 1 pixel".into(),
            ));
        }
        Ok(())
    }
}

/// Scale factor that fits `width` x `height` inside the optional bounds.
///
/// `min(max_w / w, max_h / h)` over whichever bounds are present; 1.0 when
/// neither is.
pub fn fit_scale(width: u32, height: u32, max_width: Option<u32>, max_height: Option<u32>) -> f64 {
    let sx = max_width.map(|m| m as f64 / width as f64);
    let sy = max_height.map(|m| m as f64 / height as f64);
    match (sx, sy) {
        (Some(a), Some(b)) => a.min(b),
        (Some(a), None) | (None, Some(a)) => a,
        (None, None) => 1.0,
    }
}

/// Resize a bitmap into the canvas bounds and load it into a pixel buffer.
pub fn fit_to_canvas(
    bitmap: &Bitmap,
    max_width: Option<u32>,
    max_height: Option<u32>,
) -> Result<PixelBuffer, ProcessingError> {
    let (w, h) = bitmap.dimensions();
    if w == 0 || h == 0 {
        return Err(ProcessingError::EmptyImage);
    }

    let scale = fit_scale(w, h, max_width, max_height);
    let tw = ((w as f64 * scale).round() as u32).max(1);
    let th = ((h as f64 * scale).round() as u32).max(1);

    if (tw, th) == (w, h) {
        return Ok(PixelBuffer::from(bitmap.clone()));
    }

    debug!(from_w = w, from_h = h, to_w = tw, to_h = th, scale, "fitting bitmap to canvas");
    Ok(PixelBuffer::from(imageops::resize(bitmap, tw, th, FilterType::Triangle)))
}

/// Process a bitmap into line art.
pub fn generate_line_art(bitmap: &Bitmap, params: &LineArtParams) -> Result<PixelBuffer, ProcessingError> {
    generate_line_art_with_cancel(bitmap, params, &CancelFlag::new())
}

/// [`generate_line_art`] that stops with [`ProcessingError::Cancelled`] once
/// `cancel` is set. The flag is checked before every row of every stage.
pub fn generate_line_art_with_cancel(
    bitmap: &Bitmap,
    params: &LineArtParams,
    cancel: &CancelFlag,
) -> Result<PixelBuffer, ProcessingError> {
    params.validate()?;
    cancel.check()?;

    let input = fit_to_canvas(bitmap, params.max_width, params.max_height)?;
    process_buffer(&input, params, cancel)
}

/// Run the preprocessing and edge stages on an already-scaled buffer.
pub fn process_buffer(
    input: &PixelBuffer,
    params: &LineArtParams,
    cancel: &CancelFlag,
) -> Result<PixelBuffer, ProcessingError> {
    params.validate()?;
    let (width, height) = input.dimensions();
    let keep_going = || !cancel.is_cancelled();

    // Step 1: grayscale
    let mut buf = try_map_rows(input, keep_going, grayscale_row).ok_or(ProcessingError::Cancelled)?;
    debug!(width, height, "grayscale done");

    // Step 2: contrast
    if params.contrast != 0.0 {
        let factor = contrast_factor(params.contrast);
        buf = try_map_rows(&buf, keep_going, |s, y, out| contrast_row(s, y, out, factor))
            .ok_or(ProcessingError::Cancelled)?;
        debug!(contrast = params.contrast, factor, "contrast done");
    }

    // Step 3: smoothing
    if params.smoothing {
        buf = try_map_rows(&buf, keep_going, box_blur_row).ok_or(ProcessingError::Cancelled)?;
        debug!("box blur done");
    }

    // Step 4: Sobel edges
    let edges = params.edge_params();
    let out = try_map_rows(&buf, keep_going, |s, y, row| edge_row(s, y, row, &edges))
        .ok_or(ProcessingError::Cancelled)?;
    debug!(threshold = edges.threshold, multiplier = edges.multiplier, "edge detection done");

    debug_assert_eq!(out.dimensions(), (width, height));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_detect::detect_edges;
    use crate::preprocess::{box_blur, contrast, grayscale};
    use image::Rgba;

    fn two_tone(width: u32, height: u32) -> Bitmap {
        RgbaImage::from_fn(width, height, |x, _| {
            if x < width / 2 {
                Rgba([20, 40, 60, 255])
            } else {
                Rgba([230, 220, 210, 255])
            }
        })
    }

    #[test]
    fn test_presets_roundtrip_by_name() {
        for (name, params) in LineArtParams::all_presets() {
            assert_eq!(LineArtParams::from_preset(name), Some(params));
        }
        assert_eq!(LineArtParams::from_preset("nope"), None);
    }

    #[test]
    fn test_standard_matches_canonical_tuning() {
        let p = LineArtParams::standard();
        assert_eq!(p.edge_params(), EdgeParams::default());
        assert!(p.smoothing);
    }

    #[test]
    fn test_matches_stage_by_stage_composition() {
        let bitmap = two_tone(12, 9);
        let params = LineArtParams::standard();
        let expected = detect_edges(
            &box_blur(&contrast(&grayscale(&PixelBuffer::from(bitmap.clone())), params.contrast)),
            &params.edge_params(),
        );
        assert_eq!(generate_line_art(&bitmap, &params).unwrap(), expected);
    }

    #[test]
    fn test_uniform_photo_becomes_blank_page() {
        let bitmap = RgbaImage::from_pixel(10, 8, Rgba([90, 140, 30, 255]));
        let out = generate_line_art(&bitmap, &LineArtParams::standard()).unwrap();
        for y in 1..7 {
            for x in 1..9 {
                assert_eq!(out.get(x, y), Some([255, 255, 255, 255]));
            }
        }
    }

    #[test]
    fn test_edge_between_tones_is_inked() {
        let out = generate_line_art(&two_tone(10, 6), &LineArtParams::classic()).unwrap();
        assert_eq!(out.get(5, 3).map(|p| p[0] < 255), Some(true));
        assert_eq!(out.get(2, 3), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_fit_scale() {
        assert_eq!(fit_scale(200, 100, Some(100), Some(100)), 0.5);
        assert_eq!(fit_scale(100, 200, Some(100), Some(100)), 0.5);
        assert_eq!(fit_scale(50, 50, Some(100), None), 2.0);
        assert_eq!(fit_scale(50, 50, None, None), 1.0);
    }

    #[test]
    fn test_fit_to_canvas_resizes() {
        let buf = fit_to_canvas(&two_tone(400, 200), Some(100), Some(100)).unwrap();
        assert_eq!(buf.dimensions(), (100, 50));
        let out = generate_line_art(&two_tone(400, 200), &LineArtParams::standard().with_canvas(100, 100)).unwrap();
        assert_eq!(out.dimensions(), (100, 50));
    }

    #[test]
    fn test_empty_image_rejected() {
        let err = generate_line_art(&RgbaImage::new(0, 5), &LineArtParams::standard()).unwrap_err();
        assert_eq!(err, ProcessingError::EmptyImage);
    }

    #[test]
    fn test_invalid_params_rejected() {
        let mut p = LineArtParams::standard();
        p.threshold = f32::NAN;
        assert!(matches!(generate_line_art(&two_tone(4, 4), &p), Err(ProcessingError::InvalidParams(_))));

        let p = LineArtParams::standard().with_canvas(0, 10);
        assert!(matches!(p.validate(), Err(ProcessingError::InvalidParams(_))));
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = generate_line_art_with_cancel(&two_tone(8, 8), &LineArtParams::standard(), &cancel).unwrap_err();
        assert_eq!(err, ProcessingError::Cancelled);
    }

    #[test]
    fn test_cancel_flag_shared_between_clones() {
        let a = CancelFlag::new();
        let b = a.clone();
        assert!(!b.is_cancelled());
        a.cancel();
        assert!(b.is_cancelled());
    }

    #[test]
    fn test_params_json_defaults() {
        let p: LineArtParams = serde_json::from_str(r#"{"threshold": 12.5}"#).unwrap();
        assert_eq!(p.threshold, 12.5);
        assert_eq!(p.multiplier, 1.5);
        assert!(p.smoothing);
    }
}
