//! Sobel edge detection producing dark, antialiased outlines on white.
//!
//! Works on the R channel, which equals luma once the input went through
//! [`crate::preprocess::grayscale`].

use serde::{Deserialize, Serialize};

use crate::buffer::{map_rows, PixelBuffer, CHANNELS};

/// Background value written where no edge is found.
pub const BACKGROUND: u8 = 255;

/// Tuning for the magnitude-to-ink mapping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EdgeParams {
    /// Magnitudes at or below this stay background.
    pub threshold: f32,
    /// Scales the raw gradient magnitude before thresholding.
    pub multiplier: f32,
}

impl Default for EdgeParams {
    fn default() -> Self {
        Self {
            threshold: 30.0,
            multiplier: 1.5,
        }
    }
}

/// Horizontal and vertical Sobel responses at an interior pixel.
///
/// Returns `None` for border or out-of-range coordinates, which have no full
/// 3x3 neighbourhood.
pub fn sobel_gradient(buf: &PixelBuffer, x: u32, y: u32) -> Option<(i32, i32)> {
    if !buf.is_interior(x, y) {
        return None;
    }
    let x = x as usize;
    Some(gradient_at(buf.row(y - 1), buf.row(y + 1), buf.row(y), x))
}

/// Ink value for one gradient: `255 - magnitude` above the threshold, else background.
pub fn edge_value(gx: i32, gy: i32, params: &EdgeParams) -> u8 {
    let raw = ((gx * gx + gy * gy) as f32).sqrt();
    let magnitude = (raw * params.multiplier).min(255.0);
    if magnitude > params.threshold {
        (255.0 - magnitude).round().clamp(0.0, 255.0) as u8
    } else {
        BACKGROUND
    }
}

/// Turn a grayscale buffer into line art.
///
/// Interior pixels become gray levels proportional to edge strength (darker
/// means stronger) on a white field, all fully opaque. The one-pixel border is
/// copied from the input unchanged, and buffers smaller than 3x3 are returned
/// as an exact copy.
pub fn detect_edges(gray: &PixelBuffer, params: &EdgeParams) -> PixelBuffer {
    map_rows(gray, |src, y, out| edge_row(src, y, out, params))
}

#[inline]
fn gradient_at(above: &[u8], below: &[u8], here: &[u8], x: usize) -> (i32, i32) {
    let r = |row: &[u8], col: usize| row[col * CHANNELS] as i32;

    let tl = r(above, x - 1);
    let tc = r(above, x);
    let tr = r(above, x + 1);
    let ml = r(here, x - 1);
    let mr = r(here, x + 1);
    let bl = r(below, x - 1);
    let bc = r(below, x);
    let br = r(below, x + 1);

    // Sobel X kernel:  -1 0 +1
    //                  -2 0 +2
    //                  -1 0 +1
    let gx = -tl + tr - 2 * ml + 2 * mr - bl + br;

    // Sobel Y kernel:  -1 -2 -1
    //                   0  0  0
    //                  +1 +2 +1
    let gy = -tl - 2 * tc - tr + bl + 2 * bc + br;

    (gx, gy)
}

pub(crate) fn edge_row(src: &PixelBuffer, y: u32, out: &mut [u8], params: &EdgeParams) {
    let (w, h) = src.dimensions();
    if y == 0 || y + 1 >= h || w < 3 {
        return;
    }

    let above = src.row(y - 1);
    let here = src.row(y);
    let below = src.row(y + 1);

    for x in 1..(w - 1) as usize {
        let (gx, gy) = gradient_at(above, below, here, x);
        let v = edge_value(gx, gy, params);
        let i = x * CHANNELS;
        out[i..i + CHANNELS].copy_from_slice(&[v, v, v, 255]);
    }
}
