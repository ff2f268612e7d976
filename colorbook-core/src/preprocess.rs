//! Per-pixel preparation stages run ahead of edge detection:
//! grayscale (BT.601 luma), contrast stretch, and a 3x3 box blur.
//!
//! Each stage is a pure `&PixelBuffer -> PixelBuffer` transform that keeps
//! the input's dimensions. The row kernels are shared with the cancellable
//! pipeline runner.

use tracing::warn;

use crate::buffer::{map_rows, PixelBuffer, CHANNELS};

/// Largest contrast amount accepted in either direction.
///
/// The contrast formula divides by `259 - amount`, so inputs are clamped to
/// this range before use.
pub const MAX_CONTRAST: f32 = 255.0;

/// Convert to grayscale using BT.601 luma weights.
///
/// `luma = 0.299*R + 0.587*G + 0.114*B`, written to all three color channels
/// with alpha forced to 255.
pub fn grayscale(src: &PixelBuffer) -> PixelBuffer {
    map_rows(src, grayscale_row)
}

/// Contrast stretch around mid-gray. `amount = 0` is the identity.
pub fn contrast(src: &PixelBuffer, amount: f32) -> PixelBuffer {
    let factor = contrast_factor(amount);
    map_rows(src, |s, y, out| contrast_row(s, y, out, factor))
}

/// 3x3 mean filter over all four channels.
///
/// Only pixels with a full neighbourhood are averaged; the one-pixel border is
/// copied from the input unchanged, and buffers smaller than 3x3 come back as
/// an exact copy.
pub fn box_blur(src: &PixelBuffer) -> PixelBuffer {
    map_rows(src, box_blur_row)
}

#[inline]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let l = 0.299 * r as f64 + 0.587 * g as f64 + 0.114 * b as f64;
    l.round().clamp(0.0, 255.0) as u8
}

/// Clamp a contrast amount into `[-MAX_CONTRAST, MAX_CONTRAST]`.
/// Non-finite values mean "no change".
pub fn clamp_contrast(amount: f32) -> f32 {
    if !amount.is_finite() {
        warn!(amount, "non-finite contrast amount, using 0");
        return 0.0;
    }
    let clamped = amount.clamp(-MAX_CONTRAST, MAX_CONTRAST);
    if clamped != amount {
        warn!(amount, clamped, "contrast amount out of range, clamped");
    }
    clamped
}

/// `259 * (amount + 255) / (255 * (259 - amount))` for a clamped amount.
pub fn contrast_factor(amount: f32) -> f64 {
    let a = clamp_contrast(amount) as f64;
    (259.0 * (a + 255.0)) / (255.0 * (259.0 - a))
}

pub(crate) fn grayscale_row(src: &PixelBuffer, y: u32, out: &mut [u8]) {
    for (s, d) in src
        .row(y)
        .chunks_exact(CHANNELS)
        .zip(out.chunks_exact_mut(CHANNELS))
    {
        let v = luma(s[0], s[1], s[2]);
        d.copy_from_slice(&[v, v, v, 255]);
    }
}

pub(crate) fn contrast_row(src: &PixelBuffer, y: u32, out: &mut [u8], factor: f64) {
    for (s, d) in src
        .row(y)
        .chunks_exact(CHANNELS)
        .zip(out.chunks_exact_mut(CHANNELS))
    {
        for c in 0..3 {
            let v = factor * (s[c] as f64 - 128.0) + 128.0;
            d[c] = v.round().clamp(0.0, 255.0) as u8;
        }
        d[3] = s[3];
    }
}

pub(crate) fn box_blur_row(src: &PixelBuffer, y: u32, out: &mut [u8]) {
    let (w, h) = src.dimensions();
    if y == 0 || y + 1 >= h || w < 3 {
        return;
    }

    let above = src.row(y - 1);
    let here = src.row(y);
    let below = src.row(y + 1);

    for x in 1..(w - 1) as usize {
        for c in 0..CHANNELS {
            let mut sum = 0u32;
            for dx in [x - 1, x, x + 1] {
                let i = dx * CHANNELS + c;
                sum += above[i] as u32 + here[i] as u32 + below[i] as u32;
            }
            // Rounded mean of nine samples.
            out[x * CHANNELS + c] = ((sum + 4) / 9) as u8;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(width: u32, height: u32) -> PixelBuffer {
        let mut buf = PixelBuffer::new(width, height);
        for y in 0..height {
            for x in 0..width {
                let v = ((x * 37 + y * 91) % 256) as u8;
                buf.set(x, y, [v, v.wrapping_mul(3), 255 - v, 200]);
            }
        }
        buf
    }

    #[test]
    fn test_grayscale_weights() {
        let buf = PixelBuffer::filled(1, 1, [255, 0, 0, 10]);
        // 0.299 * 255 = 76.245
        assert_eq!(grayscale(&buf).get(0, 0), Some([76, 76, 76, 255]));

        let buf = PixelBuffer::filled(1, 1, [10, 200, 30, 255]);
        // 2.99 + 117.4 + 3.42 = 123.81
        assert_eq!(grayscale(&buf).get(0, 0), Some([124, 124, 124, 255]));
    }

    #[test]
    fn test_grayscale_idempotent() {
        let once = grayscale(&gradient(7, 5));
        assert_eq!(grayscale(&once), once);
    }

    #[test]
    fn test_contrast_zero_is_identity() {
        let buf = gradient(6, 4);
        assert_eq!(contrast_factor(0.0), 1.0);
        assert_eq!(contrast(&buf, 0.0), buf);
    }

    #[test]
    fn test_contrast_stretches_and_keeps_alpha() {
        let mut buf = PixelBuffer::new(2, 1);
        buf.set(0, 0, [100, 128, 160, 77]);
        buf.set(1, 0, [0, 255, 20, 255]);
        let out = contrast(&buf, 100.0);

        let [r, g, b, a] = out.get(0, 0).unwrap();
        assert!(r < 100);
        assert_eq!(g, 128);
        assert!(b > 160);
        assert_eq!(a, 77);
        assert_eq!(out.get(1, 0), Some([0, 255, 0, 255]));
    }

    #[test]
    fn test_contrast_guards_singular_amount() {
        let buf = gradient(3, 3);
        // 259 would divide by zero; it is clamped to 255 instead.
        assert!(contrast_factor(259.0).is_finite());
        assert_eq!(contrast_factor(259.0), contrast_factor(MAX_CONTRAST));
        assert_eq!(contrast(&buf, 259.0), contrast(&buf, 255.0));
        assert_eq!(contrast(&buf, f32::NAN), buf);
    }

    #[test]
    fn test_contrast_minimum_flattens_to_mid_gray() {
        let out = contrast(&gradient(4, 4), -MAX_CONTRAST);
        for px in out.as_bytes().chunks_exact(4) {
            assert_eq!(&px[..3], &[128, 128, 128]);
        }
    }

    #[test]
    fn test_box_blur_averages_interior() {
        let mut buf = PixelBuffer::filled(3, 3, [0, 0, 0, 255]);
        buf.set(1, 1, [90, 9, 180, 255]);
        let out = box_blur(&buf);
        assert_eq!(out.get(1, 1), Some([10, 1, 20, 255]));
    }

    #[test]
    fn test_box_blur_copies_border() {
        let src = gradient(5, 4);
        let out = box_blur(&src);
        let (w, h) = src.dimensions();
        for y in 0..h {
            for x in 0..w {
                if !src.is_interior(x, y) {
                    assert_eq!(out.get(x, y), src.get(x, y), "border pixel ({x},{y})");
                }
            }
        }
        assert_ne!(out, src);
    }

    #[test]
    fn test_box_blur_small_buffer_unchanged() {
        for (w, h) in [(0, 0), (1, 1), (2, 5), (5, 2)] {
            let src = gradient(w, h);
            assert_eq!(box_blur(&src), src);
        }
    }

    #[test]
    fn test_box_blur_uniform_unchanged() {
        let src = PixelBuffer::filled(6, 6, [40, 80, 120, 255]);
        assert_eq!(box_blur(&src), src);
    }
}
