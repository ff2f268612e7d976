//! Row-major RGBA pixel storage shared by every stage of the pipeline.
//!
//! Channel order is R, G, B, A with the origin at the top-left corner.
//! The length invariant `pixels.len() == width * height * 4` is established
//! by the constructors and never broken afterwards: stages only write
//! through indices derived from in-range coordinates.

use image::RgbaImage;
use thiserror::Error;

/// Bytes per pixel (RGBA).
pub const CHANNELS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    #[error("pixel data has {actual} bytes, expected {expected} for the given dimensions")]
    DimensionMismatch { expected: usize, actual: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelBuffer {
    /// A buffer of the given size with every byte zeroed (transparent black).
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; byte_len(width, height)],
        }
    }

    /// A buffer where every pixel is `rgba`.
    pub fn filled(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let count = width as usize * height as usize;
        let mut pixels = Vec::with_capacity(count * CHANNELS);
        for _ in 0..count {
            pixels.extend_from_slice(&rgba);
        }
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Wrap existing RGBA bytes, rejecting data whose length does not match.
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self, BufferError> {
        let expected = byte_len(width, height);
        if pixels.len() != expected {
            return Err(BufferError::DimensionMismatch {
                expected,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_raw(self) -> Vec<u8> {
        self.pixels
    }

    /// True when `(x, y)` addresses a pixel of this buffer.
    #[inline]
    pub fn contains(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < self.width as i64 && y < self.height as i64
    }

    /// True when `(x, y)` has a full 3x3 neighbourhood inside the buffer.
    #[inline]
    pub fn is_interior(&self, x: u32, y: u32) -> bool {
        x >= 1 && y >= 1 && x + 1 < self.width && y + 1 < self.height
    }

    /// Byte offset of the pixel at `(x, y)`. Callers must have checked bounds.
    #[inline]
    pub(crate) fn offset(&self, x: u32, y: u32) -> usize {
        debug_assert!(x < self.width && y < self.height);
        (y as usize * self.width as usize + x as usize) * CHANNELS
    }

    /// RGBA at `(x, y)`, or `None` when the coordinate is outside the buffer.
    pub fn get(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = self.offset(x, y);
        Some([
            self.pixels[i],
            self.pixels[i + 1],
            self.pixels[i + 2],
            self.pixels[i + 3],
        ])
    }

    /// Overwrite the pixel at `(x, y)`. Returns false (and writes nothing) when out of range.
    pub fn set(&mut self, x: u32, y: u32, rgba: [u8; 4]) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        let i = self.offset(x, y);
        self.pixels[i..i + CHANNELS].copy_from_slice(&rgba);
        true
    }

    /// One row of raw RGBA bytes.
    pub(crate) fn row(&self, y: u32) -> &[u8] {
        let stride = self.width as usize * CHANNELS;
        let start = y as usize * stride;
        &self.pixels[start..start + stride]
    }

    pub(crate) fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let stride = self.width as usize * CHANNELS;
        let start = y as usize * stride;
        &mut self.pixels[start..start + stride]
    }

    pub(crate) fn pixels_mut(&mut self) -> &mut [u8] {
        &mut self.pixels
    }
}

/// Produce a copy of `src` whose rows are rewritten by `kernel`.
///
/// The output starts as an exact copy of the input, so any pixel the kernel
/// leaves alone (the one-pixel border for 3x3 filters) keeps its source value.
pub(crate) fn map_rows<K>(src: &PixelBuffer, mut kernel: K) -> PixelBuffer
where
    K: FnMut(&PixelBuffer, u32, &mut [u8]),
{
    let mut out = src.clone();
    for y in 0..src.height {
        kernel(src, y, out.row_mut(y));
    }
    out
}

/// Like [`map_rows`], but polls `keep_going` before each row and stops early
/// when it returns false.
pub(crate) fn try_map_rows<K, C>(src: &PixelBuffer, mut keep_going: C, mut kernel: K) -> Option<PixelBuffer>
where
    K: FnMut(&PixelBuffer, u32, &mut [u8]),
    C: FnMut() -> bool,
{
    let mut out = src.clone();
    for y in 0..src.height {
        if !keep_going() {
            return None;
        }
        kernel(src, y, out.row_mut(y));
    }
    Some(out)
}

impl From<RgbaImage> for PixelBuffer {
    fn from(img: RgbaImage) -> Self {
        let (width, height) = img.dimensions();
        Self {
            width,
            height,
            pixels: img.into_raw(),
        }
    }
}

impl From<PixelBuffer> for RgbaImage {
    fn from(buf: PixelBuffer) -> Self {
        let (width, height) = buf.dimensions();
        // The length invariant guarantees from_raw succeeds.
        RgbaImage::from_raw(width, height, buf.pixels)
            .unwrap_or_else(|| RgbaImage::new(width, height))
    }
}

#[inline]
fn byte_len(width: u32, height: u32) -> usize {
    width as usize * height as usize * CHANNELS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_raw_rejects_wrong_length() {
        let err = PixelBuffer::from_raw(2, 2, vec![0; 15]).unwrap_err();
        assert_eq!(
            err,
            BufferError::DimensionMismatch {
                expected: 16,
                actual: 15
            }
        );
    }

    #[test]
    fn test_get_and_set_are_bounds_checked() {
        let mut buf = PixelBuffer::new(3, 2);
        assert!(buf.set(2, 1, [1, 2, 3, 4]));
        assert_eq!(buf.get(2, 1), Some([1, 2, 3, 4]));
        assert!(!buf.set(3, 0, [9, 9, 9, 9]));
        assert_eq!(buf.get(0, 2), None);
        assert_eq!(buf.as_bytes().len(), 3 * 2 * 4);
    }

    #[test]
    fn test_interior() {
        let buf = PixelBuffer::new(3, 3);
        assert!(buf.is_interior(1, 1));
        assert!(!buf.is_interior(0, 1));
        assert!(!buf.is_interior(2, 1));
        assert!(!PixelBuffer::new(2, 2).is_interior(1, 1));
    }

    #[test]
    fn test_rgba_image_conversion() {
        let buf = PixelBuffer::filled(4, 3, [10, 20, 30, 255]);
        let img: RgbaImage = buf.clone().into();
        assert_eq!(img.dimensions(), (4, 3));
        assert_eq!(PixelBuffer::from(img), buf);
    }
}
