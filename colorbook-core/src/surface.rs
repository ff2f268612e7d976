//! The canvas a session paints on.
//!
//! Real front ends (a browser canvas, a GUI widget) implement
//! [`DrawingSurface`]; [`RasterSurface`] is the in-memory implementation used
//! by the CLI and tests.

use std::io::Cursor;

use image::{ImageFormat, RgbaImage};
use thiserror::Error;

use crate::buffer::PixelBuffer;
use crate::color::Color;
use crate::history::Snapshot;

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("failed to encode snapshot: {0}")]
    Encode(#[source] image::ImageError),

    #[error("failed to decode snapshot: {0}")]
    Decode(#[source] image::ImageError),

    #[error("snapshot is {actual:?}, surface is {expected:?}")]
    SizeMismatch {
        expected: (u32, u32),
        actual: (u32, u32),
    },
}

pub trait DrawingSurface {
    /// Width and height in pixels.
    fn size(&self) -> (u32, u32);

    /// Copy of the current pixels.
    fn read_pixels(&self) -> PixelBuffer;

    /// Replace the pixels under `layer`, anchored at the top-left corner.
    /// Parts of `layer` outside the surface are clipped.
    fn composite(&mut self, layer: &PixelBuffer);

    /// Reset to the blank background.
    fn clear(&mut self);

    /// Serialize the whole scene.
    fn snapshot(&self) -> Result<Snapshot, SurfaceError>;

    /// Restore a scene produced by [`DrawingSurface::snapshot`].
    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError>;
}

/// A fixed-size RGBA canvas with an opaque background color.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RasterSurface {
    pixels: PixelBuffer,
    background: Color,
}

impl RasterSurface {
    /// A white canvas.
    pub fn new(width: u32, height: u32) -> Self {
        Self::with_background(width, height, Color::WHITE)
    }

    pub fn with_background(width: u32, height: u32, background: Color) -> Self {
        Self {
            pixels: PixelBuffer::filled(width, height, background.opaque()),
            background,
        }
    }

    pub fn pixels(&self) -> &PixelBuffer {
        &self.pixels
    }

    pub fn background(&self) -> Color {
        self.background
    }

    /// Encode the current pixels as PNG.
    pub fn to_png(&self) -> Result<Vec<u8>, SurfaceError> {
        let img: RgbaImage = self.pixels.clone().into();
        let mut out = Vec::new();
        img.write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(SurfaceError::Encode)?;
        Ok(out)
    }
}

impl DrawingSurface for RasterSurface {
    fn size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    fn read_pixels(&self) -> PixelBuffer {
        self.pixels.clone()
    }

    fn composite(&mut self, layer: &PixelBuffer) {
        let (w, h) = self.pixels.dimensions();
        let cols = layer.width().min(w) as usize * 4;
        for y in 0..layer.height().min(h) {
            self.pixels.row_mut(y)[..cols].copy_from_slice(&layer.row(y)[..cols]);
        }
    }

    fn clear(&mut self) {
        let (w, h) = self.pixels.dimensions();
        self.pixels = PixelBuffer::filled(w, h, self.background.opaque());
    }

    fn snapshot(&self) -> Result<Snapshot, SurfaceError> {
        self.to_png().map(Snapshot::new)
    }

    fn restore(&mut self, snapshot: &Snapshot) -> Result<(), SurfaceError> {
        let img = image::load_from_memory_with_format(snapshot.as_bytes(), ImageFormat::Png)
            .map_err(SurfaceError::Decode)?
            .to_rgba8();
        let expected = self.size();
        if img.dimensions() != expected {
            return Err(SurfaceError::SizeMismatch {
                expected,
                actual: img.dimensions(),
            });
        }
        self.pixels = PixelBuffer::from(img);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_restores_exact_pixels() {
        let mut surface = RasterSurface::new(5, 4);
        let mut layer = PixelBuffer::filled(3, 3, [0, 0, 0, 255]);
        layer.set(1, 1, [12, 34, 56, 78]);
        surface.composite(&layer);
        let snap = surface.snapshot().unwrap();
        let before = surface.clone();

        surface.clear();
        assert_ne!(surface, before);
        surface.restore(&snap).unwrap();
        assert_eq!(surface, before);
    }

    #[test]
    fn test_composite_clips_to_surface() {
        let mut surface = RasterSurface::new(2, 2);
        surface.composite(&PixelBuffer::filled(4, 3, [9, 9, 9, 255]));
        assert_eq!(surface.pixels(), &PixelBuffer::filled(2, 2, [9, 9, 9, 255]));

        let mut surface = RasterSurface::new(3, 3);
        surface.composite(&PixelBuffer::filled(1, 2, [0, 0, 0, 255]));
        assert_eq!(surface.pixels().get(0, 1), Some([0, 0, 0, 255]));
        assert_eq!(surface.pixels().get(1, 0), Some([255, 255, 255, 255]));
        assert_eq!(surface.pixels().get(0, 2), Some([255, 255, 255, 255]));
    }

    #[test]
    fn test_restore_rejects_other_sizes_and_garbage() {
        let snap = RasterSurface::new(2, 2).snapshot().unwrap();
        let mut surface = RasterSurface::new(3, 3);
        assert!(matches!(surface.restore(&snap), Err(SurfaceError::SizeMismatch { .. })));
        assert!(matches!(
            surface.restore(&Snapshot::new(b"junk".to_vec())),
            Err(SurfaceError::Decode(_))
        ));
        assert_eq!(surface, RasterSurface::new(3, 3));
    }
}
