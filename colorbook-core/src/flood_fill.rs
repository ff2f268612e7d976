//! 4-connected flood fill driven by an explicit stack.
//!
//! Large regions never touch the call stack: pending coordinates live in a
//! heap-allocated `Vec`, and each pixel is recolored at most once per run.

use thiserror::Error;
use tracing::debug;

use crate::buffer::PixelBuffer;
use crate::color::{Color, ParseColorError};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum FillError {
    #[error(transparent)]
    InvalidColor(#[from] ParseColorError),

    #[error("fill start ({x}, {y}) is outside the {width}x{height} buffer")]
    OutOfBounds {
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    },
}

/// What a fill run did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FillReport {
    /// Pixels recolored.
    pub filled: usize,
    /// Stack entries examined, including discarded ones.
    pub popped: usize,
}

/// Recolor the 4-connected region around `(x, y)` with a hex color.
///
/// The region is every pixel reachable through up/down/left/right steps whose
/// RGB equals the start pixel's RGB (alpha is ignored when matching). Filled
/// pixels get the new color with alpha 255.
///
/// Nothing is written when the start is out of range or the color does not
/// parse.
pub fn flood_fill(buf: &mut PixelBuffer, x: u32, y: u32, hex: &str) -> Result<FillReport, FillError> {
    check_bounds(buf, x, y)?;
    let color = Color::parse_hex(hex)?;
    flood_fill_color(buf, x, y, color)
}

/// [`flood_fill`] with an already parsed color.
pub fn flood_fill_color(
    buf: &mut PixelBuffer,
    x: u32,
    y: u32,
    color: Color,
) -> Result<FillReport, FillError> {
    check_bounds(buf, x, y)?;

    let (width, height) = buf.dimensions();
    let start = buf.offset(x, y);
    let target = {
        let px = buf.as_bytes();
        [px[start], px[start + 1], px[start + 2]]
    };
    let fill = color.opaque();

    // Guards termination when the fill color equals the target color.
    let mut visited = vec![false; width as usize * height as usize];
    let mut stack: Vec<(i64, i64)> = vec![(x as i64, y as i64)];
    let mut report = FillReport::default();

    let pixels = buf.pixels_mut();
    while let Some((cx, cy)) = stack.pop() {
        report.popped += 1;

        if cx < 0 || cy < 0 || cx >= width as i64 || cy >= height as i64 {
            continue;
        }
        let idx = cy as usize * width as usize + cx as usize;
        if visited[idx] {
            continue;
        }
        let i = idx * 4;
        if pixels[i..i + 3] != target {
            continue;
        }

        pixels[i..i + 4].copy_from_slice(&fill);
        visited[idx] = true;
        report.filled += 1;

        stack.push((cx + 1, cy)); // right
        stack.push((cx - 1, cy)); // left
        stack.push((cx, cy + 1)); // down
        stack.push((cx, cy - 1)); // up
    }

    debug!(x, y, %color, filled = report.filled, popped = report.popped, "flood fill");
    Ok(report)
}

fn check_bounds(buf: &PixelBuffer, x: u32, y: u32) -> Result<(), FillError> {
    if buf.contains(x as i64, y as i64) {
        Ok(())
    } else {
        Err(FillError::OutOfBounds {
            x,
            y,
            width: buf.width(),
            height: buf.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WHITE: [u8; 4] = [255, 255, 255, 255];
    const BLACK: [u8; 4] = [0, 0, 0, 255];

    /// Parse an ASCII map: '#' is black, '.' is white.
    fn from_map(rows: &[&str]) -> PixelBuffer {
        let height = rows.len() as u32;
        let width = rows[0].len() as u32;
        let mut buf = PixelBuffer::new(width, height);
        for (y, row) in rows.iter().enumerate() {
            for (x, ch) in row.chars().enumerate() {
                let px = if ch == '#' { BLACK } else { WHITE };
                buf.set(x as u32, y as u32, px);
            }
        }
        buf
    }

    #[test]
    fn test_fills_whole_uniform_buffer() {
        let mut buf = PixelBuffer::filled(4, 4, BLACK);
        let report = flood_fill(&mut buf, 0, 0, "#ff0000").unwrap();
        assert_eq!(report.filled, 16);
        assert_eq!(buf, PixelBuffer::filled(4, 4, [255, 0, 0, 255]));
    }

    #[test]
    fn test_stops_at_region_boundary() {
        let mut buf = from_map(&[
            "..###", //
            "..###", //
            "..###", //
            "..###", //
            "..###", //
        ]);
        let report = flood_fill(&mut buf, 0, 0, "#00ff00").unwrap();
        assert_eq!(report.filled, 10);
        for y in 0..5 {
            for x in 0..5 {
                let expected = if x < 2 { [0, 255, 0, 255] } else { BLACK };
                assert_eq!(buf.get(x, y), Some(expected), "pixel ({x},{y})");
            }
        }
    }

    #[test]
    fn test_diagonal_neighbours_not_connected() {
        let mut buf = from_map(&[
            ".#.", //
            "#.#", //
            ".#.", //
        ]);
        let report = flood_fill(&mut buf, 1, 1, "#0000ff").unwrap();
        assert_eq!(report.filled, 1);
        assert_eq!(buf.get(1, 1), Some([0, 0, 255, 255]));
        for (x, y) in [(0, 0), (2, 0), (0, 2), (2, 2)] {
            assert_eq!(buf.get(x, y), Some(WHITE));
        }
    }

    #[test]
    fn test_recolors_exactly_the_component() {
        let original = from_map(&[
            "....#...", //
            ".##.#.#.", //
            ".#..#.#.", //
            ".####.#.", //
            "......#.", //
            "#######.", //
        ]);
        let mut buf = original.clone();
        let report = flood_fill(&mut buf, 0, 0, "#123456").unwrap();

        // Reference component via a separate breadth-first walk.
        let (w, h) = original.dimensions();
        let mut inside = vec![false; (w * h) as usize];
        let mut queue = std::collections::VecDeque::from([(0u32, 0u32)]);
        inside[0] = true;
        while let Some((x, y)) = queue.pop_front() {
            let neighbours = [
                (x.wrapping_sub(1), y),
                (x + 1, y),
                (x, y.wrapping_sub(1)),
                (x, y + 1),
            ];
            for (nx, ny) in neighbours {
                if nx < w && ny < h && !inside[(ny * w + nx) as usize] && original.get(nx, ny) == Some(WHITE) {
                    inside[(ny * w + nx) as usize] = true;
                    queue.push_back((nx, ny));
                }
            }
        }

        let mut count = 0;
        for y in 0..h {
            for x in 0..w {
                if inside[(y * w + x) as usize] {
                    count += 1;
                    assert_eq!(buf.get(x, y), Some([0x12, 0x34, 0x56, 255]));
                } else {
                    assert_eq!(buf.get(x, y), original.get(x, y));
                }
            }
        }
        assert_eq!(report.filled, count);
        assert!(report.popped <= 4 * report.filled + 1);
    }

    #[test]
    fn test_same_color_terminates() {
        let mut buf = PixelBuffer::filled(64, 64, [10, 20, 30, 100]);
        let report = flood_fill(&mut buf, 5, 5, "#0a141e").unwrap();
        assert_eq!(report.filled, 64 * 64);
        assert!(report.popped <= 4 * report.filled + 1);
        // Visually identical, alpha normalised to opaque.
        assert_eq!(buf, PixelBuffer::filled(64, 64, [10, 20, 30, 255]));
    }

    #[test]
    fn test_alpha_ignored_when_matching() {
        let mut buf = PixelBuffer::filled(2, 1, [0, 0, 0, 255]);
        buf.set(1, 0, [0, 0, 0, 0]);
        let report = flood_fill(&mut buf, 0, 0, "#ffffff").unwrap();
        assert_eq!(report.filled, 2);
    }

    #[test]
    fn test_invalid_color_leaves_buffer_untouched() {
        let mut buf = PixelBuffer::filled(3, 3, BLACK);
        let before = buf.clone();
        let err = flood_fill(&mut buf, 1, 1, "#zzzzzz").unwrap_err();
        assert!(matches!(err, FillError::InvalidColor(_)));
        assert_eq!(buf, before);
    }

    #[test]
    fn test_out_of_bounds_rejected() {
        let mut buf = PixelBuffer::filled(3, 3, BLACK);
        let before = buf.clone();
        let err = flood_fill(&mut buf, 3, 0, "#ffffff").unwrap_err();
        assert_eq!(
            err,
            FillError::OutOfBounds {
                x: 3,
                y: 0,
                width: 3,
                height: 3
            }
        );
        assert!(flood_fill(&mut PixelBuffer::new(0, 0), 0, 0, "#ffffff").is_err());
        assert_eq!(buf, before);
    }

    #[test]
    fn test_large_region_does_not_overflow_stack() {
        let mut buf = PixelBuffer::filled(1024, 1024, WHITE);
        let report = flood_fill(&mut buf, 512, 512, "#000000").unwrap();
        assert_eq!(report.filled, 1024 * 1024);
    }
}
