//! A coloring session: one drawing surface, the active tool, and its undo history.
//!
//! Every mutating operation captures the surface before applying the change
//! and commits that capture only once the change succeeded, so `undo` always
//! restores the state in front of the most recent change.

use thiserror::Error;
use tracing::{debug, info};

use crate::color::{Color, ParseColorError};
use crate::flood_fill::{flood_fill_color, FillError, FillReport};
use crate::history::{History, Snapshot};
use crate::pipeline::{generate_line_art_with_cancel, Bitmap, CancelFlag, LineArtParams, ProcessingError};
use crate::source::{FetchError, ImageSource};
use crate::surface::{DrawingSurface, RasterSurface, SurfaceError};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Processing(#[from] ProcessingError),

    #[error(transparent)]
    Fill(#[from] FillError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error("nothing to undo")]
    EmptyHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Tool {
    /// Freehand strokes, drawn by the front end.
    #[default]
    Brush,
    /// Freehand erasing, drawn by the front end.
    Eraser,
    /// Click to flood fill.
    Fill,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolState {
    pub tool: Tool,
    pub color: Color,
}

impl Default for ToolState {
    fn default() -> Self {
        Self {
            tool: Tool::Brush,
            color: Color::BLACK,
        }
    }
}

pub struct Session<S: DrawingSurface = RasterSurface> {
    surface: S,
    tools: ToolState,
    history: History<Snapshot>,
    params: LineArtParams,
}

impl<S: DrawingSurface> Session<S> {
    pub fn new(surface: S) -> Self {
        Self {
            surface,
            tools: ToolState::default(),
            history: History::new(),
            params: LineArtParams::default(),
        }
    }

    pub fn with_params(mut self, params: LineArtParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_history(mut self, history: History<Snapshot>) -> Self {
        self.history = history;
        self
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }

    pub fn tools(&self) -> ToolState {
        self.tools
    }

    pub fn history(&self) -> &History<Snapshot> {
        &self.history
    }

    pub fn params(&self) -> &LineArtParams {
        &self.params
    }

    pub fn set_params(&mut self, params: LineArtParams) {
        self.params = params;
    }

    pub fn set_tool(&mut self, tool: Tool) {
        self.tools.tool = tool;
    }

    pub fn set_color(&mut self, color: Color) {
        self.tools.color = color;
    }

    pub fn set_color_hex(&mut self, hex: &str) -> Result<(), ParseColorError> {
        self.tools.color = Color::parse_hex(hex)?;
        Ok(())
    }

    /// Fetch a photo for `category`, turn it into line art and put it on the surface.
    ///
    /// The fetch is the only await point. `cancel` is honoured once the photo
    /// has arrived and between rows while processing; a cancelled or failed
    /// run leaves the surface and history untouched.
    pub async fn generate<I>(&mut self, source: &I, category: &str, cancel: &CancelFlag) -> Result<(), SessionError>
    where
        I: ImageSource + ?Sized,
    {
        let bitmap = source.fetch(category).await?;
        cancel.check()?;
        self.generate_from_bitmap(&bitmap, cancel)
    }

    /// Replace the surface with line art made from an already decoded photo.
    pub fn generate_from_bitmap(&mut self, bitmap: &Bitmap, cancel: &CancelFlag) -> Result<(), SessionError> {
        let (w, h) = self.surface.size();
        let params = self.params.clone().with_canvas(w, h);
        let art = generate_line_art_with_cancel(bitmap, &params, cancel)?;

        let before = self.surface.snapshot()?;
        self.surface.clear();
        self.surface.composite(&art);
        self.commit(before);
        info!(width = art.width(), height = art.height(), "line art placed");
        Ok(())
    }

    /// Flood fill at `(x, y)` with the current tool color.
    pub fn fill_at(&mut self, x: u32, y: u32) -> Result<FillReport, SessionError> {
        let color = self.tools.color;
        self.fill_with(x, y, color)
    }

    /// Flood fill at `(x, y)` with a hex color. An invalid color changes nothing.
    pub fn fill_at_hex(&mut self, x: u32, y: u32, hex: &str) -> Result<FillReport, SessionError> {
        let color = Color::parse_hex(hex).map_err(FillError::from)?;
        self.fill_with(x, y, color)
    }

    /// Dispatch a pointer press to the active tool.
    ///
    /// Only the fill tool acts here; brush and eraser strokes belong to the
    /// front end, so they return `Ok(None)`.
    pub fn pointer_down(&mut self, x: u32, y: u32) -> Result<Option<FillReport>, SessionError> {
        match self.tools.tool {
            Tool::Fill => self.fill_at(x, y).map(Some),
            Tool::Brush | Tool::Eraser => Ok(None),
        }
    }

    /// Wipe the surface back to its background.
    pub fn clear(&mut self) -> Result<(), SessionError> {
        let before = self.surface.snapshot()?;
        self.surface.clear();
        self.commit(before);
        Ok(())
    }

    /// Restore the state in front of the latest change.
    ///
    /// Returns `Ok(false)` without touching anything when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, SessionError> {
        match self.history.undo() {
            Some(snapshot) => {
                self.surface.restore(&snapshot)?;
                info!(remaining = self.history.len(), "undo");
                Ok(true)
            }
            None => {
                debug!("undo with empty history");
                Ok(false)
            }
        }
    }

    /// Like [`Session::undo`], but reports an empty history as an error.
    pub fn try_undo(&mut self) -> Result<(), SessionError> {
        if self.undo()? {
            Ok(())
        } else {
            Err(SessionError::EmptyHistory)
        }
    }

    fn fill_with(&mut self, x: u32, y: u32, color: Color) -> Result<FillReport, SessionError> {
        let mut pixels = self.surface.read_pixels();
        let report = flood_fill_color(&mut pixels, x, y, color)?;

        let before = self.surface.snapshot()?;
        self.surface.composite(&pixels);
        self.commit(before);
        Ok(report)
    }

    /// Record an editable point. Callers capture `before` ahead of mutating.
    fn commit(&mut self, before: Snapshot) {
        self.history.commit(before);
        debug!(depth = self.history.len(), "history commit");
    }

    /// Capture the current surface without recording it.
    pub fn snapshot(&self) -> Result<Snapshot, SessionError> {
        Ok(self.surface.snapshot()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::PixelBuffer;
    use image::{Rgba, RgbaImage};

    fn split_photo() -> Bitmap {
        RgbaImage::from_fn(12, 8, |x, _| {
            if x < 6 {
                Rgba([10, 10, 10, 255])
            } else {
                Rgba([240, 240, 240, 255])
            }
        })
    }

    #[test]
    fn test_generate_fill_undo() {
        let mut session = Session::new(RasterSurface::new(12, 8)).with_params(LineArtParams::classic());
        session.generate_from_bitmap(&split_photo(), &CancelFlag::new()).unwrap();
        let line_art = session.surface().clone();
        assert_eq!(session.history().len(), 1);

        session.set_tool(Tool::Fill);
        session.set_color_hex("#ff0000").unwrap();
        let report = session.pointer_down(2, 4).unwrap().unwrap();
        assert!(report.filled > 0);
        assert_eq!(session.surface().pixels().get(2, 4), Some([255, 0, 0, 255]));
        assert_eq!(session.history().len(), 2);

        assert!(session.undo().unwrap());
        assert_eq!(session.surface(), &line_art);
        assert!(session.undo().unwrap());
        assert_eq!(session.surface(), &RasterSurface::new(12, 8));
        assert!(!session.undo().unwrap());
        assert!(matches!(session.try_undo(), Err(SessionError::EmptyHistory)));
    }

    #[test]
    fn test_failed_fill_commits_nothing() {
        let mut session = Session::new(RasterSurface::new(4, 4));
        assert!(matches!(
            session.fill_at_hex(0, 0, "nope"),
            Err(SessionError::Fill(FillError::InvalidColor(_)))
        ));
        assert!(matches!(
            session.fill_at_hex(4, 0, "#000000"),
            Err(SessionError::Fill(FillError::OutOfBounds { .. }))
        ));
        assert!(session.history().is_empty());
        assert_eq!(session.surface(), &RasterSurface::new(4, 4));
    }

    #[test]
    fn test_brush_press_is_not_a_fill() {
        let mut session = Session::new(RasterSurface::new(4, 4));
        assert_eq!(session.pointer_down(1, 1).unwrap(), None);
        assert!(session.history().is_empty());
    }

    #[test]
    fn test_clear_is_undoable() {
        let mut session = Session::new(RasterSurface::new(3, 3));
        session.fill_at_hex(0, 0, "#00ff00").unwrap();
        let filled = session.surface().clone();
        session.clear().unwrap();
        assert_eq!(session.surface().pixels(), &PixelBuffer::filled(3, 3, [255, 255, 255, 255]));
        session.undo().unwrap();
        assert_eq!(session.surface(), &filled);
    }

    #[test]
    fn test_cancelled_generation_leaves_session_untouched() {
        let mut session = Session::new(RasterSurface::new(12, 8));
        let cancel = CancelFlag::new();
        cancel.cancel();
        let err = session.generate_from_bitmap(&split_photo(), &cancel).unwrap_err();
        assert!(matches!(err, SessionError::Processing(ProcessingError::Cancelled)));
        assert!(session.history().is_empty());
        assert_eq!(session.surface(), &RasterSurface::new(12, 8));
    }

    #[test]
    fn test_history_bounded_in_session() {
        let mut session = Session::new(RasterSurface::new(2, 2));
        for i in 0..25u8 {
            session.fill_at_hex(0, 0, &format!("#{:02x}0000", i)).unwrap();
        }
        assert_eq!(session.history().len(), 20);
    }
}
