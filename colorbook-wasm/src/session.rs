use colorbook_core::exif_orientation::decode_upright;
use colorbook_core::{CancelFlag, DrawingSurface, RasterSurface, Session, Tool};
use wasm_bindgen::prelude::*;

use crate::params::LineArtParams;
use crate::processor::encode_png;
use crate::utils::{console_log, to_js_error};

/// A coloring page with its own undo history.
///
/// The page fetches photos itself (`fetch` in JS) and hands the bytes to
/// [`ColoringSession::load_photo`].
#[wasm_bindgen]
pub struct ColoringSession {
    inner: Session<RasterSurface>,
}

#[wasm_bindgen]
impl ColoringSession {
    #[wasm_bindgen(constructor)]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            inner: Session::new(RasterSurface::new(width, height)),
        }
    }

    #[wasm_bindgen(js_name = setParams)]
    pub fn set_params(&mut self, params: &LineArtParams) {
        self.inner.set_params(params.inner.clone());
    }

    /// Select the active tool: "brush", "eraser" or "fill".
    #[wasm_bindgen(js_name = setTool)]
    pub fn set_tool(&mut self, tool: &str) -> Result<(), JsValue> {
        let tool = match tool {
            "brush" => Tool::Brush,
            "eraser" => Tool::Eraser,
            "fill" => Tool::Fill,
            other => return Err(JsValue::from_str(&format!("Unknown tool '{}'", other))),
        };
        self.inner.set_tool(tool);
        Ok(())
    }

    #[wasm_bindgen(js_name = setColor)]
    pub fn set_color(&mut self, hex: &str) -> Result<(), JsValue> {
        self.inner
            .set_color_hex(hex)
            .map_err(|e| to_js_error("Invalid color", e))
    }

    /// Replace the page with line art made from an encoded photo.
    #[wasm_bindgen(js_name = loadPhoto)]
    pub fn load_photo(&mut self, image_bytes: &[u8]) -> Result<(), JsValue> {
        let img = decode_upright(image_bytes).map_err(|e| to_js_error("Failed to load image", e))?;
        self.inner
            .generate_from_bitmap(&img.to_rgba8(), &CancelFlag::new())
            .map_err(|e| to_js_error("Failed to process image", e))
    }

    /// Apply the active tool at a pointer position.
    ///
    /// Returns the number of pixels filled, or 0 when the tool does not fill.
    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self, x: u32, y: u32) -> Result<u32, JsValue> {
        let report = self
            .inner
            .pointer_down(x, y)
            .map_err(|e| to_js_error("Fill failed", e))?;
        Ok(report.map(|r| r.filled as u32).unwrap_or(0))
    }

    /// Flood fill at `(x, y)` with `color`, independent of the active tool.
    #[wasm_bindgen(js_name = fill)]
    pub fn fill(&mut self, x: u32, y: u32, color: &str) -> Result<u32, JsValue> {
        let report = self
            .inner
            .fill_at_hex(x, y, color)
            .map_err(|e| to_js_error("Fill failed", e))?;
        Ok(report.filled as u32)
    }

    pub fn clear(&mut self) -> Result<(), JsValue> {
        self.inner.clear().map_err(|e| to_js_error("Clear failed", e))
    }

    /// Revert the latest change. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool, JsValue> {
        let undone = self.inner.undo().map_err(|e| to_js_error("Undo failed", e))?;
        if !undone {
            console_log!("nothing to undo");
        }
        Ok(undone)
    }

    #[wasm_bindgen(js_name = undoDepth)]
    pub fn undo_depth(&self) -> usize {
        self.inner.history().len()
    }

    #[wasm_bindgen(getter)]
    pub fn width(&self) -> u32 {
        self.inner.surface().size().0
    }

    #[wasm_bindgen(getter)]
    pub fn height(&self) -> u32 {
        self.inner.surface().size().1
    }

    /// Raw RGBA pixels, ready for `new ImageData(...)`.
    pub fn pixels(&self) -> Vec<u8> {
        self.inner.surface().pixels().as_bytes().to_vec()
    }

    /// The page encoded as PNG, for saving.
    #[wasm_bindgen(js_name = toPng)]
    pub fn to_png(&self) -> Result<Vec<u8>, JsValue> {
        encode_png(self.inner.surface().read_pixels())
    }
}
