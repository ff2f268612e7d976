use colorbook_core::LineArtParams as CoreLineArtParams;
use wasm_bindgen::prelude::*;

use crate::utils::to_js_error;

/// Processing parameters for line-art generation.
#[wasm_bindgen]
pub struct LineArtParams {
    pub(crate) inner: CoreLineArtParams,
}

#[wasm_bindgen]
impl LineArtParams {
    /// Create parameters with custom values.
    #[wasm_bindgen(constructor)]
    pub fn new(contrast: f32, smoothing: bool, threshold: f32, multiplier: f32) -> Result<LineArtParams, JsValue> {
        let inner = CoreLineArtParams {
            contrast,
            smoothing,
            threshold,
            multiplier,
            max_width: None,
            max_height: None,
        };
        inner.validate().map_err(|e| to_js_error("Invalid parameters", e))?;
        Ok(Self { inner })
    }

    /// Look up a preset by name: standard, bold, fine or classic.
    #[wasm_bindgen(js_name = fromPreset)]
    pub fn from_preset(name: &str) -> Result<LineArtParams, JsValue> {
        CoreLineArtParams::from_preset(name)
            .map(|inner| Self { inner })
            .ok_or_else(|| JsValue::from_str(&format!("Unknown preset '{}'", name)))
    }

    /// Standard preset: balanced outlines for typical photos.
    #[wasm_bindgen(js_name = standard)]
    pub fn standard() -> Self {
        Self {
            inner: CoreLineArtParams::standard(),
        }
    }

    /// Bold preset: thick, dark outlines.
    #[wasm_bindgen(js_name = bold)]
    pub fn bold() -> Self {
        Self {
            inner: CoreLineArtParams::bold(),
        }
    }

    /// Fine preset: thin lines, keeps small detail.
    #[wasm_bindgen(js_name = fine)]
    pub fn fine() -> Self {
        Self {
            inner: CoreLineArtParams::fine(),
        }
    }

    /// Classic preset: raw Sobel output without preprocessing.
    #[wasm_bindgen(js_name = classic)]
    pub fn classic() -> Self {
        Self {
            inner: CoreLineArtParams::classic(),
        }
    }

    /// Fit photos into a `width` x `height` canvas before processing.
    #[wasm_bindgen(js_name = withCanvas)]
    pub fn with_canvas(&self, width: u32, height: u32) -> LineArtParams {
        Self {
            inner: self.inner.clone().with_canvas(width, height),
        }
    }

    #[wasm_bindgen(getter)]
    pub fn contrast(&self) -> f32 {
        self.inner.contrast
    }

    #[wasm_bindgen(getter)]
    pub fn smoothing(&self) -> bool {
        self.inner.smoothing
    }

    #[wasm_bindgen(getter)]
    pub fn threshold(&self) -> f32 {
        self.inner.threshold
    }

    #[wasm_bindgen(getter)]
    pub fn multiplier(&self) -> f32 {
        self.inner.multiplier
    }
}
