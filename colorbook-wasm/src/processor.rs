use colorbook_core::exif_orientation::decode_upright;
use colorbook_core::{flood_fill, generate_line_art, PixelBuffer};
use image::{ImageFormat, RgbaImage};
use std::io::Cursor;
use wasm_bindgen::prelude::*;

use crate::params::LineArtParams;
use crate::utils::{console_log, to_js_error};

/// Stateless entry points for one-off conversions.
#[wasm_bindgen]
pub struct LineArtProcessor;

#[wasm_bindgen]
impl LineArtProcessor {
    /// Turn a photo into line art.
    ///
    /// # Arguments
    /// * `image_bytes` - Input image as byte array (PNG, JPEG, WebP, etc.)
    /// * `params` - Processing parameters
    ///
    /// # Returns
    /// PNG-encoded image bytes
    #[wasm_bindgen(js_name = processImage)]
    pub fn process_image(image_bytes: &[u8], params: &LineArtParams) -> Result<Vec<u8>, JsValue> {
        let img = decode_upright(image_bytes).map_err(|e| to_js_error("Failed to load image", e))?;
        let art = generate_line_art(&img.to_rgba8(), &params.inner)
            .map_err(|e| to_js_error("Failed to process image", e))?;
        console_log!("line art {}x{}", art.width(), art.height());
        encode_png(art)
    }

    /// Flood fill raw RGBA pixels in place, as read from a canvas `ImageData`.
    ///
    /// Returns the number of pixels recolored.
    #[wasm_bindgen(js_name = floodFill)]
    pub fn flood_fill(
        rgba: &mut [u8],
        width: u32,
        height: u32,
        x: u32,
        y: u32,
        color: &str,
    ) -> Result<u32, JsValue> {
        let mut buf = PixelBuffer::from_raw(width, height, rgba.to_vec())
            .map_err(|e| to_js_error("Invalid pixel data", e))?;
        let report = flood_fill(&mut buf, x, y, color).map_err(|e| to_js_error("Fill failed", e))?;
        rgba.copy_from_slice(buf.as_bytes());
        Ok(report.filled as u32)
    }
}

pub(crate) fn encode_png(buf: PixelBuffer) -> Result<Vec<u8>, JsValue> {
    let img: RgbaImage = buf.into();
    let mut output = Vec::new();
    img.write_to(&mut Cursor::new(&mut output), ImageFormat::Png)
        .map_err(|e| to_js_error("Failed to encode PNG", e))?;
    Ok(output)
}
