use wasm_bindgen::prelude::*;

mod params;
mod processor;
mod session;
mod utils;

pub use params::LineArtParams;
pub use processor::LineArtProcessor;
pub use session::ColoringSession;

/// Initialize the WASM module (sets up panic hook).
#[wasm_bindgen(start)]
pub fn init() {
    utils::set_panic_hook();
}
