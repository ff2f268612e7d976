use wasm_bindgen::JsValue;

/// Set panic hook for better error messages in browser console
pub fn set_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! console_log {
    ($($t:tt)*) => (crate::utils::log(&format_args!($($t)*).to_string()))
}

pub(crate) use console_log;

/// Turn any displayable error into the string JS sees in `catch`.
pub fn to_js_error(context: &str, err: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, err))
}
