// Console output for the wasm module. Browser builds go through `web_sys::console`,
// native builds (unit tests, tooling) write to stderr.

#[cfg(target_arch = "wasm32")]
use wasm_bindgen::JsValue;

#[cfg(target_arch = "wasm32")]
pub fn log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

#[cfg(target_arch = "wasm32")]
pub fn warn(s: &str) {
    web_sys::console::warn_1(&JsValue::from_str(s));
}

#[cfg(not(target_arch = "wasm32"))]
pub fn log(s: &str) {
    eprintln!("{}", s);
}

#[cfg(not(target_arch = "wasm32"))]
pub fn warn(s: &str) {
    eprintln!("warning: {}", s);
}

// Note: The console_log/console_warn macros are defined in lib.rs
