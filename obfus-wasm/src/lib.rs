mod obfuscate;

use obfus::rewrite::{Opcode, rules_for};
use wasm_bindgen::prelude::*;

/// Sets the panic hook to display useful error messages.
#[wasm_bindgen(js_name = "setPanicHook")]
pub fn set_panic_hook() {
    std::panic::set_hook(Box::new(console_error_panic_hook::hook));
}

#[wasm_bindgen]
pub enum Formatter {
    C,
    Rust,
    LLVM,
}

impl Formatter {
    pub fn to_rust(&self) -> obfus::formatter::Formatter {
        match self {
            Formatter::C => obfus::formatter::Formatter::C,
            Formatter::Rust => obfus::formatter::Formatter::Rust,
            Formatter::LLVM => obfus::formatter::Formatter::LLVM,
        }
    }
}

/// Returns the rewrite forms of an operation as strings.
///
/// The operation is given by its symbol, e.g. `"+"`.
#[wasm_bindgen(js_name = "catalogForms")]
pub fn catalog_forms(op: &str) -> Result<js_sys::Array, String> {
    let op = Opcode::ALL
        .into_iter()
        .find(|o| o.symbol() == op)
        .ok_or_else(|| format!("Unknown operation '{op}'"))?;

    Ok(rules_for(op)
        .iter()
        .map(|r| JsValue::from_str(r.formula()))
        .collect())
}
