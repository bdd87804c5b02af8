use obfus::config::ObfuscationConfig;
use obfus::expr::{Expr, TreeBuilder};
use obfus::int_type::IntType;
use obfus::ir::Function;
use obfus::pass::ObfuscationPass;
use obfus::zero_mba::zero_identity;
use rand::{SeedableRng as _, rngs::StdRng};
use wasm_bindgen::prelude::*;

use crate::Formatter;

fn int_type(bits: u32) -> Result<IntType, String> {
    IntType::try_new(bits).ok_or_else(|| format!("Unsupported width {bits}"))
}

fn rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_rng(&mut rand::rng()),
    }
}

/// Obfuscates an expression with the rewrite catalog and zero identities.
#[wasm_bindgen(js_name = "obfuscate")]
pub fn obfuscate(
    expr: String,
    bits: u32,
    seed: Option<u64>,
    #[wasm_bindgen(js_name = "varCount")] var_count: usize,
    formatter: Formatter,
) -> Result<String, String> {
    let ty = int_type(bits)?;
    let mut f = Function::parse("f", &expr, ty).map_err(|e| e.to_string())?;

    let cfg = ObfuscationConfig {
        var_count,
        skip_functions: Vec::new(),
        ..Default::default()
    };
    let pass = ObfuscationPass::new(cfg).map_err(|e| e.to_string())?;
    let stats = pass.run(&mut f, &mut rng(seed));
    web_sys::console::log_1(&format!("{stats}").into());

    Ok(match formatter.to_rust() {
        obfus::formatter::Formatter::LLVM => f.to_string(),
        fmt => f.to_expr().display_function(fmt, "f", ty).to_string(),
    })
}

/// Prints a random zero identity over the variables `a`, `b`, ...
#[wasm_bindgen(js_name = "zeroIdentity")]
pub fn zero_identity_fn(
    vars: usize,
    bits: u32,
    seed: Option<u64>,
    formatter: Formatter,
) -> Result<String, String> {
    let ty = int_type(bits)?;
    let cfg = ObfuscationConfig { var_count: vars, ..Default::default() };
    cfg.validate().map_err(|e| e.to_string())?;

    let names: Vec<_> = (0..vars)
        .map(|i| Expr::var(((b'a' + i as u8) as char).to_string().as_str()))
        .collect();
    let e = zero_identity(&mut TreeBuilder, &names, ty, &cfg, &mut rng(seed))
        .map_err(|e| e.to_string())?;

    Ok(e.display_function(formatter.to_rust(), "zero", ty).to_string())
}
