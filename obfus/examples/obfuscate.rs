use obfus::config::ObfuscationConfig;
use obfus::formatter::Formatter;
use obfus::int_type::IntType;
use obfus::ir::Function;
use obfus::pass::ObfuscationPass;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Info,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    // The example will obfuscate x+y where x and y are 8 bit integers.
    // This should be about the same as the WASM obfuscation.
    let ty = IntType::I8;
    let mut f = Function::parse("f", "x + y", ty)?;

    let pass = ObfuscationPass::new(ObfuscationConfig::default())?;
    pass.run_seeded(&mut f);

    println!("{}", f.to_expr().display_function(Formatter::C, "f", ty));
    Ok(())
}
