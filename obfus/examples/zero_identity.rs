use obfus::config::ObfuscationConfig;
use obfus::expr::{Expr, TreeBuilder};
use obfus::formatter::Formatter;
use obfus::int_type::IntType;
use obfus::zero_mba::Identity;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    // Print a zero identity for each supported number of variables.
    let ty = IntType::I32;
    let names = ["a", "b", "c", "d"];
    for n in 2..=4 {
        let cfg = ObfuscationConfig { var_count: n, ..Default::default() };
        let mut rng = cfg.rng();

        let id = Identity::generate(n, &cfg, &mut rng)?;
        println!("Matrix:\n{}", id.matrix());
        println!("Signs: {}", id.signs());

        let vars: Vec<_> = names[..n].iter().map(|v| Expr::var(*v)).collect();
        let e = id.build(&mut TreeBuilder, &vars, ty)?;
        println!("{}\n", e.display_function(Formatter::Rust, "zero", ty));
    }

    Ok(())
}
