use obfus::config::ObfuscationConfig;
use obfus::expr::Predicate;
use obfus::int_type::IntType;
use obfus::ir::{BinOp, Function, Op, Value};
use obfus::pass::ObfuscationPass;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    simplelog::TermLogger::init(
        simplelog::LevelFilter::Debug,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    )?;

    // f(x, y) = ((x ^ y) * 3 == 0) + (x | y)
    let ty = IntType::I32;
    let mut f = Function::new("f", ty, vec!["x".into(), "y".into()]);
    let (x, y) = (Value::Param(0), Value::Param(1));
    let t = f.push(Op::Bin(BinOp::Xor, x, y));
    let t = f.push(Op::Bin(BinOp::Mul, t, Value::Const(3)));
    let c = f.push(Op::Cmp(Predicate::Eq, t, Value::Const(0)));
    let o = f.push(Op::Bin(BinOp::Or, x, y));
    let r = f.push(Op::Bin(BinOp::Add, c, o));
    f.set_ret(r);

    println!("{f}\n");
    let orig = f.clone();

    let pass = ObfuscationPass::new(ObfuscationConfig::default())?;
    let stats = pass.run_seeded(&mut f);
    println!("{f}\n");
    println!("{stats}");

    for args in [[0, 0], [1, 2], [5, 5], [u32::MAX as u64, 17]] {
        assert_eq!(f.eval(&args), orig.eval(&args));
    }

    // `main` is left alone.
    let mut main = Function::new("main", ty, Vec::new());
    let r = main.push(Op::Bin(BinOp::Add, Value::Const(1), Value::Const(2)));
    main.set_ret(r);
    let stats = pass.run_seeded(&mut main);
    assert!(stats.skipped_function);

    Ok(())
}
