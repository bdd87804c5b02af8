//! Obfuscation with Mixed Boolean-Arithmetic.
//!
//! The crate synthesizes zero identities, i.e. expressions in some variables
//! that are zero for all values of the variables, and uses them together with
//! a catalog of rewrite rules to replace simple integer operations by
//! equivalent but much less readable ones.
//!
//! Everything that generates expressions is generic over an
//! [`builder::ExprBuilder`], so the same code can compute values, build
//! expression trees, emit instructions into an [`ir::Function`] or build Z3
//! formulas.
//!
//! ```
//! use obfus::config::ObfuscationConfig;
//! use obfus::expr::Expr;
//! use obfus::int_type::IntType;
//! use obfus::ir::Function;
//! use obfus::pass::ObfuscationPass;
//!
//! let ty = IntType::I8;
//! let e = Expr::from_string("x + y".to_owned(), ty).unwrap();
//! let mut f = Function::from_expr("f", &e, ty);
//! let pass = ObfuscationPass::new(ObfuscationConfig::default()).unwrap();
//! let stats = pass.run_seeded(&mut f);
//! assert!(stats.changed());
//! assert_eq!(f.eval(&[100, 200]), 44);
//! ```

// It would be nicer to import the symbol_table crate ourselves,
// and re-export GlobalSymbol, but we don't want to run into
// version conflicts.
pub use egg::Symbol;

pub mod builder;
pub mod config;
pub mod error;
pub mod expr;
pub mod formatter;
pub mod int_type;
pub mod ir;
pub mod pass;
pub mod rewrite;
pub mod valuation;
pub mod zero_mba;

#[cfg(feature = "z3")]
pub mod z3_builder;
