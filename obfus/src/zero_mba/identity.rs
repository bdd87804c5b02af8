//! Turning an [`Identity`] into an expression.

use log::debug;
use rand::Rng;

use super::signs::{Sign, SignVector};
use super::solution::Identity;
use super::sop::sum_of_products;
use crate::builder::ExprBuilder;
use crate::config::ObfuscationConfig;
use crate::error::{Error, Result};
use crate::int_type::IntType;

impl Identity {
    /// Builds the zero identity over `vars`.
    ///
    /// The result is `Σ signs[j] * sop(column j)` which is zero for all values
    /// of the variables.
    pub fn build<B: ExprBuilder>(
        &self,
        b: &mut B,
        vars: &[B::Node],
        ty: IntType,
    ) -> Result<B::Node> {
        if vars.len() != self.vars() {
            return Err(Error::VarCountMismatch {
                expected: self.vars(),
                got: vars.len(),
            });
        }

        let m = self.matrix();
        let columns: Vec<_> = (0..m.num_cols())
            .map(|c| sum_of_products(b, vars, &m.col(c), ty))
            .collect();

        Ok(assemble(b, &columns, self.signs(), ty))
    }
}

/// Combines the expressions of the columns with their signs.
///
/// The first column is multiplied by its sign, unless the sign is `+1`. All
/// other columns are added or subtracted depending on their sign.
pub fn assemble<B: ExprBuilder>(
    b: &mut B,
    columns: &[B::Node],
    signs: &SignVector,
    ty: IntType,
) -> B::Node {
    assert_eq!(columns.len(), signs.len(), "Need one sign per column.");
    assert!(!columns.is_empty(), "Need at least one column.");

    let mut it = columns.iter().zip(signs.iter());
    let Some((first, sign)) = it.next() else { unreachable!() };
    let mut acc = match sign {
        Sign::Pos => first.clone(),
        Sign::Neg => {
            let c = b.signed_constant(ty, -1);
            b.mul(first, &c)
        },
    };

    for (col, sign) in it {
        acc = match sign {
            Sign::Pos => b.add(&acc, col),
            Sign::Neg => b.sub(&acc, col),
        };
    }

    acc
}

/// Generates a fresh random zero identity over `vars`.
///
/// This is the "opaque zero" other expressions are padded with.
pub fn zero_identity<B: ExprBuilder, R: Rng>(
    b: &mut B,
    vars: &[B::Node],
    ty: IntType,
    cfg: &ObfuscationConfig,
    rng: &mut R,
) -> Result<B::Node> {
    let id = Identity::generate(vars.len(), cfg, rng)?;
    debug!("Zero identity over {} variables with signs {}", vars.len(), id.signs());
    id.build(b, vars, ty)
}

#[cfg(test)]
mod test {
    use rand::{SeedableRng as _, rngs::StdRng};
    use test_log::test;

    use super::*;
    use crate::builder::Evaluator;
    use crate::expr::{Expr, TreeBuilder};
    use crate::valuation::Valuation;
    use crate::zero_mba::matrix::BoolMatrix;

    fn cfg_for(vars: usize) -> ObfuscationConfig {
        ObfuscationConfig { var_count: vars, ..Default::default() }
    }

    /// Evaluates the identity for all assignments of 0/-1 to the variables.
    #[test]
    fn zero_for_all_boolean_assignments() {
        let mut rng = StdRng::seed_from_u64(3);
        for ty in [IntType::I1, IntType::I8, IntType::I32] {
            for n in 2..=4 {
                let cfg = cfg_for(n);
                for _ in 0..5 {
                    let id = Identity::generate(n, &cfg, &mut rng).unwrap();
                    for i in 0..1usize << n {
                        let mut b = Evaluator::new(ty);
                        let vars: Vec<u64> = (0..n)
                            .map(|j| if (i >> j) & 1 == 1 { ty.ones() } else { 0 })
                            .collect();
                        assert_eq!(id.build(&mut b, &vars, ty).unwrap(), 0);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_for_random_values() {
        let mut rng = StdRng::seed_from_u64(4);
        let ty = IntType::I64;
        for n in 2..=4 {
            let cfg = cfg_for(n);
            let id = Identity::generate(n, &cfg, &mut rng).unwrap();
            for _ in 0..100 {
                let mut b = Evaluator::new(ty);
                let vars: Vec<u64> = (0..n).map(|_| ty.random(&mut rng)).collect();
                assert_eq!(id.build(&mut b, &vars, ty).unwrap(), 0);
            }
        }
    }

    #[test]
    fn tree_backend_agrees() {
        let mut rng = StdRng::seed_from_u64(5);
        let ty = IntType::I16;
        let names = ["x", "y", "z"];
        let vars: Vec<_> = names.iter().map(|n| Expr::var(*n)).collect();
        let e = zero_identity(&mut TreeBuilder, &vars, ty, &cfg_for(3), &mut rng).unwrap();
        for seed in 0..50 {
            let mut v = Valuation::random_seeded(seed);
            assert_eq!(e.eval(&mut v, ty), 0, "{e}");
        }
    }

    #[test]
    fn unsupported_var_counts_are_errors() {
        let mut rng = StdRng::seed_from_u64(6);
        let ty = IntType::I8;
        let cfg = ObfuscationConfig::default();

        let r = zero_identity(&mut Evaluator::new(ty), &[], ty, &cfg, &mut rng);
        assert!(matches!(r, Err(Error::InvalidConfig(_))));

        let vars: Vec<_> = (0..7).map(|i| Expr::var(format!("v{i}").as_str())).collect();
        let r = zero_identity(&mut TreeBuilder, &vars, ty, &cfg, &mut rng);
        assert!(matches!(r, Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn assemble_skips_multiplying_by_one() {
        let ty = IntType::I8;
        let cols = [Expr::var("a"), Expr::var("b"), Expr::var("c")];
        let e = assemble(&mut TreeBuilder, &cols, &SignVector::from_index(3, 0b100), ty);
        assert_eq!(e.to_string(), "a + b - c");
        let e = assemble(&mut TreeBuilder, &cols, &SignVector::from_index(3, 0b011), ty);
        assert_eq!(e.to_string(), "a * 255 - b + c");
    }

    #[test]
    fn wrong_var_count() {
        let c1 = [true, true, true, true, false, false, false, false];
        let c2 = [true; 8];
        let m = BoolMatrix::from_random_cols(3, &[&c1, &c2]);
        let id = Identity::new(m, SignVector::from_index(3, 0b011)).unwrap();
        let ty = IntType::I8;
        let mut b = Evaluator::new(ty);
        assert_eq!(
            id.build(&mut b, &[1, 2], ty),
            Err(Error::VarCountMismatch { expected: 3, got: 2 })
        );
        assert_eq!(id.build(&mut b, &[1, 2, 3], ty), Ok(0));
    }
}
