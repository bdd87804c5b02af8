//! Bit-vector formulas for Z3, used to prove the rewrites correct.

use z3::ast::{Ast, BV};
use z3::{Context, SatResult, Solver};

use crate::builder::ExprBuilder;
use crate::expr::{Expr, ExprOp, Predicate};
use crate::int_type::IntType;

/// [`ExprBuilder`] that builds Z3 bit-vectors.
pub struct Z3Builder<'ctx> {
    ctx: &'ctx Context,
}

impl<'ctx> Z3Builder<'ctx> {
    pub fn new(ctx: &'ctx Context) -> Self {
        Self { ctx }
    }

    /// A fresh bit-vector variable.
    pub fn var(&self, name: &str, ty: IntType) -> BV<'ctx> {
        BV::new_const(self.ctx, name, ty.bits())
    }
}

impl<'ctx> ExprBuilder for Z3Builder<'ctx> {
    type Node = BV<'ctx>;

    fn constant(&mut self, ty: IntType, value: u64) -> BV<'ctx> {
        BV::from_u64(self.ctx, ty.element(value), ty.bits())
    }

    fn not(&mut self, e: &BV<'ctx>) -> BV<'ctx> {
        e.bvnot()
    }

    fn and(&mut self, l: &BV<'ctx>, r: &BV<'ctx>) -> BV<'ctx> {
        l.bvand(r)
    }

    fn or(&mut self, l: &BV<'ctx>, r: &BV<'ctx>) -> BV<'ctx> {
        l.bvor(r)
    }

    fn xor(&mut self, l: &BV<'ctx>, r: &BV<'ctx>) -> BV<'ctx> {
        l.bvxor(r)
    }

    fn add(&mut self, l: &BV<'ctx>, r: &BV<'ctx>) -> BV<'ctx> {
        l.bvadd(r)
    }

    fn sub(&mut self, l: &BV<'ctx>, r: &BV<'ctx>) -> BV<'ctx> {
        l.bvsub(r)
    }

    fn mul(&mut self, l: &BV<'ctx>, r: &BV<'ctx>) -> BV<'ctx> {
        l.bvmul(r)
    }
}

impl Expr {
    /// Converts the expression into a Z3 bit-vector.
    pub fn to_z3_bv<'ctx>(&self, ctx: &'ctx Context, ty: IntType) -> BV<'ctx> {
        use ExprOp::*;
        let w = ty.bits();
        match self.as_ref() {
            Const(c) => BV::from_u64(ctx, ty.element(*c), w),
            Var(v) => BV::new_const(ctx, v.as_str(), w),
            Add(l, r) => l.to_z3_bv(ctx, ty).bvadd(&r.to_z3_bv(ctx, ty)),
            Sub(l, r) => l.to_z3_bv(ctx, ty).bvsub(&r.to_z3_bv(ctx, ty)),
            Mul(l, r) => l.to_z3_bv(ctx, ty).bvmul(&r.to_z3_bv(ctx, ty)),
            Neg(i) => i.to_z3_bv(ctx, ty).bvneg(),
            And(l, r) => l.to_z3_bv(ctx, ty).bvand(&r.to_z3_bv(ctx, ty)),
            Or(l, r) => l.to_z3_bv(ctx, ty).bvor(&r.to_z3_bv(ctx, ty)),
            Xor(l, r) => l.to_z3_bv(ctx, ty).bvxor(&r.to_z3_bv(ctx, ty)),
            Not(i) => i.to_z3_bv(ctx, ty).bvnot(),
            Cmp(p, l, r) => {
                let (l, r) = (l.to_z3_bv(ctx, ty), r.to_z3_bv(ctx, ty));
                let holds = match p {
                    Predicate::Eq => l._eq(&r),
                    Predicate::Ne => l._eq(&r).not(),
                    Predicate::Ult => l.bvult(&r),
                };
                let one = BV::from_u64(ctx, 1, w);
                let zero = BV::from_u64(ctx, 0, w);
                holds.ite(&one, &zero)
            },
        }
    }
}

/// Checks whether two bit-vectors are equal for all values of their
/// variables.
///
/// Returns `None` if Z3 gave up.
pub fn prove_equal<'ctx>(
    ctx: &'ctx Context,
    l: &BV<'ctx>,
    r: &BV<'ctx>,
) -> Option<bool> {
    let solver = Solver::new(ctx);
    solver.assert(&l._eq(r).not());
    match solver.check() {
        SatResult::Unsat => Some(true),
        SatResult::Sat => Some(false),
        SatResult::Unknown => None,
    }
}

#[cfg(test)]
mod test {
    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;
    use crate::config::ObfuscationConfig;
    use crate::rewrite::Rule;
    use crate::zero_mba::zero_identity;

    #[test]
    fn prove_rules() {
        let cfg = z3::Config::new();
        let ctx = Context::new(&cfg);
        for ty in [IntType::I8, IntType::I16, IntType::I32] {
            let mut b = Z3Builder::new(&ctx);
            let x = b.var("x", ty);
            let y = b.var("y", ty);
            for rule in Rule::ALL {
                let rewritten = rule.build(&mut b, &x, &y, ty);
                let plain = rule.opcode().build(&mut b, &x, &y);
                assert_eq!(
                    prove_equal(&ctx, &rewritten, &plain),
                    Some(true),
                    "{rule} at {ty}"
                );
            }
        }
    }

    #[test]
    fn prove_identities() {
        let cfg = z3::Config::new();
        let ctx = Context::new(&cfg);
        let mut rng = StdRng::seed_from_u64(0);
        let ty = IntType::I32;
        for n in 2..=4 {
            let cfg = ObfuscationConfig { var_count: n, ..Default::default() };
            let mut b = Z3Builder::new(&ctx);
            let vars: Vec<_> = (0..n).map(|i| b.var(&format!("v{i}"), ty)).collect();
            let zero = zero_identity(&mut b, &vars, ty, &cfg, &mut rng).unwrap();
            let c = b.constant(ty, 0);
            assert_eq!(prove_equal(&ctx, &zero, &c), Some(true));
        }
    }

    #[test]
    fn expr_to_z3() {
        let cfg = z3::Config::new();
        let ctx = Context::new(&cfg);
        let ty = IntType::I8;
        let l = Expr::from_string("(x == 0) + (x != 0)".to_owned(), ty).unwrap();
        let r = Expr::from_string("1".to_owned(), ty).unwrap();
        assert_eq!(
            prove_equal(&ctx, &l.to_z3_bv(&ctx, ty), &r.to_z3_bv(&ctx, ty)),
            Some(true)
        );
    }
}
