//! The interface between the engine and whatever it emits expressions into.
//!
//! The zero identity synthesis and the rewrite catalog only ever talk to an
//! [`ExprBuilder`]. The crate ships four of them:
//! - [`Evaluator`], which computes concrete values and is used to test the
//!   engine exhaustively on small widths,
//! - [`crate::expr::TreeBuilder`], which builds an [`crate::expr::Expr`],
//! - [`crate::ir::InstBuilder`], which appends instructions to a host
//!   function,
//! - `Z3Builder` (feature `z3`), which builds bit-vector formulas so the
//!   rewrites can be proven correct.

use crate::int_type::IntType;

/// Builds expressions over fixed-width integers.
///
/// All operations are bitwise or wrapping, i.e. `not` is the bitwise
/// complement and `add`, `sub`, `mul` are taken modulo `2^bits`.
pub trait ExprBuilder {
    /// A handle to a built expression. The engine clones and combines these
    /// but never looks inside.
    type Node: Clone;

    /// An integer constant of type `ty`.
    /// `value` is reduced modulo `2^bits` by the builder.
    fn constant(&mut self, ty: IntType, value: u64) -> Self::Node;

    fn not(&mut self, e: &Self::Node) -> Self::Node;

    fn and(&mut self, l: &Self::Node, r: &Self::Node) -> Self::Node;

    fn or(&mut self, l: &Self::Node, r: &Self::Node) -> Self::Node;

    fn xor(&mut self, l: &Self::Node, r: &Self::Node) -> Self::Node;

    fn add(&mut self, l: &Self::Node, r: &Self::Node) -> Self::Node;

    fn sub(&mut self, l: &Self::Node, r: &Self::Node) -> Self::Node;

    fn mul(&mut self, l: &Self::Node, r: &Self::Node) -> Self::Node;

    /// Convenience for `constant(ty, ty.from_i64(value))`.
    fn signed_constant(&mut self, ty: IntType, value: i64) -> Self::Node {
        self.constant(ty, ty.from_i64(value))
    }
}

/// Builder that evaluates everything right away.
///
/// The nodes are the values themselves. This is the cheapest way to check
/// that something the engine builds has the value it should.
#[derive(Clone, Copy, Debug)]
pub struct Evaluator {
    ty: IntType,
}

impl Evaluator {
    pub fn new(ty: IntType) -> Self {
        Self { ty }
    }

    pub fn ty(&self) -> IntType {
        self.ty
    }
}

impl ExprBuilder for Evaluator {
    type Node = u64;

    fn constant(&mut self, ty: IntType, value: u64) -> u64 {
        debug_assert_eq!(ty, self.ty, "Constant of the wrong type.");
        ty.element(value)
    }

    fn not(&mut self, e: &u64) -> u64 {
        self.ty.not(*e)
    }

    fn and(&mut self, l: &u64, r: &u64) -> u64 {
        IntType::and(*l, *r)
    }

    fn or(&mut self, l: &u64, r: &u64) -> u64 {
        IntType::or(*l, *r)
    }

    fn xor(&mut self, l: &u64, r: &u64) -> u64 {
        IntType::xor(*l, *r)
    }

    fn add(&mut self, l: &u64, r: &u64) -> u64 {
        self.ty.add(*l, *r)
    }

    fn sub(&mut self, l: &u64, r: &u64) -> u64 {
        self.ty.sub(*l, *r)
    }

    fn mul(&mut self, l: &u64, r: &u64) -> u64 {
        self.ty.mul(*l, *r)
    }
}

#[test]
fn evaluator_wraps() {
    let mut b = Evaluator::new(IntType::I8);
    let x = b.constant(IntType::I8, 200);
    let y = b.signed_constant(IntType::I8, -1);
    assert_eq!(y, 255);
    assert_eq!(b.add(&x, &x), 144);
    assert_eq!(b.sub(&x, &y), 201);
    assert_eq!(b.mul(&y, &y), 1);
    assert_eq!(b.not(&x), 55);
}
