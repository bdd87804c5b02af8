//! Zero identities: expressions over boolean functions of some variables that
//! are zero no matter what the variables are.
//!
//! The construction samples a `2^n × n` boolean matrix whose columns are truth
//! tables, searches a vector `v` over `{-1, +1}` with `F · v = 0` and then
//! writes down `Σ v_j * f_j(vars)` where `f_j` is the sum of products of
//! column `j`. Since the `f_j` are bitwise, every bit of the sum is a row of
//! `F · v` and so the whole thing is zero.
//! See "Information Hiding in Software with Mixed Boolean-Arithmetic
//! Transforms" by Zhou et al.

mod identity;
mod matrix;
mod signs;
mod solution;
mod sop;

pub use identity::*;
pub use matrix::*;
pub use signs::*;
pub use solution::*;
pub use sop::*;
