//! The catalog of rewrite rules.
//!
//! Each supported binary operation has a handful of forms that compute the
//! same function but look nothing like it. On top of that, an operand can be
//! padded with a zero identity first, so that the rewritten expression also
//! depends on some random constants.

use std::collections::HashMap;
use std::fmt::Display;

use log::debug;
use rand::Rng;

use crate::builder::ExprBuilder;
use crate::config::ObfuscationConfig;
use crate::error::Result;
use crate::int_type::IntType;
use crate::zero_mba::zero_identity;

/// The binary operations the catalog knows rewrites for.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    Add,
    Sub,
    Xor,
    Or,
    And,
}

impl Opcode {
    pub const ALL: [Opcode; 5] =
        [Opcode::Add, Opcode::Sub, Opcode::Xor, Opcode::Or, Opcode::And];

    /// Applies the operation to two values of type `ty`.
    pub fn eval(self, l: u64, r: u64, ty: IntType) -> u64 {
        match self {
            Opcode::Add => ty.add(l, r),
            Opcode::Sub => ty.sub(l, r),
            Opcode::Xor => IntType::xor(l, r),
            Opcode::Or => IntType::or(l, r),
            Opcode::And => IntType::and(l, r),
        }
    }

    /// Builds the plain operation.
    pub fn build<B: ExprBuilder>(
        self,
        b: &mut B,
        l: &B::Node,
        r: &B::Node,
    ) -> B::Node {
        match self {
            Opcode::Add => b.add(l, r),
            Opcode::Sub => b.sub(l, r),
            Opcode::Xor => b.xor(l, r),
            Opcode::Or => b.or(l, r),
            Opcode::And => b.and(l, r),
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Opcode::Add => "+",
            Opcode::Sub => "-",
            Opcode::Xor => "^",
            Opcode::Or => "|",
            Opcode::And => "&",
        }
    }
}

impl Display for Opcode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Opcode::Add => "add",
            Opcode::Sub => "sub",
            Opcode::Xor => "xor",
            Opcode::Or => "or",
            Opcode::And => "and",
        };
        f.write_str(s)
    }
}

/// A rewrite rule, i.e. an expression in `x` and `y` that is equal to
/// `x op y` for all values.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Rule {
    AddXorAnd,
    AddOrAnd,
    AddOrXor,
    AddNot,

    SubNotAdd,
    SubXorAnd,
    SubAndNot,
    SubNot,

    XorOrAnd,
    XorOrNandAnd,
    XorAndNot,
    XorAddAnd,

    OrXorAnd,
    OrAddAnd,
    OrAndNotAdd,
    OrDeMorgan,

    AndMinusOne,
    AndOrXor,
    AndNotOr,
    AndDeMorgan,
}

impl Rule {
    pub const ALL: [Rule; 20] = [
        Rule::AddXorAnd, Rule::AddOrAnd, Rule::AddOrXor, Rule::AddNot,
        Rule::SubNotAdd, Rule::SubXorAnd, Rule::SubAndNot, Rule::SubNot,
        Rule::XorOrAnd, Rule::XorOrNandAnd, Rule::XorAndNot, Rule::XorAddAnd,
        Rule::OrXorAnd, Rule::OrAddAnd, Rule::OrAndNotAdd, Rule::OrDeMorgan,
        Rule::AndMinusOne, Rule::AndOrXor, Rule::AndNotOr, Rule::AndDeMorgan,
    ];

    /// The operation this rule replaces.
    pub fn opcode(self) -> Opcode {
        use Rule::*;
        match self {
            AddXorAnd | AddOrAnd | AddOrXor | AddNot => Opcode::Add,
            SubNotAdd | SubXorAnd | SubAndNot | SubNot => Opcode::Sub,
            XorOrAnd | XorOrNandAnd | XorAndNot | XorAddAnd => Opcode::Xor,
            OrXorAnd | OrAddAnd | OrAndNotAdd | OrDeMorgan => Opcode::Or,
            AndMinusOne | AndOrXor | AndNotOr | AndDeMorgan => Opcode::And,
        }
    }

    /// The rule as an expression in `x` and `y`.
    /// It can be parsed with [`crate::expr::Expr::from_string`].
    pub fn formula(self) -> &'static str {
        use Rule::*;
        match self {
            AddXorAnd => "(x ^ y) + 2 * (x & y)",
            AddOrAnd => "(x | y) + (x & y)",
            AddOrXor => "2 * (x | y) - (x ^ y)",
            AddNot => "x - ~y - 1",
            SubNotAdd => "~(~x + y)",
            SubXorAnd => "(x ^ y) - 2 * (~x & y)",
            SubAndNot => "(x & ~y) - (~x & y)",
            SubNot => "x + ~y + 1",
            XorOrAnd => "(x | y) - (x & y)",
            XorOrNandAnd => "(x | y) & ~(x & y)",
            XorAndNot => "(x & ~y) | (~x & y)",
            XorAddAnd => "x + y - 2 * (x & y)",
            OrXorAnd => "(x ^ y) ^ (x & y)",
            OrAddAnd => "(x ^ y) + (x & y)",
            OrAndNotAdd => "(x & ~y) + y",
            OrDeMorgan => "~(~x & ~y)",
            AndMinusOne => "-1 - ((-1 - x) | (-1 - y))",
            AndOrXor => "(x | y) - (x ^ y)",
            AndNotOr => "(~x | y) - ~x",
            AndDeMorgan => "~(~x | ~y)",
        }
    }

    /// Builds the rule for the operands `x` and `y`.
    pub fn build<B: ExprBuilder>(
        self,
        b: &mut B,
        x: &B::Node,
        y: &B::Node,
        ty: IntType,
    ) -> B::Node {
        use Rule::*;
        match self {
            AddXorAnd => {
                let xor = b.xor(x, y);
                let and = b.and(x, y);
                let two = b.constant(ty, 2);
                let twice = b.mul(&two, &and);
                b.add(&xor, &twice)
            },
            AddOrAnd => {
                let or = b.or(x, y);
                let and = b.and(x, y);
                b.add(&or, &and)
            },
            AddOrXor => {
                let or = b.or(x, y);
                let two = b.constant(ty, 2);
                let twice = b.mul(&two, &or);
                let xor = b.xor(x, y);
                b.sub(&twice, &xor)
            },
            AddNot => {
                let ny = b.not(y);
                let d = b.sub(x, &ny);
                let one = b.constant(ty, 1);
                b.sub(&d, &one)
            },
            SubNotAdd => {
                let nx = b.not(x);
                let s = b.add(&nx, y);
                b.not(&s)
            },
            SubXorAnd => {
                let xor = b.xor(x, y);
                let nx = b.not(x);
                let and = b.and(&nx, y);
                let two = b.constant(ty, 2);
                let twice = b.mul(&two, &and);
                b.sub(&xor, &twice)
            },
            SubAndNot => {
                let ny = b.not(y);
                let l = b.and(x, &ny);
                let nx = b.not(x);
                let r = b.and(&nx, y);
                b.sub(&l, &r)
            },
            SubNot => {
                let ny = b.not(y);
                let s = b.add(x, &ny);
                let one = b.constant(ty, 1);
                b.add(&s, &one)
            },
            XorOrAnd => {
                let or = b.or(x, y);
                let and = b.and(x, y);
                b.sub(&or, &and)
            },
            XorOrNandAnd => {
                let or = b.or(x, y);
                let and = b.and(x, y);
                let nand = b.not(&and);
                b.and(&or, &nand)
            },
            XorAndNot => {
                let ny = b.not(y);
                let l = b.and(x, &ny);
                let nx = b.not(x);
                let r = b.and(&nx, y);
                b.or(&l, &r)
            },
            XorAddAnd => {
                let s = b.add(x, y);
                let and = b.and(x, y);
                let two = b.constant(ty, 2);
                let twice = b.mul(&two, &and);
                b.sub(&s, &twice)
            },
            OrXorAnd => {
                let xor = b.xor(x, y);
                let and = b.and(x, y);
                b.xor(&xor, &and)
            },
            OrAddAnd => {
                let xor = b.xor(x, y);
                let and = b.and(x, y);
                b.add(&xor, &and)
            },
            OrAndNotAdd => {
                let ny = b.not(y);
                let and = b.and(x, &ny);
                b.add(&and, y)
            },
            OrDeMorgan => {
                let nx = b.not(x);
                let ny = b.not(y);
                let and = b.and(&nx, &ny);
                b.not(&and)
            },
            AndMinusOne => {
                let m = b.signed_constant(ty, -1);
                let l = b.sub(&m, x);
                let r = b.sub(&m, y);
                let or = b.or(&l, &r);
                b.sub(&m, &or)
            },
            AndOrXor => {
                let or = b.or(x, y);
                let xor = b.xor(x, y);
                b.sub(&or, &xor)
            },
            AndNotOr => {
                let nx = b.not(x);
                let or = b.or(&nx, y);
                b.sub(&or, &nx)
            },
            AndDeMorgan => {
                let nx = b.not(x);
                let ny = b.not(y);
                let or = b.or(&nx, &ny);
                b.not(&or)
            },
        }
    }
}

impl Display for Rule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "x {} y == {}", self.opcode().symbol(), self.formula())
    }
}

lazy_static::lazy_static! {
    /// The rules grouped by the operation they replace.
    static ref CATALOG: HashMap<Opcode, Vec<Rule>> = {
        let mut m: HashMap<Opcode, Vec<Rule>> = HashMap::new();
        for r in Rule::ALL {
            m.entry(r.opcode()).or_default().push(r);
        }
        m
    };
}

/// Returns the rules for an operation.
pub fn rules_for(op: Opcode) -> &'static [Rule] {
    CATALOG.get(&op).map_or(&[], Vec::as_slice)
}

/// Rewrites `x op y` using a random rule of the catalog.
///
/// With probability `cfg.zero_identity_probability`, `x` is first replaced by
/// `x + z` where `z` is a zero identity over `x`, `y` and random constants
/// (`cfg.var_count` variables in total).
///
/// `cfg` has to be valid, see [`ObfuscationConfig::validate`].
pub fn rewrite_binary<B: ExprBuilder, R: Rng>(
    b: &mut B,
    op: Opcode,
    x: &B::Node,
    y: &B::Node,
    ty: IntType,
    cfg: &ObfuscationConfig,
    rng: &mut R,
) -> Result<B::Node> {
    let x = if rng.random_bool(cfg.zero_identity_probability) {
        let vars = identity_vars(b, &[x.clone(), y.clone()], ty, cfg, rng);
        let zero = zero_identity(b, &vars, ty, cfg, rng)?;
        b.add(x, &zero)
    } else {
        x.clone()
    };

    let rules = rules_for(op);
    let rule = rules[rng.random_range(0..rules.len())];
    debug!("Rewriting {op} with {rule}");
    Ok(rule.build(b, &x, y, ty))
}

/// Builds an expression equal to the constant `c` that hides it.
///
/// The result is a fresh zero identity if `c` is zero and `c ^ zero`
/// otherwise. The identity is over `vars` (at most `cfg.var_count` of them
/// are used) padded with random constants.
pub fn hide_constant<B: ExprBuilder, R: Rng>(
    b: &mut B,
    c: u64,
    vars: &[B::Node],
    ty: IntType,
    cfg: &ObfuscationConfig,
    rng: &mut R,
) -> Result<B::Node> {
    let vars = identity_vars(b, vars, ty, cfg, rng);
    let zero = zero_identity(b, &vars, ty, cfg, rng)?;
    let c = ty.element(c);
    if c == 0 {
        return Ok(zero);
    }

    let c = b.constant(ty, c);
    Ok(b.xor(&c, &zero))
}

/// Takes the first `cfg.var_count` of `given` and fills up the rest with
/// random constants.
fn identity_vars<B: ExprBuilder, R: Rng>(
    b: &mut B,
    given: &[B::Node],
    ty: IntType,
    cfg: &ObfuscationConfig,
    rng: &mut R,
) -> Vec<B::Node> {
    let mut vars: Vec<_> = given.iter().take(cfg.var_count).cloned().collect();
    while vars.len() < cfg.var_count {
        let c = ty.random(rng);
        vars.push(b.constant(ty, c));
    }
    vars
}
