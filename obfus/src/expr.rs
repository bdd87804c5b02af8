//! General expressions.

use std::collections::BTreeSet;
use std::ops::Deref;
use std::rc::Rc;

use crate::Symbol;
use crate::builder::ExprBuilder;
use crate::int_type::IntType;
use crate::valuation::Valuation;

#[derive(Clone, PartialEq, Debug)]
pub struct Expr(Rc<ExprOp>);

impl Expr {
    pub fn new(e: ExprOp) -> Self {
        Self(Rc::new(e))
    }

    /// A variable.
    pub fn var<T: Into<Symbol>>(name: T) -> Self {
        Self::new(ExprOp::Var(name.into()))
    }

    /// A constant. It is not reduced to any type.
    pub fn constant(c: u64) -> Self {
        Self::new(ExprOp::Const(c))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn as_ref(&self) -> &ExprOp {
        self.0.as_ref()
    }

    pub fn as_ptr(&self) -> *const ExprOp {
        Rc::as_ptr(&self.0)
    }

    pub fn strong_count(&self) -> usize {
        Rc::strong_count(&self.0)
    }

    /// Evaluate an expression.
    pub fn eval(&self, v: &mut Valuation, ty: IntType) -> u64 {
        let mut cache = Vec::new();
        return eval_impl(self, v, ty, &mut cache);

        fn eval_impl(
            e: &Expr,
            v: &mut Valuation,
            ty: IntType,
            cache: &mut Vec<(*const ExprOp, u64)>,
        ) -> u64 {
            if e.strong_count() > 1 {
                // This is a common subexpression.
                // We don't want to evaluate it twice.
                // So we look it up in the cache.
                let ptr = e.as_ptr();
                for (p, i) in cache.iter() {
                    if *p == ptr {
                        return *i;
                    }
                }
            }

            macro_rules! ev {
                ($e:expr) => { eval_impl($e, v, ty, cache) };
            }

            let r = match e.as_ref() {
                ExprOp::Const(n) => ty.element(*n),
                ExprOp::Var(name) => v.value(*name, ty),
                ExprOp::Add(l, r) => ty.add(ev!(l), ev!(r)),
                ExprOp::Sub(l, r) => ty.sub(ev!(l), ev!(r)),
                ExprOp::Mul(l, r) => ty.mul(ev!(l), ev!(r)),
                ExprOp::Neg(i) => ty.neg(ev!(i)),
                ExprOp::And(l, r) => IntType::and(ev!(l), ev!(r)),
                ExprOp::Or(l, r) => IntType::or(ev!(l), ev!(r)),
                ExprOp::Xor(l, r) => IntType::xor(ev!(l), ev!(r)),
                ExprOp::Not(i) => ty.not(ev!(i)),
                ExprOp::Cmp(p, l, r) => {
                    let (l, r) = (ev!(l), ev!(r));
                    p.eval(l, r, ty) as u64
                },
            };

            if e.strong_count() > 1 {
                cache.push((e.as_ptr(), r));
            }

            r
        }
    }

    /// Parse an expression from a string.
    /// Constants are reduced to `ty`.
    pub fn from_string(mut s: String, ty: IntType) -> Result<Expr, String> {
        s.retain(|c| !matches!(c, ' ' | '\t' | '\n'));
        let mut it = s.chars().peekable();

        let e = Self::parse(&mut it, 0, ty)?;
        match it.next() {
            None => Ok(e),
            Some(c) => Err(format!("Unexpected character '{c}'")),
        }
    }

    // pre 0: parse as much as possible
    // ...
    // pre 15: parse as little as possible
    fn parse(
        it: &mut std::iter::Peekable<std::str::Chars>,
        pre: usize,
        ty: IntType,
    ) -> Result<Expr, String> {
        use ExprOp::*;

        let c = *it.peek().ok_or("Unexpected end of input")?;

        let mut e = if c == '(' {
            it.next();
            let e = Self::parse(it, 0, ty)?;
            match it.next() {
                Some(')') => e,
                _ => return Err("Expected closing parenthesis".to_string()),
            }
        } else if c == '~' || c == '!' {
            it.next();
            let e = Self::parse(it, 15, ty)?;
            Expr::new(Not(e))
        } else if c == '-' {
            it.next();
            let e = Self::parse(it, 15, ty)?;
            Expr::new(Neg(e))
        } else if c.is_alphabetic() || c == '_' {
            it.next();
            let mut var = String::from(c);
            while let Some(&c) = it.peek() {
                if !c.is_alphanumeric() && c != '_' {
                    break;
                }
                var.push(c);
                it.next();
            }

            Expr::new(Var(var.into()))
        } else if c.is_ascii_digit() {
            Expr::new(Const(ty.parse_element(it).ok_or("Expected number")?))
        } else {
            return Err(format!("Unexpected character '{c}'"));
        };

        loop {
            let c = match it.peek() {
                None => return Ok(e),
                Some(c) => *c,
            };

            let op_pre = match c {
                '|' => 1,
                '^' => 2,
                '&' => 3,
                '=' | '!' => 4,
                '<' => 5,
                '+' | '-' => 6,
                '*' => 7,
                ')' => return Ok(e),
                _ => return Err(format!("Unexpected character '{c}'")),
            };

            if op_pre <= pre {
                return Ok(e);
            }

            // If the current operators precedence is higher than
            // the one whose subexpression we are currently parsing
            // then we need to finish this operator first.
            it.next();
            if (c == '=' || c == '!') && it.next() != Some('=') {
                return Err(format!("Expected '=' after '{c}'"));
            }

            let rhs = |it| Self::parse(it, op_pre, ty);
            let lhs = e;
            e = Expr::new(match c {
                '+' => Add(lhs, rhs(it)?),
                '-' => Sub(lhs, rhs(it)?),
                '*' => Mul(lhs, rhs(it)?),
                '&' => And(lhs, rhs(it)?),
                '|' => Or(lhs, rhs(it)?),
                '^' => Xor(lhs, rhs(it)?),
                '=' => Cmp(Predicate::Eq, lhs, rhs(it)?),
                '!' => Cmp(Predicate::Ne, lhs, rhs(it)?),
                '<' => Cmp(Predicate::Ult, lhs, rhs(it)?),
                _ => unreachable!(),
            });
        }
    }
}

impl From<ExprOp> for Expr {
    fn from(e: ExprOp) -> Self {
        Self::new(e)
    }
}

impl Deref for Expr {
    type Target = ExprOp;

    fn deref(&self) -> &Self::Target {
        self.as_ref()
    }
}

/// A general expression.
/// We use Rc instead of Box in order to avoid copying common subexpressions.
#[derive(Clone, PartialEq, Debug)]
pub enum ExprOp {
    Const(u64),
    Var(Symbol),
    Add(Expr, Expr),
    Sub(Expr, Expr),
    Mul(Expr, Expr),
    Neg(Expr),
    And(Expr, Expr),
    Or(Expr, Expr),
    Xor(Expr, Expr),
    Not(Expr),
    /// A comparison. It is 1 if it holds and 0 otherwise.
    Cmp(Predicate, Expr, Expr),
}

impl ExprOp {
    /// Is this the constant zero?
    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Const(0))
    }

    /// Returns all variables in the expression without duplicates.
    pub fn vars(&self) -> Vec<Symbol> {
        let mut v = BTreeSet::new();
        self.vars_impl(&mut v);
        v.into_iter().collect()
    }

    pub(crate) fn vars_impl(&self, v: &mut BTreeSet<Symbol>) {
        match self {
            ExprOp::Const(_) => {},
            ExprOp::Var(name) => {
                v.insert(*name);
            },
            ExprOp::Neg(e) | ExprOp::Not(e) => e.vars_impl(v),
            ExprOp::Add(l, r) | ExprOp::Sub(l, r) | ExprOp::Mul(l, r)
            | ExprOp::And(l, r) | ExprOp::Or(l, r) | ExprOp::Xor(l, r)
            | ExprOp::Cmp(_, l, r) => {
                l.vars_impl(v);
                r.vars_impl(v);
            },
        }
    }

    /// Returns the precedence of a binary operator.
    /// All operators are taken to be left associative.
    pub(crate) fn precedence(&self) -> usize {
        use ExprOp::*;
        match self {
            Or(_, _) => 1,
            Xor(_, _) => 2,
            And(_, _) => 3,
            Cmp(Predicate::Eq | Predicate::Ne, _, _) => 4,
            Cmp(Predicate::Ult, _, _) => 5,
            Add(_, _) | Sub(_, _) => 6,
            Mul(_, _) => 7,
            Neg(_) | Not(_) => 15,
            Const(_) | Var(_) => 16,
        }
    }
}

/// Comparison predicates.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Predicate {
    Eq,
    Ne,
    /// Unsigned less than.
    Ult,
}

impl Predicate {
    pub fn eval(self, l: u64, r: u64, ty: IntType) -> bool {
        match self {
            Predicate::Eq => l == r,
            Predicate::Ne => l != r,
            Predicate::Ult => ty.ult(l, r),
        }
    }
}

/// [`ExprBuilder`] that builds [`Expr`]s.
#[derive(Clone, Copy, Debug, Default)]
pub struct TreeBuilder;

impl ExprBuilder for TreeBuilder {
    type Node = Expr;

    fn constant(&mut self, ty: IntType, value: u64) -> Expr {
        Expr::constant(ty.element(value))
    }

    fn not(&mut self, e: &Expr) -> Expr {
        ExprOp::Not(e.clone()).into()
    }

    fn and(&mut self, l: &Expr, r: &Expr) -> Expr {
        ExprOp::And(l.clone(), r.clone()).into()
    }

    fn or(&mut self, l: &Expr, r: &Expr) -> Expr {
        ExprOp::Or(l.clone(), r.clone()).into()
    }

    fn xor(&mut self, l: &Expr, r: &Expr) -> Expr {
        ExprOp::Xor(l.clone(), r.clone()).into()
    }

    fn add(&mut self, l: &Expr, r: &Expr) -> Expr {
        ExprOp::Add(l.clone(), r.clone()).into()
    }

    fn sub(&mut self, l: &Expr, r: &Expr) -> Expr {
        ExprOp::Sub(l.clone(), r.clone()).into()
    }

    fn mul(&mut self, l: &Expr, r: &Expr) -> Expr {
        ExprOp::Mul(l.clone(), r.clone()).into()
    }
}

#[test]
fn parse_expr_test() {
    let ty = IntType::I32;
    let e = Expr::from_string("1 + 2 * 3".to_owned(), ty).unwrap();
    assert_eq!(e.as_ref(), &ExprOp::Add(
        ExprOp::Const(1).into(),
        ExprOp::Mul(
            ExprOp::Const(2).into(),
            ExprOp::Const(3).into(),
        ).into(),
    ));

    let e = Expr::from_string("x & y + z".to_owned(), ty).unwrap();
    assert_eq!(e.as_ref(), &ExprOp::And(
        Expr::var("x"),
        ExprOp::Add(Expr::var("y"), Expr::var("z")).into(),
    ));

    let e = Expr::from_string("x & (x + long_name) ^ 4".to_owned(), ty).unwrap();
    assert_eq!(e.as_ref(), &ExprOp::Xor(
        ExprOp::And(
            Expr::var("x"),
            ExprOp::Add(Expr::var("x"), Expr::var("long_name")).into(),
        ).into(),
        ExprOp::Const(4).into(),
    ));

    let e = Expr::from_string("x & y == 0".to_owned(), ty).unwrap();
    assert_eq!(e.as_ref(), &ExprOp::And(
        Expr::var("x"),
        ExprOp::Cmp(Predicate::Eq, Expr::var("y"), ExprOp::Const(0).into())
            .into(),
    ));

    let e = Expr::from_string("a - b != c < 3".to_owned(), ty).unwrap();
    assert_eq!(e.as_ref(), &ExprOp::Cmp(
        Predicate::Ne,
        ExprOp::Sub(Expr::var("a"), Expr::var("b")).into(),
        ExprOp::Cmp(Predicate::Ult, Expr::var("c"), ExprOp::Const(3).into())
            .into(),
    ));
}

#[test]
fn parse_errors() {
    let ty = IntType::I8;
    assert!(Expr::from_string("x +".to_owned(), ty).is_err());
    assert!(Expr::from_string("(x + y".to_owned(), ty).is_err());
    assert!(Expr::from_string("x = y".to_owned(), ty).is_err());
    assert!(Expr::from_string("x $ y".to_owned(), ty).is_err());
    assert!(Expr::from_string("x + y)".to_owned(), ty).is_err());
}

#[test]
fn expr_eval_test() {
    let ty = IntType::I8;
    let e = Expr::from_string("1 + 2 * 3".to_owned(), ty).unwrap();
    assert_eq!(e.eval(&mut Valuation::empty(), ty), 7);

    let e = Expr::from_string("(x * y) + z".to_owned(), ty).unwrap();
    let mut v = Valuation::from_vec_panic(vec![
        ("x".into(), 100),
        ("y".into(), 3),
        ("z".into(), 7),
    ]);
    assert_eq!(e.eval(&mut v, ty), 51);

    let e = Expr::from_string("-x == 156".to_owned(), ty).unwrap();
    assert_eq!(e.eval(&mut v, ty), 1);
    let e = Expr::from_string("x < y".to_owned(), ty).unwrap();
    assert_eq!(e.eval(&mut v, ty), 0);
    let e = Expr::from_string("~x".to_owned(), ty).unwrap();
    assert_eq!(e.eval(&mut v, ty), 155);
}
