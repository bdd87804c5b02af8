//! A small straight-line instruction stream that the pass works on.
//!
//! A [`Function`] has integer parameters of one type, a list of instructions
//! in program order and a return value. Instructions live in an arena and are
//! referenced by [`InstId`]s that stay valid when instructions are inserted or
//! erased.

use std::fmt::Display;

use rand::Rng;

use crate::Symbol;
use crate::builder::ExprBuilder;
use crate::config::ObfuscationConfig;
use crate::error::{Error, Result};
use crate::expr::{Expr, ExprOp, Predicate};
use crate::formatter::{Formatter, sort_params};
use crate::int_type::IntType;
use crate::rewrite::{Opcode, hide_constant, rewrite_binary};

#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Debug)]
pub struct InstId(usize);

/// An operand.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Value {
    /// The parameter with the given index.
    Param(usize),

    /// The result of an instruction.
    Inst(InstId),

    /// An integer literal.
    Const(u64),
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    And,
    Or,
    Xor,
}

impl BinOp {
    /// The catalog opcode of the operation, if there is one.
    pub fn opcode(self) -> Option<Opcode> {
        match self {
            BinOp::Add => Some(Opcode::Add),
            BinOp::Sub => Some(Opcode::Sub),
            BinOp::Mul => None,
            BinOp::And => Some(Opcode::And),
            BinOp::Or => Some(Opcode::Or),
            BinOp::Xor => Some(Opcode::Xor),
        }
    }

    pub fn eval(self, l: u64, r: u64, ty: IntType) -> u64 {
        match self {
            BinOp::Add => ty.add(l, r),
            BinOp::Sub => ty.sub(l, r),
            BinOp::Mul => ty.mul(l, r),
            BinOp::And => IntType::and(l, r),
            BinOp::Or => IntType::or(l, r),
            BinOp::Xor => IntType::xor(l, r),
        }
    }

    fn mnemonic(self) -> &'static str {
        match self {
            BinOp::Add => "add",
            BinOp::Sub => "sub",
            BinOp::Mul => "mul",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::Xor => "xor",
        }
    }
}

/// An instruction.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Op {
    Bin(BinOp, Value, Value),
    Not(Value),
    /// A comparison whose result is 1 if it holds and 0 otherwise.
    Cmp(Predicate, Value, Value),
}

impl Op {
    pub fn operands(&self) -> Vec<Value> {
        match *self {
            Op::Bin(_, l, r) | Op::Cmp(_, l, r) => vec![l, r],
            Op::Not(v) => vec![v],
        }
    }

    fn operands_mut(&mut self) -> Vec<&mut Value> {
        match self {
            Op::Bin(_, l, r) | Op::Cmp(_, l, r) => vec![l, r],
            Op::Not(v) => vec![v],
        }
    }
}

/// Describes one instruction the pass may rewrite.
#[derive(Clone, Copy, Debug)]
pub struct Site {
    inst: InstId,
    op: Op,
    ty: IntType,
}

impl Site {
    pub fn inst(&self) -> InstId {
        self.inst
    }

    pub fn op(&self) -> Op {
        self.op
    }

    /// The catalog opcode. `None` for everything the catalog can't rewrite.
    pub fn opcode(&self) -> Option<Opcode> {
        match self.op {
            Op::Bin(op, _, _) => op.opcode(),
            _ => None,
        }
    }

    pub fn operands(&self) -> Vec<Value> {
        self.op.operands()
    }

    pub fn ty(&self) -> IntType {
        self.ty
    }

    pub fn is_binary(&self) -> bool {
        matches!(self.op, Op::Bin(..))
    }

    pub fn is_compare(&self) -> bool {
        matches!(self.op, Op::Cmp(..))
    }
}

/// A function with integer parameters and straight-line code.
#[derive(Clone, PartialEq, Debug)]
pub struct Function {
    name: String,
    ty: IntType,
    params: Vec<Symbol>,

    /// All instructions ever created, indexed by [`InstId`].
    arena: Vec<Op>,

    /// The live instructions in program order.
    body: Vec<InstId>,

    ret: Value,
}

impl Function {
    /// A function that returns zero.
    pub fn new<S: Into<String>>(name: S, ty: IntType, params: Vec<Symbol>) -> Self {
        Self {
            name: name.into(),
            ty,
            params,
            arena: Vec::new(),
            body: Vec::new(),
            ret: Value::Const(0),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> IntType {
        self.ty
    }

    pub fn params(&self) -> &[Symbol] {
        &self.params
    }

    /// The value of the parameter with the given name.
    pub fn param(&self, name: &str) -> Option<Value> {
        self.params.iter().position(|p| p.as_str() == name).map(Value::Param)
    }

    pub fn ret(&self) -> Value {
        self.ret
    }

    pub fn set_ret(&mut self, v: Value) {
        self.ret = v;
    }

    /// The number of instructions.
    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }

    /// The instructions in program order.
    pub fn insts(&self) -> impl Iterator<Item = (InstId, &Op)> + '_ {
        self.body.iter().map(|&id| (id, &self.arena[id.0]))
    }

    /// Appends an instruction and returns its result.
    pub fn push(&mut self, op: Op) -> Value {
        let pos = self.body.len();
        InstBuilder::at(self, pos).insert(op)
    }

    /// The site of an instruction.
    pub fn site(&self, inst: InstId) -> Site {
        Site { inst, op: self.arena[inst.0], ty: self.ty }
    }

    /// The sites of all instructions in program order.
    pub fn sites(&self) -> Vec<Site> {
        self.body.iter().map(|&id| self.site(id)).collect()
    }

    fn position(&self, inst: InstId) -> Option<usize> {
        self.body.iter().position(|&i| i == inst)
    }

    /// Replaces all uses of the result of `inst` by `v`.
    pub fn replace_uses(&mut self, inst: InstId, v: Value) {
        let old = Value::Inst(inst);
        for &id in &self.body {
            for o in self.arena[id.0].operands_mut() {
                if *o == old {
                    *o = v;
                }
            }
        }

        if self.ret == old {
            self.ret = v;
        }
    }

    /// Removes an instruction from the body.
    /// Its result must not be used anymore.
    fn erase(&mut self, inst: InstId) {
        self.body.retain(|&i| i != inst);
    }

    /// Rewrites the instruction `inst` and reports whether anything changed.
    ///
    /// Supported binary operations are replaced by a random form of the
    /// rewrite catalog and erased. Literal operands of comparisons are hidden
    /// if `cfg.hide_constants` is set. Everything else is left alone and
    /// `Ok(false)` is returned.
    ///
    /// If the zero identity generation fails, the error is returned. A failed
    /// binary rewrite leaves the function unchanged. For comparisons, the
    /// operands hidden before the failure stay hidden.
    pub fn rewrite_site<R: Rng>(
        &mut self,
        inst: InstId,
        cfg: &ObfuscationConfig,
        rng: &mut R,
    ) -> Result<bool> {
        // The instruction might have been erased.
        let Some(pos) = self.position(inst) else {
            return Ok(false);
        };

        let ty = self.ty;
        match self.arena[inst.0] {
            Op::Bin(op, l, r) => {
                let Some(opcode) = op.opcode() else {
                    return Ok(false);
                };

                let mut b = InstBuilder::at(self, pos);
                let v = rewrite_binary(&mut b, opcode, &l, &r, ty, cfg, rng)?;
                self.replace_uses(inst, v);
                self.erase(inst);
                Ok(true)
            },
            Op::Cmp(_, l, r) if cfg.hide_constants => {
                let vars = self.hiding_vars(l, r);
                let mut changed = false;
                let mut pos = pos;
                for idx in 0..2 {
                    let Value::Const(c) = self.arena[inst.0].operands()[idx] else {
                        continue;
                    };

                    let mut b = InstBuilder::at(self, pos);
                    let v = hide_constant(&mut b, c, &vars, ty, cfg, rng)?;
                    pos = b.pos;
                    if let Some(o) = self.arena[inst.0].operands_mut().into_iter().nth(idx) {
                        *o = v;
                    }
                    changed = true;
                }

                Ok(changed)
            },
            _ => Ok(false),
        }
    }

    /// The values a zero identity hiding a literal of a comparison is built
    /// over: the non-literal operands, then the parameters.
    fn hiding_vars(&self, l: Value, r: Value) -> Vec<Value> {
        let mut vars = Vec::new();
        let params = (0..self.params.len()).map(Value::Param);
        for v in [l, r].into_iter().chain(params) {
            if !matches!(v, Value::Const(_)) && !vars.contains(&v) {
                vars.push(v);
            }
        }
        vars
    }

    /// Runs the function.
    pub fn eval(&self, args: &[u64]) -> u64 {
        assert_eq!(args.len(), self.params.len(), "Wrong number of arguments.");
        let ty = self.ty;
        let mut vals = vec![0; self.arena.len()];
        let get = |v: Value, vals: &[u64]| match v {
            Value::Param(i) => ty.element(args[i]),
            Value::Inst(id) => vals[id.0],
            Value::Const(c) => ty.element(c),
        };

        for &id in &self.body {
            let r = match self.arena[id.0] {
                Op::Bin(op, l, r) => op.eval(get(l, &vals), get(r, &vals), ty),
                Op::Not(v) => ty.not(get(v, &vals)),
                Op::Cmp(p, l, r) => {
                    p.eval(get(l, &vals), get(r, &vals), ty) as u64
                },
            };
            vals[id.0] = r;
        }

        get(self.ret, &vals)
    }

    /// Lowers an expression into a function with the given name.
    ///
    /// The parameters are the variables of the expression, sorted by length
    /// and then alphabetically. Common subexpressions are computed once.
    pub fn from_expr(name: &str, e: &Expr, ty: IntType) -> Self {
        let mut params = e.vars();
        sort_params(&mut params);
        let mut f = Function::new(name, ty, params);
        let mut cache = Vec::new();
        f.ret = lower(&mut f, e, &mut cache);
        return f;

        fn lower(
            f: &mut Function,
            e: &Expr,
            cache: &mut Vec<(*const ExprOp, Value)>,
        ) -> Value {
            if e.strong_count() > 1 {
                let ptr = e.as_ptr();
                if let Some((_, v)) = cache.iter().find(|(p, _)| *p == ptr) {
                    return *v;
                }
            }

            macro_rules! bin {
                ($op:ident, $l:ident, $r:ident) => {{
                    let l = lower(f, $l, cache);
                    let r = lower(f, $r, cache);
                    f.push(Op::Bin(BinOp::$op, l, r))
                }};
            }

            let v = match e.as_ref() {
                ExprOp::Const(c) => Value::Const(f.ty.element(*c)),
                ExprOp::Var(name) => f
                    .param(name.as_str())
                    .expect("Every variable is a parameter."),
                ExprOp::Add(l, r) => bin!(Add, l, r),
                ExprOp::Sub(l, r) => bin!(Sub, l, r),
                ExprOp::Mul(l, r) => bin!(Mul, l, r),
                ExprOp::And(l, r) => bin!(And, l, r),
                ExprOp::Or(l, r) => bin!(Or, l, r),
                ExprOp::Xor(l, r) => bin!(Xor, l, r),
                ExprOp::Neg(i) => {
                    let i = lower(f, i, cache);
                    f.push(Op::Bin(BinOp::Sub, Value::Const(0), i))
                },
                ExprOp::Not(i) => {
                    let i = lower(f, i, cache);
                    f.push(Op::Not(i))
                },
                ExprOp::Cmp(p, l, r) => {
                    let l = lower(f, l, cache);
                    let r = lower(f, r, cache);
                    f.push(Op::Cmp(*p, l, r))
                },
            };

            if e.strong_count() > 1 {
                cache.push((e.as_ptr(), v));
            }

            v
        }
    }

    /// Parses an expression and lowers it, see [`Function::from_expr`].
    pub fn parse(name: &str, s: &str, ty: IntType) -> Result<Self> {
        let e = Expr::from_string(s.to_owned(), ty).map_err(Error::Parse)?;
        Ok(Self::from_expr(name, &e, ty))
    }

    /// Lifts the function into an expression.
    /// Instructions that are used more than once become shared nodes.
    pub fn to_expr(&self) -> Expr {
        let mut exprs: Vec<Option<Expr>> = vec![None; self.arena.len()];
        for &id in &self.body {
            let e = match self.arena[id.0] {
                Op::Bin(op, l, r) => {
                    let (l, r) = (self.value_expr(l, &exprs), self.value_expr(r, &exprs));
                    match op {
                        BinOp::Add => ExprOp::Add(l, r),
                        BinOp::Sub => ExprOp::Sub(l, r),
                        BinOp::Mul => ExprOp::Mul(l, r),
                        BinOp::And => ExprOp::And(l, r),
                        BinOp::Or => ExprOp::Or(l, r),
                        BinOp::Xor => ExprOp::Xor(l, r),
                    }
                },
                Op::Not(v) => ExprOp::Not(self.value_expr(v, &exprs)),
                Op::Cmp(p, l, r) => ExprOp::Cmp(
                    p,
                    self.value_expr(l, &exprs),
                    self.value_expr(r, &exprs),
                ),
            };
            exprs[id.0] = Some(e.into());
        }

        self.value_expr(self.ret, &exprs)
    }

    fn value_expr(&self, v: Value, exprs: &[Option<Expr>]) -> Expr {
        match v {
            Value::Param(i) => Expr::var(self.params[i]),
            Value::Const(c) => Expr::constant(c),
            Value::Inst(id) => {
                exprs[id.0].clone().expect("Instruction used before definition.")
            },
        }
    }
}

/// Prints the function as LLVM IR.
impl Display for Function {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ty = self.ty.data_type_name(Formatter::LLVM).to_string();
        write!(f, "define {ty} @{}(", self.name)?;
        let mut params = self.params.iter();
        if let Some(p) = params.next() {
            write!(f, "{ty} %{p}")?;
            for p in params {
                write!(f, ", {ty} %{p}")?;
            }
        }
        writeln!(f, ") {{\nentry:")?;

        let mut numbers = vec![0; self.arena.len()];
        let value = |v: Value, numbers: &[usize]| match v {
            Value::Param(i) => format!("%{}", self.params[i]),
            Value::Inst(id) => format!("%{}", numbers[id.0]),
            Value::Const(c) => format!("{}", self.ty.to_i64(c)),
        };

        for (n, &id) in self.body.iter().enumerate() {
            match self.arena[id.0] {
                Op::Bin(op, l, r) => writeln!(
                    f,
                    "  %{n} = {} {ty} {}, {}",
                    op.mnemonic(),
                    value(l, &numbers),
                    value(r, &numbers)
                )?,
                Op::Not(v) => {
                    writeln!(f, "  %{n} = xor {ty} {}, -1", value(v, &numbers))?
                },
                Op::Cmp(p, l, r) => {
                    let pred = match p {
                        Predicate::Eq => "eq",
                        Predicate::Ne => "ne",
                        Predicate::Ult => "ult",
                    };
                    let (l, r) = (value(l, &numbers), value(r, &numbers));
                    if self.ty.bits() == 1 {
                        writeln!(f, "  %{n} = icmp {pred} {ty} {l}, {r}")?;
                    } else {
                        writeln!(f, "  %{n}.c = icmp {pred} {ty} {l}, {r}")?;
                        writeln!(f, "  %{n} = zext i1 %{n}.c to {ty}")?;
                    }
                },
            }
            numbers[id.0] = n;
        }

        writeln!(f, "  ret {ty} {}", value(self.ret, &numbers))?;
        write!(f, "}}")
    }
}

/// [`ExprBuilder`] that inserts instructions into a [`Function`].
///
/// The instructions are inserted one after the other, starting in front of
/// the instruction that was at the given position.
pub struct InstBuilder<'a> {
    func: &'a mut Function,
    pos: usize,
}

impl<'a> InstBuilder<'a> {
    pub fn at(func: &'a mut Function, pos: usize) -> Self {
        assert!(pos <= func.body.len(), "Position out of range.");
        Self { func, pos }
    }

    /// The position the next instruction will be inserted at.
    pub fn pos(&self) -> usize {
        self.pos
    }

    fn insert(&mut self, op: Op) -> Value {
        let id = InstId(self.func.arena.len());
        self.func.arena.push(op);
        self.func.body.insert(self.pos, id);
        self.pos += 1;
        Value::Inst(id)
    }
}

impl ExprBuilder for InstBuilder<'_> {
    type Node = Value;

    fn constant(&mut self, ty: IntType, value: u64) -> Value {
        Value::Const(ty.element(value))
    }

    fn not(&mut self, e: &Value) -> Value {
        self.insert(Op::Not(*e))
    }

    fn and(&mut self, l: &Value, r: &Value) -> Value {
        self.insert(Op::Bin(BinOp::And, *l, *r))
    }

    fn or(&mut self, l: &Value, r: &Value) -> Value {
        self.insert(Op::Bin(BinOp::Or, *l, *r))
    }

    fn xor(&mut self, l: &Value, r: &Value) -> Value {
        self.insert(Op::Bin(BinOp::Xor, *l, *r))
    }

    fn add(&mut self, l: &Value, r: &Value) -> Value {
        self.insert(Op::Bin(BinOp::Add, *l, *r))
    }

    fn sub(&mut self, l: &Value, r: &Value) -> Value {
        self.insert(Op::Bin(BinOp::Sub, *l, *r))
    }

    fn mul(&mut self, l: &Value, r: &Value) -> Value {
        self.insert(Op::Bin(BinOp::Mul, *l, *r))
    }
}

#[cfg(test)]
mod test {
    use rand::{SeedableRng as _, rngs::StdRng};
    use test_log::test;

    use super::*;
    use crate::valuation::Valuation;

    fn parse(s: &str, ty: IntType) -> Function {
        let e = Expr::from_string(s.to_owned(), ty).unwrap();
        Function::from_expr("f", &e, ty)
    }

    fn random_args<R: Rng>(f: &Function, rng: &mut R) -> Vec<u64> {
        f.params().iter().map(|_| f.ty().random(rng)).collect()
    }

    #[test]
    fn print_llvm() {
        let f = parse("x + y * 3", IntType::I8);
        assert_eq!(
            f.to_string(),
            "define i8 @f(i8 %x, i8 %y) {\n\
             entry:\n  \
             %0 = mul i8 %y, 3\n  \
             %1 = add i8 %x, %0\n  \
             ret i8 %1\n\
             }"
        );

        let f = parse("~a == 255", IntType::I8);
        assert_eq!(
            f.to_string(),
            "define i8 @f(i8 %a) {\n\
             entry:\n  \
             %0 = xor i8 %a, -1\n  \
             %1.c = icmp eq i8 %0, -1\n  \
             %1 = zext i1 %1.c to i8\n  \
             ret i8 %1\n\
             }"
        );
    }

    #[test]
    fn parse_errors_are_reported() {
        assert!(matches!(
            Function::parse("f", "x + (y", IntType::I8),
            Err(Error::Parse(_))
        ));
        let f = Function::parse("f", "x - 1", IntType::I8).unwrap();
        assert_eq!(f.eval(&[0]), 255);
    }

    #[test]
    fn params_are_sorted() {
        let f = parse("x10 + x2 + b", IntType::I8);
        let params: Vec<_> = f.params().iter().map(|p| p.as_str()).collect();
        assert_eq!(params, ["b", "x2", "x10"]);
    }

    #[test]
    fn lowering_agrees_with_expr() {
        let mut rng = StdRng::seed_from_u64(0);
        let ty = IntType::I16;
        let s = "(x + y) * (x + y) - -z ^ ~(x & 7) | y < z";
        let e = Expr::from_string(s.to_owned(), ty).unwrap();
        let f = Function::from_expr("f", &e, ty);
        let lifted = f.to_expr();
        for _ in 0..100 {
            let args = random_args(&f, &mut rng);
            let vals = f.params().iter().copied().zip(args.iter().copied()).collect();
            let mut v = Valuation::from_vec_panic(vals);
            let expected = e.eval(&mut v, ty);
            assert_eq!(f.eval(&args), expected);
            assert_eq!(lifted.eval(&mut v, ty), expected);
        }
    }

    #[test]
    fn unsupported_ops_are_left_alone() {
        let cfg = ObfuscationConfig::default();
        let mut rng = cfg.rng();
        let mut f = parse("x * y + ~x", IntType::I32);
        let before = f.clone();
        let printed = f.to_string();
        let sites = f.sites();
        assert_eq!(sites.len(), 3);
        for s in sites.iter().filter(|s| s.opcode().is_none()) {
            assert_eq!(f.rewrite_site(s.inst(), &cfg, &mut rng), Ok(false));
        }
        assert_eq!(f, before);
        assert_eq!(f.to_string(), printed);
    }

    #[test]
    fn rewrites_preserve_semantics() {
        let cfg = ObfuscationConfig::default();
        let mut rng = cfg.rng();
        let ty = IntType::I32;
        let orig = parse("((x + y) ^ (x - z)) | (y & z)", ty);
        let mut f = orig.clone();
        for s in f.sites() {
            assert_eq!(s.opcode().is_some(), s.is_binary());
            assert_eq!(f.rewrite_site(s.inst(), &cfg, &mut rng), Ok(true));
            // Erased instructions are not rewritten again.
            assert_eq!(f.rewrite_site(s.inst(), &cfg, &mut rng), Ok(false));
        }
        assert!(f.len() > orig.len());

        for _ in 0..1000 {
            let args = random_args(&f, &mut rng);
            assert_eq!(f.eval(&args), orig.eval(&args));
        }
    }

    #[test]
    fn comparison_literals_are_hidden() {
        let cfg = ObfuscationConfig::default();
        let mut rng = StdRng::seed_from_u64(5);
        let ty = IntType::I8;
        let orig = parse("(x == 0) + (x != 17) + (3 < y)", ty);
        let mut f = orig.clone();
        for s in f.sites().into_iter().filter(Site::is_compare) {
            assert_eq!(f.rewrite_site(s.inst(), &cfg, &mut rng), Ok(true));
            let operands = f.site(s.inst()).operands();
            assert!(operands.iter().all(|o| !matches!(o, Value::Const(_))));
        }

        for (x, y) in itertools::iproduct!(0..256u64, [0, 3, 4, 200]) {
            assert_eq!(f.eval(&[x, y]), orig.eval(&[x, y]));
        }

        let no_hiding = ObfuscationConfig { hide_constants: false, ..cfg };
        let mut g = orig.clone();
        for s in g.sites() {
            if s.is_compare() {
                assert_eq!(g.rewrite_site(s.inst(), &no_hiding, &mut rng), Ok(false));
            }
        }
        assert_eq!(g, orig);
    }

    #[test]
    fn inst_builder_inserts_in_order() {
        let ty = IntType::I8;
        let mut f = Function::new("g", ty, vec!["a".into()]);
        let a = f.param("a").unwrap();
        let r = f.push(Op::Not(a));
        f.set_ret(r);
        assert_eq!(f.eval(&[3]), 252);

        let mut b = InstBuilder::at(&mut f, 0);
        let one = b.constant(ty, 1);
        let s = b.add(&a, &one);
        let t = b.mul(&s, &s);
        assert_eq!(b.pos(), 2);
        f.replace_uses(InstId(0), t);
        f.erase(InstId(0));
        f.set_ret(t);
        assert_eq!(f.eval(&[3]), 16);
        assert_eq!(f.to_expr().to_string(), "(a + 1) * (a + 1)");
    }
}
