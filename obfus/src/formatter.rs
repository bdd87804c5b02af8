//! Formatting for expressions.

use std::fmt::{Display, Write as _};

use crate::{
    Symbol,
    expr::{Expr, ExprOp, Predicate},
    int_type::IntType,
    ir::Function,
};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Formatter {
    C,
    Rust,
    LLVM,
}

impl Formatter {
    pub fn add_op(&self) -> &str {
        "+"
    }

    pub fn sub_op(&self) -> &str {
        "-"
    }

    pub fn mul_op(&self) -> &str {
        "*"
    }

    pub fn neg_op(&self) -> &str {
        "-"
    }

    pub fn and_op(&self) -> &str {
        "&"
    }

    pub fn or_op(&self) -> &str {
        "|"
    }

    pub fn xor_op(&self) -> &str {
        "^"
    }

    pub fn not_op(&self) -> &str {
        match self {
            Formatter::C | Formatter::LLVM => "~",
            Formatter::Rust => "!",
        }
    }

    pub fn cmp_op(&self, p: Predicate) -> &str {
        match p {
            Predicate::Eq => "==",
            Predicate::Ne => "!=",
            Predicate::Ult => "<",
        }
    }
}

impl Expr {
    /// Creates a wrapper struct that implements [`Display`] and uses the given
    /// `formatter` to format the expression. Each line will be indented by
    /// `tabs` tabs. Common subexpressions will be assigned to variables
    /// with names `v1`, `v2`, etc. on their own lines. The final result will
    /// be prefixed with `prefix`, which will usually be something like
    /// `"return "` or `"uint8_t result = "`. There will be no trailing newline.
    ///
    /// [`Formatter::LLVM`] is not supported here, use
    /// [`Expr::display_function`] instead.
    pub fn display<'a>(
        &'a self,
        formatter: Formatter,
        tabs: usize,
        prefix: &'a str,
        ty: IntType,
    ) -> ExprFormatter<'a> {
        assert!(
            formatter != Formatter::LLVM,
            "LLVM output needs a function, use `display_function`."
        );
        let mut formatter = ExprFormatter {
            expr: self,
            formatter,
            buf: String::new(),
            subs: Vec::new(),
            tabs,
            prefix,
            ty,
            share: true,
        };

        formatter.format();

        // Native C and Rust types are wider, so drop the excess bits.
        if !ty.is_native() {
            formatter.buf = match formatter.formatter {
                Formatter::Rust => format!("({}) & Wrapping({})", formatter.buf, ty.mask()),
                _ => format!("({}) & {}", formatter.buf, ty.mask()),
            };
        }

        formatter
    }

    /// Creates a wrapper struct that implements [`Display`] and formats the
    /// expression as a function with the given `function_name`. The
    /// parameters are the variables of the expression.
    ///
    /// For [`Formatter::LLVM`] the expression is lowered into a [`Function`]
    /// first.
    pub fn display_function<'a>(
        &'a self,
        formatter: Formatter,
        function_name: &'a str,
        ty: IntType,
    ) -> FunctionFormatter<'a> {
        let body = match formatter {
            Formatter::LLVM => {
                FunctionBody::Ir(Function::from_expr(function_name, self, ty))
            },
            Formatter::C => {
                FunctionBody::Expr(self.display(formatter, 1, "return ", ty))
            },
            Formatter::Rust => {
                FunctionBody::Expr(self.display(formatter, 1, "", ty))
            },
        };

        FunctionFormatter::new(self.vars(), body, formatter, function_name, ty)
    }
}

/// Prints the expression in C syntax on a single line, without naming common
/// subexpressions.
impl Display for Expr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut formatter = ExprFormatter {
            expr: self,
            formatter: Formatter::C,
            buf: String::new(),
            subs: Vec::new(),
            tabs: 0,
            prefix: "",
            ty: IntType::I64,
            share: false,
        };
        formatter.format();
        f.write_str(&formatter.buf)
    }
}

struct CommonSubExpr {
    /// The pointer to the subexpression that has a strong count > 1.
    ptr: *const ExprOp,

    /// The variable name that is used to represent the subexpression.
    var: Symbol,

    /// The initializer for the variable.
    init: String,
}

pub struct ExprFormatter<'a> {
    expr: &'a Expr,
    formatter: Formatter,
    buf: String,
    subs: Vec<CommonSubExpr>,
    tabs: usize,
    prefix: &'a str,
    ty: IntType,

    /// Whether common subexpressions get their own variables.
    share: bool,
}

impl<'a> ExprFormatter<'a> {
    fn format(&mut self) {
        // If there is only one reference then just print it.
        if !self.share || self.expr.strong_count() == 1 {
            return self.format_op();
        }

        // We don't want to assign a variable to a variable or a constant
        // so there is this shortcut here.
        if matches!(self.expr.as_ref(), ExprOp::Var(_) | ExprOp::Const(_)) {
            return self.format_op();
        }

        let ptr = self.expr.as_ptr();

        let sub = self.subs.iter().find(|t| t.ptr == ptr);
        if let Some(sub) = sub {
            // If the expression already has a variable then just write the
            // variable name.
            write!(&mut self.buf, "{}", sub.var).unwrap();
        } else {
            // Otherwise, we need to create a new variable.
            let name_start = self.buf.len();
            write!(&mut self.buf, "v{}", self.subs.len() + 1).unwrap();
            let v = Symbol::new(&self.buf[name_start..]);

            let idx = self.subs.len();

            // Push it first so that we don't try to create a variable for the
            // same subexpression again.
            self.subs.push(CommonSubExpr { ptr, var: v, init: String::new() });

            // Format the subexpression into a new buffer.
            let mut cur_buf = std::mem::take(&mut self.buf);
            self.format_op();

            // Swap the buffers back. `cur_buf` now contains the formatted
            // subexpression.
            std::mem::swap(&mut self.buf, &mut cur_buf);
            self.subs[idx].init = cur_buf;
        }
    }

    /// Formats `e` in place of the current expression, in parentheses if
    /// `wrap` is set.
    fn format_child(&mut self, e: &'a Expr, wrap: bool) {
        let old = std::mem::replace(&mut self.expr, e);
        if wrap && (!self.share || e.strong_count() == 1) {
            self.buf.push('(');
            // We know `e` is printed in place, so we can use `format_op`.
            self.format_op();
            self.buf.push(')');
        } else {
            self.format();
        }
        self.expr = old;
    }

    /// Whether C promotes values of the type to `int`.
    fn promotes(&self) -> bool {
        self.formatter == Formatter::C && self.ty.native_bits() < 32
    }

    /// Formats an operand of a comparison so that it has no bits outside the
    /// type. Variables and constants never have any.
    fn format_reduced(&mut self, e: &'a Expr) {
        if matches!(e.as_ref(), ExprOp::Var(_) | ExprOp::Const(_)) {
            return self.format_child(e, false);
        }

        if self.ty.is_native() {
            write!(&mut self.buf, "({})", self.ty.data_type_name(self.formatter)).unwrap();
            self.format_child(e, true);
        } else {
            self.buf.push('(');
            self.format_child(e, true);
            match self.formatter {
                Formatter::Rust => write!(&mut self.buf, " & Wrapping({}))", self.ty.mask()),
                _ => write!(&mut self.buf, " & {})", self.ty.mask()),
            }
            .unwrap();
        }
    }

    fn format_op(&mut self) {
        macro_rules! format_bin_op {
            ($op:expr, $l:ident, $r:ident) => {{
                let pred = self.expr.precedence();
                let op = $op.to_owned();
                self.format_child($l, pred > $l.precedence());
                write!(&mut self.buf, " {op} ").unwrap();
                // Everything is left associative, so the right operand needs
                // parentheses on equal precedence as well.
                self.format_child($r, pred >= $r.precedence());
            }};
        }

        macro_rules! format_un_op {
            ($op:ident, $e:ident) => {{
                let pred = self.expr.precedence();
                self.buf.push_str(self.formatter.$op());
                self.format_child($e, pred > $e.precedence());
            }};
        }

        let e: &'a Expr = self.expr;
        match e.as_ref() {
            ExprOp::Const(i) => {
                if self.formatter == Formatter::Rust {
                    write!(&mut self.buf, "Wrapping({i})").unwrap()
                } else {
                    write!(&mut self.buf, "{i}").unwrap()
                }
            },
            ExprOp::Var(v) => write!(&mut self.buf, "{v}").unwrap(),
            ExprOp::Add(l, r) => format_bin_op!(self.formatter.add_op(), l, r),
            ExprOp::Sub(l, r) => format_bin_op!(self.formatter.sub_op(), l, r),
            ExprOp::Mul(l, r) if self.promotes() => {
                // The product of two promoted values can overflow `int`.
                let pred = self.expr.precedence();
                let op = self.formatter.mul_op().to_owned();
                self.buf.push_str("(uint32_t)");
                self.format_child(l, !matches!(l.as_ref(), ExprOp::Var(_) | ExprOp::Const(_)));
                write!(&mut self.buf, " {op} ").unwrap();
                self.format_child(r, pred >= r.precedence());
            },
            ExprOp::Mul(l, r) => format_bin_op!(self.formatter.mul_op(), l, r),
            ExprOp::Neg(i) => format_un_op!(neg_op, i),
            ExprOp::And(l, r) => format_bin_op!(self.formatter.and_op(), l, r),
            ExprOp::Or(l, r) => format_bin_op!(self.formatter.or_op(), l, r),
            ExprOp::Xor(l, r) => format_bin_op!(self.formatter.xor_op(), l, r),
            ExprOp::Not(i) => format_un_op!(not_op, i),
            ExprOp::Cmp(p, l, r) => {
                // Rust comparisons are `bool`s, so convert them back.
                let rust = self.formatter == Formatter::Rust;
                if rust {
                    self.buf.push_str("Wrapping((");
                }

                if self.promotes() || !self.ty.is_native() {
                    let op = self.formatter.cmp_op(*p).to_owned();
                    self.format_reduced(l);
                    write!(&mut self.buf, " {op} ").unwrap();
                    self.format_reduced(r);
                } else {
                    format_bin_op!(self.formatter.cmp_op(*p), l, r);
                }

                if rust {
                    write!(&mut self.buf, ") as u{})", self.ty.native_bits()).unwrap();
                }
            },
        }
    }
}

impl Display for ExprFormatter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.formatter {
            Formatter::C => {
                let ty = self.ty.data_type_name(self.formatter).to_string();
                for sub in self.subs.iter().rev() {
                    writeln!(
                        f,
                        "{:\t>tabs$}{ty} {} = {};",
                        "",
                        sub.var,
                        sub.init,
                        tabs = self.tabs
                    )?;
                }
            },
            Formatter::Rust => {
                for sub in self.subs.iter().rev() {
                    writeln!(
                        f,
                        "{:\t>tabs$}let {} = {};",
                        "",
                        sub.var,
                        sub.init,
                        tabs = self.tabs
                    )?;
                }
            },
            Formatter::LLVM => unreachable!(),
        }

        write!(
            f,
            "{:\t>tabs$}{}{}",
            "",
            self.prefix,
            self.buf,
            tabs = self.tabs
        )
    }
}

enum FunctionBody<'a> {
    Expr(ExprFormatter<'a>),
    Ir(Function),
}

pub struct FunctionFormatter<'a> {
    vars: Vec<Symbol>,
    body: FunctionBody<'a>,
    formatter: Formatter,
    function_name: &'a str,
    ty: IntType,
}

impl<'a> FunctionFormatter<'a> {
    fn new(
        vars: Vec<Symbol>,
        body: FunctionBody<'a>,
        formatter: Formatter,
        function_name: &'a str,
        ty: IntType,
    ) -> Self {
        let mut vars = vars;
        sort_params(&mut vars);
        Self { vars, body, formatter, function_name, ty }
    }
}

/// Sorts parameter names by length and then alphabetically,
/// so that `x2` comes before `x10`.
pub(crate) fn sort_params(vars: &mut [Symbol]) {
    vars.sort_by_cached_key(|v| {
        let s = v.as_str();
        (s.len(), s)
    });
}

impl Display for FunctionFormatter<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = match &self.body {
            FunctionBody::Ir(func) => return func.fmt(f),
            FunctionBody::Expr(e) => e,
        };

        let ty = self.ty.data_type_name(self.formatter).to_string();
        match self.formatter {
            Formatter::C => {
                write!(f, "{ty} {}(", self.function_name)?;

                let mut vars = self.vars.iter();
                if let Some(v) = vars.next() {
                    write!(f, "{ty} {v}")?;

                    for v in vars {
                        write!(f, ", {ty} {v}")?;
                    }
                }

                write!(f, ") {{\n{inner};\n}}")
            },
            Formatter::Rust => {
                write!(f, "fn {}(", self.function_name)?;

                let mut vars = self.vars.iter();
                if let Some(v) = vars.next() {
                    write!(f, "{v}: {ty}")?;

                    for v in vars {
                        write!(f, ", {v}: {ty}")?;
                    }
                }

                write!(f, ") -> {ty} {{\n{inner}\n}}")
            },
            Formatter::LLVM => unreachable!(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn inline_parentheses() {
        let ty = IntType::I8;
        for (s, expected) in [
            ("a - (b + c)", "a - (b + c)"),
            ("(a - b) + c", "a - b + c"),
            ("(a + b) * c", "(a + b) * c"),
            ("~(a & b) | c", "~(a & b) | c"),
            ("a & b == c", "a & b == c"),
            ("(a & b) == c", "(a & b) == c"),
        ] {
            let e = Expr::from_string(s.to_owned(), ty).unwrap();
            assert_eq!(e.to_string(), expected);
        }
    }

    #[test]
    fn c_function_names_common_subexpressions() {
        let ty = IntType::I8;
        let s = Expr::from_string("x + y".to_owned(), ty).unwrap();
        let e = Expr::new(ExprOp::Mul(s.clone(), s));
        let out = e.display_function(Formatter::C, "f", ty).to_string();
        assert_eq!(
            out,
            "uint8_t f(uint8_t x, uint8_t y) {\n\tuint8_t v1 = x + y;\n\treturn (uint32_t)v1 * v1;\n}"
        );
    }

    #[test]
    fn narrow_c_types() {
        let c = |s: &str, ty: IntType| {
            let e = Expr::from_string(s.to_owned(), ty).unwrap();
            e.display(Formatter::C, 0, "return ", ty).to_string()
        };

        // Both sides of a comparison are promoted to `int` in C.
        assert_eq!(c("x + y == 0", IntType::I8), "return (uint8_t)(x + y) == 0");
        assert_eq!(c("x < ~y", IntType::I16), "return x < (uint16_t)(~y)");
        assert_eq!(c("x + y == 0", IntType::I32), "return x + y == 0");
        assert_eq!(c("x * y - z", IntType::I16), "return (uint32_t)x * y - z");
        assert_eq!(c("(x + y) * z", IntType::I8), "return (uint32_t)(x + y) * z");
        assert_eq!(c("x * y", IntType::I64), "return x * y");

        // Widths without a C type are stored in a wider one and masked.
        assert_eq!(c("x + y == 3", IntType::new(5)), "return (((x + y) & 31) == 3) & 31");
        assert_eq!(c("x - y", IntType::new(40)), "return (x - y) & 1099511627775");
    }

    #[test]
    fn rust_function() {
        let ty = IntType::I16;
        let e = Expr::from_string("x == 3".to_owned(), ty).unwrap();
        let out = e.display_function(Formatter::Rust, "f", ty).to_string();
        assert_eq!(
            out,
            "fn f(x: Wrapping<u16>) -> Wrapping<u16> {\n\tWrapping((x == Wrapping(3)) as u16)\n}"
        );

        let ty = IntType::new(12);
        let e = Expr::from_string("x - 1 != y".to_owned(), ty).unwrap();
        assert_eq!(
            e.display(Formatter::Rust, 0, "", ty).to_string(),
            "(Wrapping(((x - Wrapping(1)) & Wrapping(4095)) != y) as u16)) & Wrapping(4095)"
        );
    }
}
