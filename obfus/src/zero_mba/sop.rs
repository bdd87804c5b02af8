//! Truth tables to sum-of-products expressions.

use crate::builder::ExprBuilder;
use crate::int_type::IntType;

/// Builds the canonical sum of products (DNF) of a truth table.
///
/// Row `i` of `table` is the assignment in which `vars[j]` has the value of
/// bit `n-1-j` of `i`. Every row whose entry is set contributes the
/// conjunction of all variables, each either as is or negated. The
/// conjunctions are or'ed together in row order. An empty table (no set
/// rows) gives the constant zero.
///
/// The operations are bitwise, so bit `k` of the result is the table
/// evaluated at bits `k` of the variables.
pub fn sum_of_products<B: ExprBuilder>(
    b: &mut B,
    vars: &[B::Node],
    table: &[bool],
    ty: IntType,
) -> B::Node {
    let n = vars.len();
    assert!(n > 0, "A sum of products needs at least one variable.");
    assert_eq!(table.len(), 1 << n, "The truth table needs 2^{n} rows.");

    let mut sum: Option<B::Node> = None;
    for i in (0..table.len()).filter(|&i| table[i]) {
        let mut product: Option<B::Node> = None;
        for (j, v) in vars.iter().enumerate() {
            let lit = if (i >> (n - j - 1)) & 1 == 0 {
                b.not(v)
            } else {
                v.clone()
            };

            product = Some(match product {
                None => lit,
                Some(p) => b.and(&p, &lit),
            });
        }

        // `n > 0`, so the product is never empty.
        let Some(product) = product else { unreachable!() };
        sum = Some(match sum {
            None => product,
            Some(s) => b.or(&s, &product),
        });
    }

    match sum {
        Some(s) => s,
        None => b.constant(ty, 0),
    }
}

#[cfg(test)]
mod test {
    use rand::{Rng as _, SeedableRng as _, rngs::StdRng};

    use super::*;
    use crate::builder::Evaluator;
    use crate::expr::{Expr, TreeBuilder};

    /// Evaluates the sum of products of `table` in the 1 bit type for every
    /// row and checks that it is the table entry.
    fn check_table(table: &[bool], n: usize) {
        let ty = IntType::I1;
        for i in 0..1usize << n {
            let mut b = Evaluator::new(ty);
            let vars: Vec<u64> = (0..n).map(|j| ((i >> (n - j - 1)) & 1) as u64).collect();
            let v = sum_of_products(&mut b, &vars, table, ty);
            assert_eq!(v, table[i] as u64, "table {table:?}, row {i}");
        }
    }

    #[test]
    fn all_tables_of_two_vars() {
        for t in 0..16usize {
            let table: Vec<_> = (0..4).map(|i| (t >> i) & 1 == 1).collect();
            check_table(&table, 2);
        }
    }

    #[test]
    fn random_tables() {
        let mut rng = StdRng::seed_from_u64(0);
        for n in 1..=4 {
            for _ in 0..32 {
                let table: Vec<bool> = (0..1 << n).map(|_| rng.random()).collect();
                check_table(&table, n);
            }
        }
    }

    #[test]
    fn bitwise_on_wide_types() {
        // Every bit position is an independent row of the table.
        let ty = IntType::I8;
        let table = [false, true, true, false];
        let mut b = Evaluator::new(ty);
        let v = sum_of_products(&mut b, &[0b1100, 0b1010], &table, ty);
        assert_eq!(v, 0b0110);
    }

    #[test]
    fn degenerate_column() {
        let ty = IntType::I8;
        let mut b = TreeBuilder;
        let x = Expr::var("x");
        let y = Expr::var("y");
        let e = sum_of_products(&mut b, &[x, y], &[false; 4], ty);
        assert!(e.is_zero());
    }

    #[test]
    fn shape() {
        let ty = IntType::I8;
        let mut b = TreeBuilder;
        let vars = [Expr::var("x"), Expr::var("y")];
        let e = sum_of_products(&mut b, &vars, &[false, true, false, true], ty);
        assert_eq!(e.to_string(), "~x & y | x & y");
    }
}
