//! The boolean matrices zero identities are derived from.

use rand::Rng;

/// The largest number of variables a [`BoolMatrix`] may have.
/// The matrix has `2^vars` rows, and the sign search is exponential as well,
/// so this is already far beyond what is useful.
pub const MAX_VARS: usize = 6;

/// A `2^n × n` matrix of bits.
///
/// Column `j` is the truth table of a boolean function of the `n` variables,
/// where row `i` is the assignment in which variable `j` has the value of
/// bit `n-1-j` of `i`. Column 0 is always the truth table of the first
/// variable itself, i.e. bit `n-1` of the row index.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BoolMatrix {
    vars: usize,

    /// Row major.
    entries: Vec<bool>,
}

impl BoolMatrix {
    /// The matrix whose column 0 is the truth column and every other entry is
    /// zero.
    pub fn truth_only(vars: usize) -> Self {
        assert!(
            (1..=MAX_VARS).contains(&vars),
            "Matrices need between 1 and {MAX_VARS} variables."
        );

        let rows = 1 << vars;
        let mut entries = vec![false; rows * vars];
        for i in 0..rows {
            entries[i * vars] = truth_bit(vars, i);
        }

        Self { vars, entries }
    }

    /// Samples a matrix: column 0 is the truth column, all other entries are
    /// uniformly random.
    pub fn sample<R: Rng>(vars: usize, rng: &mut R) -> Self {
        let mut m = Self::truth_only(vars);
        for i in 0..m.num_rows() {
            m.randomize_row(i, rng);
        }
        m
    }

    /// Builds a matrix from its random columns (columns `1..n`).
    /// Column 0 is always the truth column and can't be chosen.
    ///
    /// Panics if a column does not have `2^n` entries.
    pub fn from_random_cols(vars: usize, cols: &[&[bool]]) -> Self {
        assert_eq!(cols.len() + 1, vars, "Expected {} columns.", vars - 1);
        let mut m = Self::truth_only(vars);
        for (j, col) in cols.iter().enumerate() {
            assert_eq!(col.len(), m.num_rows(), "Column has the wrong length.");
            for (i, &b) in col.iter().enumerate() {
                *m.entry_mut(i, j + 1) = b;
            }
        }
        m
    }

    /// The number of variables, which is also the number of columns.
    pub fn vars(&self) -> usize {
        self.vars
    }

    pub fn num_rows(&self) -> usize {
        1 << self.vars
    }

    pub fn num_cols(&self) -> usize {
        self.vars
    }

    pub fn entry(&self, r: usize, c: usize) -> bool {
        self.entries[r * self.vars + c]
    }

    fn entry_mut(&mut self, r: usize, c: usize) -> &mut bool {
        &mut self.entries[r * self.vars + c]
    }

    pub fn row(&self, r: usize) -> &[bool] {
        &self.entries[r * self.vars..(r + 1) * self.vars]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.entries.chunks_exact(self.vars)
    }

    /// Returns column `c` as a truth table.
    pub fn col(&self, c: usize) -> Vec<bool> {
        assert!(c < self.vars, "Column {c} out of bounds.");
        self.rows().map(|r| r[c]).collect()
    }

    /// Redraws the random entries (columns `1..n`) of row `r`.
    pub(crate) fn randomize_row<R: Rng>(&mut self, r: usize, rng: &mut R) {
        for c in 1..self.vars {
            *self.entry_mut(r, c) = rng.random();
        }
    }
}

impl std::fmt::Display for BoolMatrix {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for row in self.rows() {
            f.write_str("[")?;
            for (j, &b) in row.iter().enumerate() {
                if j != 0 {
                    f.write_str(" ")?;
                }
                f.write_str(if b { "1" } else { "0" })?;
            }
            f.write_str("]\n")?;
        }
        Ok(())
    }
}

/// The entry of the truth column in row `i`: bit `vars - 1` of `i`.
pub(crate) fn truth_bit(vars: usize, i: usize) -> bool {
    (i >> (vars - 1)) & 1 == 1
}

#[cfg(test)]
mod test {
    use rand::{SeedableRng as _, rngs::StdRng};

    use super::*;

    #[test]
    fn truth_column_is_high_bit() {
        let mut rng = StdRng::seed_from_u64(0);
        for vars in 1..=4 {
            let m = BoolMatrix::sample(vars, &mut rng);
            assert_eq!(m.num_rows(), 1 << vars);
            assert_eq!(m.num_cols(), vars);
            let rows = m.num_rows();
            let col = m.col(0);
            assert!(col[..rows / 2].iter().all(|b| !b));
            assert!(col[rows / 2..].iter().all(|b| *b));
        }
    }

    #[test]
    fn sampling_is_seeded() {
        let a = BoolMatrix::sample(3, &mut StdRng::seed_from_u64(7));
        let b = BoolMatrix::sample(3, &mut StdRng::seed_from_u64(7));
        assert_eq!(a, b);
    }

    #[test]
    fn from_cols() {
        let c1 = [true, false, true, true, false, false, true, false];
        let c2 = [false, true, true, false, false, true, true, false];
        let m = BoolMatrix::from_random_cols(3, &[&c1, &c2]);
        assert_eq!(m.col(1), c1);
        assert_eq!(m.col(2), c2);
        assert_eq!(m.row(5), &[true, false, true]);
    }
}
