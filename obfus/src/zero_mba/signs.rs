//! Exact search for sign vectors that annihilate a [`BoolMatrix`].

use super::matrix::BoolMatrix;

/// A coefficient of a [`SignVector`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Sign {
    Pos,
    Neg,
}

impl Sign {
    pub fn value(self) -> i64 {
        match self {
            Sign::Pos => 1,
            Sign::Neg => -1,
        }
    }
}

/// A vector over `{-1, +1}`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct SignVector(Vec<Sign>);

impl SignVector {
    /// The candidate with index `k` of length `n`.
    /// Bit `j` of `k` is set iff component `j` is negative,
    /// so index 0 is the all-positive vector.
    pub fn from_index(n: usize, k: usize) -> Self {
        Self((0..n).map(|j| if (k >> j) & 1 == 1 { Sign::Neg } else { Sign::Pos }).collect())
    }

    /// All `2^n` candidates in increasing index order.
    pub fn candidates(n: usize) -> impl Iterator<Item = SignVector> {
        (0..1usize << n).map(move |k| Self::from_index(n, k))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn signs(&self) -> &[Sign] {
        &self.0
    }

    pub fn iter(&self) -> impl Iterator<Item = Sign> + '_ {
        self.0.iter().copied()
    }

    /// Integer dot product with a row of bits.
    pub fn dot(&self, row: &[bool]) -> i64 {
        debug_assert_eq!(row.len(), self.len());
        self.iter()
            .zip(row)
            .filter(|(_, b)| **b)
            .map(|(s, _)| s.value())
            .sum()
    }

    /// Does `m · self = 0` hold for every row?
    pub fn annihilates(&self, m: &BoolMatrix) -> bool {
        self.len() == m.num_cols() && m.rows().all(|r| self.dot(r) == 0)
    }
}

impl std::fmt::Display for SignVector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (i, s) in self.iter().enumerate() {
            if i != 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", s.value())?;
        }
        f.write_str("]")
    }
}

/// Finds the first sign vector (in candidate index order) that annihilates
/// the matrix, or `None` if there is none and the matrix has to be resampled.
pub fn solve_signs(m: &BoolMatrix) -> Option<SignVector> {
    SignVector::candidates(m.num_cols()).find(|v| v.annihilates(m))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn candidate_order() {
        let c: Vec<_> = SignVector::candidates(2).map(|v| v.to_string()).collect();
        assert_eq!(c, ["[1, 1]", "[-1, 1]", "[1, -1]", "[-1, -1]"]);
    }

    #[test]
    fn solvable_matrix() {
        // Column 1 is the complement of the truth column and column 2 is all
        // ones, so `c2 - c0 - c1 = 0`.
        let c1 = [true, true, true, true, false, false, false, false];
        let c2 = [true; 8];
        let m = BoolMatrix::from_random_cols(3, &[&c1, &c2]);
        let v = solve_signs(&m).unwrap();
        assert!(v.annihilates(&m));
        assert_eq!(v.to_string(), "[-1, -1, 1]");
        for r in m.rows() {
            assert_eq!(v.dot(r), 0);
        }
    }

    #[test]
    fn unsolvable_matrix() {
        // Row 4 is [1, 0, 0].
        let c1 = [true, false, true, true, false, false, true, true];
        let c2 = [false, true, true, false, false, true, true, false];
        let m = BoolMatrix::from_random_cols(3, &[&c1, &c2]);
        assert_eq!(solve_signs(&m), None);
    }

    #[test]
    fn one_variable_is_never_solvable() {
        assert_eq!(solve_signs(&BoolMatrix::truth_only(1)), None);
    }
}
