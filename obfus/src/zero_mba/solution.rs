//! The generate-and-test loop that finds a matrix together with its signs.

use log::debug;
use rand::Rng;

use super::matrix::{BoolMatrix, MAX_VARS, truth_bit};
use super::signs::{SignVector, solve_signs};
use crate::config::{ObfuscationConfig, Resampling};
use crate::error::{Error, Result};

/// A matrix and a sign vector with `matrix · signs = 0`.
///
/// Together they determine a zero identity over any `n` variables,
/// see [`Identity::build`].
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Identity {
    matrix: BoolMatrix,
    signs: SignVector,
}

impl Identity {
    /// Pairs a matrix with its signs.
    /// Returns `None` if the signs don't annihilate the matrix.
    pub fn new(matrix: BoolMatrix, signs: SignVector) -> Option<Self> {
        signs.annihilates(&matrix).then_some(Self { matrix, signs })
    }

    /// Generates a random identity with the settings from `cfg`.
    pub fn generate<R: Rng>(vars: usize, cfg: &ObfuscationConfig, rng: &mut R) -> Result<Self> {
        generate_solution(vars, cfg.resampling(), cfg.max_resample_attempts, rng)
    }

    /// The number of variables.
    pub fn vars(&self) -> usize {
        self.matrix.vars()
    }

    pub fn matrix(&self) -> &BoolMatrix {
        &self.matrix
    }

    pub fn signs(&self) -> &SignVector {
        &self.signs
    }
}

/// Samples matrices until one has an annihilating sign vector.
///
/// Gives up with [`Error::ResampleExhausted`] after `max_attempts` draws.
/// What a draw is depends on `resampling`. Fails with [`Error::InvalidConfig`]
/// unless `vars` is between 1 and [`MAX_VARS`].
pub fn generate_solution<R: Rng>(
    vars: usize,
    resampling: Resampling,
    max_attempts: usize,
    rng: &mut R,
) -> Result<Identity> {
    if !(1..=MAX_VARS).contains(&vars) {
        return Err(Error::InvalidConfig(format!(
            "zero identities need between 1 and {MAX_VARS} variables, got {vars}"
        )));
    }

    let result = match resampling {
        Resampling::Matrix => by_matrix(vars, max_attempts, rng),
        Resampling::Row => by_row(vars, max_attempts, rng),
    };

    match &result {
        Ok((id, attempts)) => debug!(
            "Found signs {} for {vars} variables after {attempts} draws",
            id.signs
        ),
        Err(e) => debug!("{e}"),
    }

    result.map(|(id, _)| id)
}

fn by_matrix<R: Rng>(vars: usize, max_attempts: usize, rng: &mut R) -> Result<(Identity, usize)> {
    for attempt in 1..=max_attempts {
        let matrix = BoolMatrix::sample(vars, rng);
        if let Some(signs) = solve_signs(&matrix) {
            return Ok((Identity { matrix, signs }, attempt));
        }
    }

    Err(Error::ResampleExhausted { vars, attempts: max_attempts })
}

fn by_row<R: Rng>(vars: usize, max_attempts: usize, rng: &mut R) -> Result<(Identity, usize)> {
    let mut matrix = BoolMatrix::truth_only(vars);
    let rows = matrix.num_rows();

    // The sign vectors that annihilate all rows drawn so far.
    let mut candidates: Vec<_> = SignVector::candidates(vars).collect();

    // Rows whose truth bit is set go first. Those are the ones that restrict
    // the candidates in a way a later row might not be able to satisfy.
    // Rows with a zero truth bit can always be satisfied by an all zero row.
    let order = (0..rows)
        .filter(|&i| truth_bit(vars, i))
        .chain((0..rows).filter(|&i| !truth_bit(vars, i)));

    let mut attempts = 0;
    for i in order {
        loop {
            if attempts == max_attempts {
                return Err(Error::ResampleExhausted { vars, attempts });
            }
            attempts += 1;

            matrix.randomize_row(i, rng);
            let row = matrix.row(i);
            if candidates.iter().any(|v| v.dot(row) == 0) {
                candidates.retain(|v| v.dot(row) == 0);
                break;
            }
        }
    }

    // The remaining candidates are exactly the solutions, so the solver will
    // find the first one.
    match solve_signs(&matrix) {
        Some(signs) => Ok((Identity { matrix, signs }, attempts)),
        None => unreachable!("Row-wise sampling produced an unsolvable matrix."),
    }
}

#[cfg(test)]
mod test {
    use rand::{SeedableRng as _, rngs::StdRng};
    use test_log::test;

    use super::*;

    #[test]
    fn three_vars_terminates() {
        let mut rng = StdRng::seed_from_u64(1);
        let id = generate_solution(3, Resampling::Matrix, 100_000, &mut rng).unwrap();
        assert_eq!(id.vars(), 3);
        assert_eq!(id.signs().len(), 3);
        for row in id.matrix().rows() {
            assert_eq!(id.signs().dot(row), 0);
        }
    }

    #[test]
    fn both_modes_produce_valid_solutions() {
        let mut rng = StdRng::seed_from_u64(0);
        for vars in 2..=3 {
            for mode in [Resampling::Matrix, Resampling::Row] {
                for _ in 0..10 {
                    let id = generate_solution(vars, mode, 100_000, &mut rng).unwrap();
                    assert!(id.signs().annihilates(id.matrix()));
                }
            }
        }
    }

    #[test]
    fn four_vars_by_row() {
        let mut rng = StdRng::seed_from_u64(0);
        for _ in 0..20 {
            let id = generate_solution(4, Resampling::Row, 100_000, &mut rng).unwrap();
            assert!(id.signs().annihilates(id.matrix()));
        }
    }

    #[test]
    fn exhausted() {
        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(
            generate_solution(1, Resampling::Matrix, 50, &mut rng),
            Err(Error::ResampleExhausted { vars: 1, attempts: 50 })
        );
        assert_eq!(
            generate_solution(1, Resampling::Row, 50, &mut rng),
            Err(Error::ResampleExhausted { vars: 1, attempts: 50 })
        );
        assert_eq!(
            generate_solution(3, Resampling::Matrix, 0, &mut rng),
            Err(Error::ResampleExhausted { vars: 3, attempts: 0 })
        );
    }

    #[test]
    fn unsupported_var_counts() {
        let mut rng = StdRng::seed_from_u64(0);
        for vars in [0, MAX_VARS + 1] {
            for mode in [Resampling::Matrix, Resampling::Row] {
                let r = generate_solution(vars, mode, 100, &mut rng);
                assert!(matches!(r, Err(Error::InvalidConfig(_))), "{r:?}");
            }
        }
    }

    #[test]
    fn same_seed_same_identity() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = generate_solution(3, Resampling::Matrix, 100_000, &mut rng).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let b = generate_solution(3, Resampling::Matrix, 100_000, &mut rng).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn rejects_wrong_signs() {
        let m = BoolMatrix::truth_only(2);
        assert!(Identity::new(m, SignVector::from_index(2, 0)).is_none());
    }
}
