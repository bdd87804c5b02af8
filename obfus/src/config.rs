//! Settings of the obfuscation.

use rand::{SeedableRng as _, rngs::StdRng};

use crate::error::{Error, Result};

/// Use `ObfuscationConfig::default()` to get a reasonable default.
#[derive(Clone, Debug)]
pub struct ObfuscationConfig {
    /// The seed of the random number generator.
    /// Two runs with the same seed on the same input produce the same output.
    ///
    /// The default is 1.
    pub seed: u64,

    /// The number of variables of each generated zero identity.
    /// Must be 2, 3 or 4.
    ///
    /// The default is 3, i.e. the two operands and a random constant.
    pub var_count: usize,

    /// How many times the matrix (or row, see [`Resampling`]) may be redrawn
    /// before the identity generation gives up.
    ///
    /// The default is 100000.
    pub max_resample_attempts: usize,

    /// What is redrawn when a matrix has no sign vector.
    /// `None` picks the mode from `var_count`, see [`Self::resampling`].
    ///
    /// The default is `None`.
    pub resampling: Option<Resampling>,

    /// The probability with which an operand is padded with a zero identity
    /// before the rewrite.
    ///
    /// The default is 0.5.
    pub zero_identity_probability: f64,

    /// Whether literal operands of comparisons are replaced by zero identities.
    ///
    /// The default is `true`.
    pub hide_constants: bool,

    /// Functions the pass leaves alone.
    ///
    /// The default is `["main"]`.
    pub skip_functions: Vec<String>,
}

impl Default for ObfuscationConfig {
    /// Returns a reasonable default configuration.
    /// See the documentation of the members for the default values.
    fn default() -> Self {
        Self {
            seed: 1,
            var_count: 3,
            max_resample_attempts: 100_000,
            resampling: None,
            zero_identity_probability: 0.5,
            hide_constants: true,
            skip_functions: vec!["main".to_owned()],
        }
    }
}

impl ObfuscationConfig {
    /// Checks that all settings are in range.
    pub fn validate(&self) -> Result<()> {
        if !(2..=4).contains(&self.var_count) {
            return Err(Error::InvalidConfig(format!(
                "var_count must be 2, 3 or 4, got {}",
                self.var_count
            )));
        }

        if self.max_resample_attempts == 0 {
            return Err(Error::InvalidConfig(
                "max_resample_attempts must be positive".to_owned(),
            ));
        }

        if !(0.0..=1.0).contains(&self.zero_identity_probability) {
            return Err(Error::InvalidConfig(format!(
                "zero_identity_probability must be in [0, 1], got {}",
                self.zero_identity_probability
            )));
        }

        Ok(())
    }

    /// The resampling mode that is used.
    ///
    /// Unless one is set explicitly, this is [`Resampling::Matrix`] for up to
    /// three variables and [`Resampling::Row`] for four.
    pub fn resampling(&self) -> Resampling {
        match self.resampling {
            Some(r) => r,
            None if self.var_count >= 4 => Resampling::Row,
            None => Resampling::Matrix,
        }
    }

    /// The generator all randomness of a run should be drawn from.
    pub fn rng(&self) -> StdRng {
        StdRng::seed_from_u64(self.seed)
    }
}

/// What is drawn again when the sampled matrix has no annihilating sign
/// vector.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resampling {
    /// Draw a whole new matrix. Every matrix counts as one attempt.
    ///
    /// With four variables only about one in a million matrices has a sign
    /// vector, so use [`Resampling::Row`] there.
    Matrix,

    /// Draw the matrix row by row and redraw a row as long as no sign vector
    /// is compatible with the rows so far. Every row draw counts as one
    /// attempt.
    Row,
}

#[test]
fn validate_config() {
    assert_eq!(ObfuscationConfig::default().validate(), Ok(()));

    let cfg = ObfuscationConfig { var_count: 5, ..Default::default() };
    assert!(matches!(cfg.validate(), Err(Error::InvalidConfig(_))));

    let cfg = ObfuscationConfig {
        zero_identity_probability: 1.5,
        ..Default::default()
    };
    assert!(cfg.validate().is_err());

    let cfg = ObfuscationConfig { max_resample_attempts: 0, ..Default::default() };
    assert!(cfg.validate().is_err());
}

#[test]
fn resampling_follows_var_count() {
    let cfg = ObfuscationConfig::default();
    assert_eq!(cfg.resampling(), Resampling::Matrix);

    let cfg = ObfuscationConfig { var_count: 4, ..Default::default() };
    assert_eq!(cfg.resampling(), Resampling::Row);

    let cfg = ObfuscationConfig {
        var_count: 4,
        resampling: Some(Resampling::Matrix),
        ..Default::default()
    };
    assert_eq!(cfg.resampling(), Resampling::Matrix);

    let cfg = ObfuscationConfig {
        var_count: 2,
        resampling: Some(Resampling::Row),
        ..Default::default()
    };
    assert_eq!(cfg.resampling(), Resampling::Row);
}
