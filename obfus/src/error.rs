//! Errors returned by the engine.
//!
//! Most failures are local: a site that can't be obfuscated is skipped and the
//! run continues. Operations on unsupported opcodes are not errors at all, they
//! report "no change" instead.

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The generate-and-test loop ran out of attempts before it found a
    /// matrix with an annihilating sign vector.
    #[error("no zero identity over {vars} variables after {attempts} attempts")]
    ResampleExhausted { vars: usize, attempts: usize },

    /// An identity was instantiated with the wrong number of variables.
    #[error("identity expects {expected} variables, got {got}")]
    VarCountMismatch { expected: usize, got: usize },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to parse expression: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;
