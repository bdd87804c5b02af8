//! Basically a key-value store for variable names and their values,
//! but you can specify what to do when a variable is not found.

use rand::{SeedableRng, rngs::StdRng};

use crate::Symbol;
use crate::int_type::IntType;

/// Stores values that should be substituted into variables.
#[derive(Debug)]
pub struct Valuation {
    /// The key value pairs are stored as a Vector
    /// because I doubt a hashmap/tree would be faster
    /// when there are so few variables.
    vals: Vec<(Symbol, u64)>,

    /// What happens when the value of a variable is requested but not found
    /// in the valuation.
    missing: MissingValue,
}

impl Valuation {
    /// An empty valuation that will panic when any variable is requested.
    pub fn empty() -> Self {
        Self::from_vec_panic(Vec::new())
    }

    /// A valuation that returns a random value for any variable.
    /// The value will be consistent across multiple uses of the same variable.
    /// It will be stored in the valuation.
    pub fn random_seeded(seed: u64) -> Self {
        let rng = Box::new(StdRng::seed_from_u64(seed));
        Self { vals: Vec::new(), missing: MissingValue::Random(rng) }
    }

    /// Initializes a valuation from a list of pairs of variables and values.
    /// If a variable is requested that is not in the list, it will panic.
    pub fn from_vec_panic(vals: Vec<(Symbol, u64)>) -> Self {
        Self { vals, missing: MissingValue::Panic }
    }

    /// Returns the value of a variable, reduced to `ty`.
    pub fn value(&mut self, name: Symbol, ty: IntType) -> u64 {
        if let Some((_, v)) = self.vals.iter().find(|(n, _)| *n == name) {
            return ty.element(*v);
        }

        let v = match &mut self.missing {
            MissingValue::Panic => {
                panic!("Variable {name} not found in valuation.")
            },
            MissingValue::Random(rng) => ty.random(&mut **rng),
        };

        self.vals.push((name, v));
        v
    }

    /// Sets the value of a variable.
    pub fn set_value(&mut self, name: Symbol, value: u64) {
        match self.vals.iter_mut().find(|(n, _)| *n == name) {
            Some((_, v)) => *v = value,
            None => self.vals.push((name, value)),
        }
    }

}

/// What should be done for a variable that is not found in the valuation.
enum MissingValue {
    Panic,

    /// Return a random value.
    /// We use a box here, because the random number generator
    /// can be quite large, and we want the [`Valuation`] to be small.
    Random(Box<StdRng>),
}

impl std::fmt::Debug for MissingValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingValue::Panic => write!(f, "Panic"),
            MissingValue::Random(_) => write!(f, "Random"),
        }
    }
}

#[test]
fn random_values_are_stable() {
    let x = Symbol::new("x");
    let mut v = Valuation::random_seeded(0);
    let a = v.value(x, IntType::I8);
    assert_eq!(v.value(x, IntType::I8), a);
    assert!(a < 256);
    v.set_value(x, 3);
    assert_eq!(v.value(x, IntType::I8), 3);
    let y = Symbol::new("y");
    let b = v.value(y, IntType::I16);
    assert_eq!(v.value(y, IntType::I16), b);
}
