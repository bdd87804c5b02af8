//! The obfuscation pass over a [`Function`].

use std::fmt::Display;

use log::{debug, info, warn};
use rand::Rng;

use crate::config::ObfuscationConfig;
use crate::error::Result;
use crate::ir::{Function, Site};

/// What a run of the pass did.
#[derive(Clone, Copy, Default, PartialEq, Eq, Debug)]
pub struct PassStats {
    /// Sites that were rewritten.
    pub transformed: usize,

    /// Sites that could have been rewritten but the rewrite failed.
    pub skipped: usize,

    /// Sites the catalog has nothing for.
    pub unsupported: usize,

    /// The whole function was skipped because of its name.
    pub skipped_function: bool,
}

impl PassStats {
    /// Whether the function was modified.
    pub fn changed(&self) -> bool {
        self.transformed > 0
    }
}

impl Display for PassStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} transformed, {} skipped, {} unsupported",
            self.transformed, self.skipped, self.unsupported
        )
    }
}

/// Rewrites every supported instruction of a function.
#[derive(Clone, Debug)]
pub struct ObfuscationPass {
    cfg: ObfuscationConfig,
}

impl ObfuscationPass {
    /// Creates the pass. Fails if the configuration is invalid.
    pub fn new(cfg: ObfuscationConfig) -> Result<Self> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &ObfuscationConfig {
        &self.cfg
    }

    /// Runs the pass with a generator seeded from the configuration.
    pub fn run_seeded(&self, f: &mut Function) -> PassStats {
        let mut rng = self.cfg.rng();
        self.run(f, &mut rng)
    }

    /// Runs the pass on `f`.
    ///
    /// Binary operations are rewritten first, then the literals of
    /// comparisons are hidden. The sites are collected up front, so the
    /// instructions the pass inserts are not visited again.
    pub fn run<R: Rng>(&self, f: &mut Function, rng: &mut R) -> PassStats {
        let mut stats = PassStats::default();
        if self.cfg.skip_functions.iter().any(|n| n == f.name()) {
            info!("Skipping {}", f.name());
            stats.skipped_function = true;
            return stats;
        }

        let (binary, rest): (Vec<Site>, Vec<Site>) =
            f.sites().into_iter().partition(Site::is_binary);

        for site in binary.iter().chain(&rest) {
            if site.is_compare() && !self.cfg.hide_constants {
                stats.unsupported += 1;
                continue;
            }

            match f.rewrite_site(site.inst(), &self.cfg, rng) {
                Ok(true) => {
                    debug!("Rewrote {:?}", site.op());
                    stats.transformed += 1;
                },
                Ok(false) => stats.unsupported += 1,
                Err(e) => {
                    warn!("Skipping {:?} in {}: {e}", site.op(), f.name());
                    stats.skipped += 1;
                },
            }
        }

        if stats.changed() {
            info!("Obfuscated {}: {stats}", f.name());
        } else {
            info!("Did not change {}", f.name());
        }

        stats
    }
}

#[cfg(test)]
mod test {
    use rand::{SeedableRng as _, rngs::StdRng};
    use test_log::test;

    use super::*;
    use crate::expr::Expr;
    use crate::int_type::IntType;

    fn function(name: &str, s: &str, ty: IntType) -> Function {
        let e = Expr::from_string(s.to_owned(), ty).unwrap();
        Function::from_expr(name, &e, ty)
    }

    #[test]
    fn preserves_semantics() {
        let mut rng = StdRng::seed_from_u64(0);
        for var_count in 2..=4 {
            let cfg = ObfuscationConfig { var_count, ..Default::default() };
            let pass = ObfuscationPass::new(cfg).unwrap();

            for ty in [IntType::I8, IntType::I64] {
                let orig = function(
                    "f",
                    "(a + b) * c - (a ^ 3) | (b & c) == (c - 1) + (a < 5)",
                    ty,
                );
                let mut f = orig.clone();
                let stats = pass.run(&mut f, &mut rng);
                assert!(stats.changed());
                assert_eq!(stats.skipped, 0);
                // `*` and the comparison without a literal.
                assert_eq!(stats.unsupported, 2);

                for _ in 0..500 {
                    let args: Vec<_> = (0..3).map(|_| ty.random(&mut rng)).collect();
                    assert_eq!(f.eval(&args), orig.eval(&args), "{f}");
                }
            }
        }
    }

    #[test]
    fn skips_main() {
        let pass = ObfuscationPass::new(ObfuscationConfig::default()).unwrap();
        let orig = function("main", "x + y", IntType::I32);
        let mut f = orig.clone();
        let stats = pass.run_seeded(&mut f);
        assert!(stats.skipped_function);
        assert!(!stats.changed());
        assert_eq!(f, orig);
    }

    #[test]
    fn same_seed_same_output() {
        let cfg = ObfuscationConfig { seed: 1234, ..Default::default() };
        let pass = ObfuscationPass::new(cfg).unwrap();
        let run = || {
            let mut f = function("f", "(x | y) - (x & 9) + (y == 0)", IntType::I16);
            pass.run_seeded(&mut f);
            f.to_string()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn four_variables_by_default() {
        let cfg = ObfuscationConfig {
            var_count: 4,
            zero_identity_probability: 1.0,
            ..Default::default()
        };
        let pass = ObfuscationPass::new(cfg).unwrap();
        let orig = function("f", "(x + y) ^ (x & y) | (x == 3)", IntType::I32);
        let mut f = orig.clone();
        let stats = pass.run_seeded(&mut f);
        assert_eq!(stats.transformed, 5);
        assert_eq!(stats.skipped, 0);

        let mut rng = StdRng::seed_from_u64(1);
        for _ in 0..200 {
            let args: Vec<_> = (0..2).map(|_| IntType::I32.random(&mut rng)).collect();
            assert_eq!(f.eval(&args), orig.eval(&args));
        }
        assert_eq!(f.eval(&[3, 5]), orig.eval(&[3, 5]));
    }

    #[test]
    fn exhausted_sites_are_skipped() {
        let cfg = ObfuscationConfig {
            var_count: 4,
            max_resample_attempts: 1,
            zero_identity_probability: 1.0,
            ..Default::default()
        };
        let pass = ObfuscationPass::new(cfg).unwrap();
        let orig = function("f", "x + y", IntType::I8);
        let mut f = orig.clone();
        let stats = pass.run_seeded(&mut f);
        assert_eq!(stats, PassStats { skipped: 1, ..Default::default() });
        assert_eq!(f, orig);
    }

    #[test]
    fn rejects_invalid_config() {
        let cfg = ObfuscationConfig { var_count: 1, ..Default::default() };
        assert!(ObfuscationPass::new(cfg).is_err());
    }
}
