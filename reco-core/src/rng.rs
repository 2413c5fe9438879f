//! Seeded random-number service shared by every stochastic module.
//!
//! `SPEC_FULL.md` §5 requires exactly one deterministic engine per run, drawn from sequentially
//! in module declaration order; this module is that engine plus the two draw primitives the
//! calorimeter and b-tagger need.

use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal, Poisson};
use rand_pcg::Pcg64;

/// Seeded engine threaded through [`crate::module::ModuleContext`].
pub struct RandomService {
    rng: Pcg64,
}

impl RandomService {
    /// Creates a new service seeded from `seed`. Same seed, same input, same draw sequence.
    #[must_use]
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg64::seed_from_u64(seed),
        }
    }

    /// Draws one `f64` uniformly in `[0, 1)`, used by the b-tagger's shared per-jet draw.
    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Draws a standard-normal deviate.
    pub fn standard_normal(&mut self) -> f64 {
        Normal::new(0.0, 1.0)
            .expect("N(0,1) parameters are always valid")
            .sample(&mut self.rng)
    }

    /// Draws a Poisson-distributed count with the given mean, used by the pile-up merger to
    /// pick how many minimum-bias events to overlay.
    pub fn poisson(&mut self, mean: f64) -> u64 {
        if mean <= 0.0 {
            return 0;
        }
        Poisson::new(mean)
            .expect("Poisson mean must be positive, checked above")
            .sample(&mut self.rng) as u64
    }

    /// Smears a positive mean `mu` by a log-normal distribution with fractional width `sigma`
    /// (`SPEC_FULL.md` §4.3): `b = sqrt(ln(1 + sigma^2/mu^2))`, `a = ln(mu) - b^2/2`, draw =
    /// `exp(a + b * N(0,1))`. Returns `0.0` for `mu <= 0` (the NumericError case of §7, locally
    /// recovered rather than propagated).
    pub fn log_normal(&mut self, mu: f64, sigma: f64) -> f64 {
        if mu <= 0.0 {
            return 0.0;
        }
        let b = (1.0 + (sigma * sigma) / (mu * mu)).ln().sqrt();
        let a = mu.ln() - b * b / 2.0;
        (a + b * self.standard_normal()).exp()
    }
}
