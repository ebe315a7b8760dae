// Gate randomness - injectable uniform source for the stochastic step gate

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Uniform `[0, 1)` source consulted by the stochastic gate
///
/// Injected so hosts can replace it and tests can make playback
/// deterministic. Boundary probabilities (0 and 1) never consult it.
pub trait GateRng: Send {
    /// One uniform draw in `[0, 1)`
    fn next_unit(&mut self) -> f64;
}

/// Default source backed by rand's standard generator
pub struct EntropyRng {
    inner: StdRng,
}

impl EntropyRng {
    pub fn new() -> Self {
        Self {
            inner: StdRng::from_entropy(),
        }
    }

    /// Reproducible source for a fixed seed
    pub fn seeded(seed: u64) -> Self {
        Self {
            inner: StdRng::seed_from_u64(seed),
        }
    }
}

impl Default for EntropyRng {
    fn default() -> Self {
        Self::new()
    }
}

impl GateRng for EntropyRng {
    fn next_unit(&mut self) -> f64 {
        self.inner.gen_range(0.0..1.0)
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted
///
/// Lets tests script exact gate outcomes.
pub struct ScriptedRng {
    values: Vec<f64>,
    index: usize,
}

impl ScriptedRng {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values, index: 0 }
    }

    /// A source that always returns the same value
    pub fn constant(value: f64) -> Self {
        Self::new(vec![value])
    }
}

impl GateRng for ScriptedRng {
    fn next_unit(&mut self) -> f64 {
        if self.values.is_empty() {
            return 0.0;
        }
        let value = self.values[self.index % self.values.len()];
        self.index += 1;
        value
    }
}
