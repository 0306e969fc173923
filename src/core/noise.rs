//! Bounded random sources used for synthetic noise.
//!
//! None of these are security controls. They exist so the feature expander
//! and the simulated sensor can add realistic jitter, and so tests can replay
//! a fixed sequence.

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// A source of raw 32-bit random words.
pub trait NoiseSource: Send {
    fn next_u32(&mut self) -> u32;
}

/// Seeded ChaCha8 noise. Unseeded instances draw their seed from the OS.
pub struct ChaChaNoise {
    rng: ChaCha8Rng,
}

impl ChaChaNoise {
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => ChaCha8Rng::seed_from_u64(s),
            None => ChaCha8Rng::from_entropy(),
        };
        Self { rng }
    }
}

impl Default for ChaChaNoise {
    fn default() -> Self {
        Self::new(None)
    }
}

impl NoiseSource for ChaChaNoise {
    fn next_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }
}

impl std::fmt::Debug for ChaChaNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChaChaNoise").finish_non_exhaustive()
    }
}

/// Replays a fixed sequence of words, wrapping around at the end.
#[derive(Debug, Clone)]
pub struct SequenceNoise {
    values: Vec<u32>,
    position: usize,
}

impl SequenceNoise {
    /// An empty sequence yields zeros.
    pub fn new(values: Vec<u32>) -> Self {
        Self {
            values,
            position: 0,
        }
    }

    /// Number of words consumed so far.
    pub fn consumed(&self) -> usize {
        self.position
    }
}

impl NoiseSource for SequenceNoise {
    fn next_u32(&mut self) -> u32 {
        if self.values.is_empty() {
            return 0;
        }
        let value = self.values[self.position % self.values.len()];
        self.position += 1;
        value
    }
}
