//! Feature expansion from raw capture signals.
//!
//! Eight primary signals (indices 0–7) are derived from the cycle delta,
//! energy and temperature. Each primary signal then seeds a channel that is
//! propagated across nine stages: index `i` is index `i - 8` scaled by a
//! multiplicative factor in `[0.9, 1.1)`, so noise compounds along a channel.

use crate::core::measurement::DIMENSIONS;
use crate::core::noise::NoiseSource;

/// Number of independent channels (the primary signals).
pub const PRIMARY_SIGNALS: usize = 8;

/// Upper bound (exclusive) of the thermal-noise proxy in `dims[7]`.
const THERMAL_NOISE_RANGE: u32 = 1000;

/// Number of perturbation steps; one step is 0.001.
const PERTURBATION_STEPS: u32 = 200;

/// Raw inputs to one expansion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureInputs {
    /// Cycle-counter delta since the previous capture
    pub cycle_delta: u64,
    /// Cycle-counter value the delta was taken at
    pub cycle_count: u64,
    /// Energy over the sampling interval, in joules
    pub energy: f64,
    /// Temperature in °C
    pub temperature: f64,
}

/// Synthetic performance counters estimated from a cycle delta.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DerivedCounters {
    pub instructions: u64,
    pub cache_misses: u64,
    pub branch_misses: u64,
}

impl DerivedCounters {
    pub fn from_cycle_delta(delta: u64) -> Self {
        Self {
            instructions: delta / 1000,
            cache_misses: delta % 1000,
            branch_misses: (delta / 10) % 100,
        }
    }
}

/// Multiplier applied to derive a dimension from the one eight positions earlier.
pub fn perturbation_factor(draw: u32) -> f64 {
    0.9 + f64::from(draw % PERTURBATION_STEPS) * 0.001
}

/// Expand raw signals into the full feature vector.
///
/// Consumes exactly `1 + (DIMENSIONS - 8)` words from `noise`: one for the
/// thermal-noise proxy, then one per derived dimension in index order.
pub fn expand_features(inputs: &FeatureInputs, noise: &mut dyn NoiseSource) -> [f64; DIMENSIONS] {
    let delta = inputs.cycle_delta;
    let counters = DerivedCounters::from_cycle_delta(delta);
    let mut dims = [0.0; DIMENSIONS];

    dims[0] = delta as f64;
    dims[1] = counters.instructions as f64;
    dims[2] = inputs.energy * 1_000_000.0;
    dims[3] = inputs.temperature;
    dims[4] = counters.cache_misses as f64;
    dims[5] = counters.branch_misses as f64;
    dims[6] = (inputs.cycle_count % 1000) as f64;
    dims[7] = f64::from(noise.next_u32() % THERMAL_NOISE_RANGE);

    for i in PRIMARY_SIGNALS..DIMENSIONS {
        dims[i] = dims[i - PRIMARY_SIGNALS] * perturbation_factor(noise.next_u32());
    }

    dims
}
