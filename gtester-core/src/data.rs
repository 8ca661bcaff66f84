//! Core data types: the per-cycle random source and run configuration.

use crate::error::{GTesterError, Result};
use crate::value::Value;
use rand::{RngCore, SeedableRng};
use std::fmt;
use std::time::Duration;

/// Deterministic random source threaded through every regeneration.
///
/// A fresh source is built for each cycle from the run seed and the cycle
/// index, so any single cycle can be reproduced without replaying the ones
/// before it. Uses SplitMix64 for output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    state: u64,
    gamma: u64,
}

impl Source {
    /// Create a new source from a single value.
    pub fn from_u64(value: u64) -> Self {
        let state = splitmix64_mix(value);
        let gamma = mix_gamma(state);
        Source { state, gamma }
    }

    /// Source for cycle `cycle` of a run seeded with `seed`.
    ///
    /// The seed is mixed before the cycle index is folded in, so neighbouring
    /// seeds do not replay each other's cycles.
    pub fn for_cycle(seed: u64, cycle: usize) -> Self {
        Source::from_u64(splitmix64_mix(seed) ^ cycle as u64)
    }
}

impl SeedableRng for Source {
    type Seed = [u8; 8];

    fn from_seed(seed: Self::Seed) -> Self {
        Source::from_u64(u64::from_le_bytes(seed))
    }

    fn seed_from_u64(state: u64) -> Self {
        Source::from_u64(state)
    }
}

impl RngCore for Source {
    fn next_u32(&mut self) -> u32 {
        (self.next_u64() >> 32) as u32
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(self.gamma);
        splitmix64_mix(self.state)
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        for chunk in dest.chunks_mut(8) {
            let bytes = self.next_u64().to_le_bytes();
            chunk.copy_from_slice(&bytes[..chunk.len()]);
        }
    }

    fn try_fill_bytes(&mut self, dest: &mut [u8]) -> std::result::Result<(), rand::Error> {
        self.fill_bytes(dest);
        Ok(())
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Source({}, {})", self.state, self.gamma)
    }
}

/// Configuration for a harness run.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    /// Number of generation cycles.
    pub cycles: usize,

    /// Per-cycle time limit for the candidate, in seconds.
    pub time_limit_secs: f64,

    /// 0 = silent on pass, 1 = summary line, 2+ = also arguments and result.
    pub print_on_pass: u8,

    /// Abort after this many failures. 0 means never abort.
    pub fail_on: usize,

    /// Base seed mixed with the cycle index.
    pub seed: u64,

    /// Passing results that are never reported.
    pub quiet_results: Vec<Value>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cycles: 100,
            time_limit_secs: 1.0,
            print_on_pass: 0,
            fail_on: 0,
            seed: 0,
            quiet_results: Vec::new(),
        }
    }
}

impl Config {
    /// Create a new config with the given number of cycles.
    pub fn with_cycles(mut self, cycles: usize) -> Self {
        self.cycles = cycles;
        self
    }

    /// Create a new config with the given time limit in seconds.
    pub fn with_time_limit_secs(mut self, secs: f64) -> Self {
        self.time_limit_secs = secs;
        self
    }

    /// Create a new config with the given pass verbosity.
    pub fn with_print_on_pass(mut self, level: u8) -> Self {
        self.print_on_pass = level;
        self
    }

    /// Create a new config with the given failure budget.
    pub fn with_fail_on(mut self, failures: usize) -> Self {
        self.fail_on = failures;
        self
    }

    /// Create a new config with the given base seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Passing results equal to any of these are not reported.
    pub fn with_quiet_results(mut self, results: Vec<Value>) -> Self {
        self.quiet_results = results;
        self
    }

    /// The time limit as a duration.
    pub fn time_limit(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.time_limit_secs).map_err(|_| {
            GTesterError::InvalidConfig {
                message: format!("time limit {} is not a valid duration", self.time_limit_secs),
            }
        })
    }

    /// Check the configuration before a run.
    pub fn validate(&self) -> Result<()> {
        self.time_limit().map(|_| ())
    }
}

/// SplitMix64 mixing function for high-quality output.
fn splitmix64_mix(mut z: u64) -> u64 {
    z = z.wrapping_add(0x9e3779b97f4a7c15);
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58476d1ce4e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d049bb133111eb);
    z ^ (z >> 31)
}

/// Generate a good gamma value for SplitMix64.
fn mix_gamma(mut z: u64) -> u64 {
    z = splitmix64_mix(z);
    // Ensure gamma is odd for maximal period
    (z | 1).wrapping_mul(0x9e3779b97f4a7c15)
}
