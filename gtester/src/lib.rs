//! gtester randomized differential testing.
//!
//! This is the main entry point for gtester, re-exporting the core engine and
//! adding helpers for writing brute-force reference functions.

pub use gtester_core::*;

pub mod brute;
