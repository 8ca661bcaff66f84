//! Core functionality for gtester differential testing.
//!
//! This crate provides the building blocks of a randomized differential test:
//! composable stateful generators, test cases, the harness that compares a
//! candidate function against a reference, and the reporting seam.

pub mod case;
pub mod data;
pub mod error;
pub mod gen;
pub mod harness;
pub mod report;
pub mod value;

// Re-export the main types
pub use case::*;
pub use data::*;
pub use error::*;
pub use gen::*;
pub use harness::*;
pub use report::*;
pub use value::*;
