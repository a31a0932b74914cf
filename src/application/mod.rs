//! Application layer: use cases and services.
//!
//! This module puts a loaded reference behind the calculations callers need.

mod calculator;

pub use calculator::{Calculation, CentileValue, GrowthCalculator, Observation};
