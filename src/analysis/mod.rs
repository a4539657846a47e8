//! Analysis modules.
//!
//! Aggregation of per-course results into report counters.

pub mod aggregator;

pub use aggregator::*;
