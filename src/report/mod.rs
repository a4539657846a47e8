//! Report output.

pub mod generator;

pub use generator::{write_conclude_report, write_report};
