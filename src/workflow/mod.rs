//! State-changing workflows.

pub mod conclude;

pub use conclude::ConcludeWorkflow;
