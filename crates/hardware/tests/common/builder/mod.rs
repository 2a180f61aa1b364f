/// Configuration builders.
pub mod config;

/// Small workload programs.
pub mod program;
