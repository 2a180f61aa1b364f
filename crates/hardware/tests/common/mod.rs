//! Shared test infrastructure.

/// Program and configuration builders.
pub mod builder;

/// Simulation and cache harnesses.
pub mod harness;

/// Mock collaborators.
pub mod mocks;
