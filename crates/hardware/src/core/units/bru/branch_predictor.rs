//! Branch Predictor Interface.
//!
//! This module defines the `BranchPredictor` trait that all direction predictors
//! implement. Targets never need predicting: conditional branches and jumps carry
//! their target in the instruction.

/// Trait for branch direction prediction algorithms.
pub trait BranchPredictor {
    /// Predicts the direction of the conditional branch at `pc`.
    ///
    /// # Arguments
    ///
    /// * `pc` - Fetch address of the branch instruction
    ///
    /// # Returns
    ///
    /// `Some(taken)` when the predictor speculates, or `None` when fetch must wait for
    /// the branch to resolve.
    fn predict(&self, pc: u64) -> Option<bool>;

    /// Trains the predictor with a resolved outcome.
    ///
    /// # Arguments
    ///
    /// * `pc` - Fetch address of the branch instruction
    /// * `taken` - Whether the branch was actually taken
    fn update(&mut self, pc: u64, taken: bool);
}
