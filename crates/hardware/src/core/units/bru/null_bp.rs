//! Null Branch Predictor.
//!
//! Never speculates. Fetch stops behind every conditional branch and resumes once
//! the branch resolves, so a null-predicted pipeline never mispredicts.

use super::BranchPredictor;

/// Predictor that declines to predict.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPredictor;

impl BranchPredictor for NullPredictor {
    fn predict(&self, _pc: u64) -> Option<bool> {
        None
    }

    fn update(&mut self, _pc: u64, _taken: bool) {}
}
