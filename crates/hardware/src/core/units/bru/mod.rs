//! Branch prediction unit (BRU) implementations.
//!
//! This module contains the closed set of direction predictors the core can be
//! configured with: `Null` (no speculation) and `Local` (per-branch history).

pub use self::branch_predictor::BranchPredictor;

/// Branch predictor trait.
pub mod branch_predictor;

/// Local history two-level predictor.
pub mod local;

/// Predictor that never speculates.
pub mod null_bp;

use self::{local::LocalPredictor, null_bp::NullPredictor};
use crate::config::{BranchPredictor as BpType, CoreConfig};

/// Enum wrapper for static dispatch of branch predictors.
#[derive(Clone, Debug)]
pub enum BranchPredictorWrapper {
    /// No speculation.
    Null(NullPredictor),
    /// Local history predictor.
    Local(LocalPredictor),
}

impl BranchPredictorWrapper {
    /// Creates the predictor selected by the core configuration.
    pub fn new(config: &CoreConfig) -> Self {
        match config.branch_predictor {
            BpType::Null => Self::Null(NullPredictor),
            BpType::Local => Self::Local(LocalPredictor::new(
                config.local_history_entries,
                config.local_history_bits,
            )),
        }
    }
}

impl BranchPredictor for BranchPredictorWrapper {
    #[inline]
    fn predict(&self, pc: u64) -> Option<bool> {
        match self {
            Self::Null(bp) => bp.predict(pc),
            Self::Local(bp) => bp.predict(pc),
        }
    }

    #[inline]
    fn update(&mut self, pc: u64, taken: bool) {
        match self {
            Self::Null(bp) => bp.update(pc, taken),
            Self::Local(bp) => bp.update(pc, taken),
        }
    }
}
