//! Memory controller implementations for latency modeling.
//!
//! This module provides:
//! 1. **SimpleController:** Fixed latency per access (no row-buffer modeling).
//! 2. **DramController:** Row-buffer-aware latency (CAS, RAS, precharge) for DRAM-style timing.

use crate::config::{MemoryConfig, MemoryController as ControllerKind};

/// Reports the latency of one channel access in cycles.
pub trait MemoryController: std::fmt::Debug {
    /// Returns the number of cycles required for an access to the given address.
    ///
    /// # Arguments
    ///
    /// * `addr` - Physical address being accessed (may be used for row-buffer modeling).
    ///
    /// # Returns
    ///
    /// Latency in simulation cycles.
    fn access_latency(&mut self, addr: u64) -> u64;
}

/// Builds the controller selected by the configuration.
pub fn from_config(config: &MemoryConfig) -> Box<dyn MemoryController> {
    match config.controller {
        ControllerKind::Simple => Box::new(SimpleController::new(config.latency)),
        ControllerKind::Dram => {
            Box::new(DramController::new(config.t_cas, config.t_ras, config.t_pre))
        }
    }
}

/// Fixed-latency memory controller; every access takes the same number of cycles.
#[derive(Debug)]
pub struct SimpleController {
    latency: u64,
}

impl SimpleController {
    /// Creates a simple controller with the given fixed latency in cycles.
    pub const fn new(latency: u64) -> Self {
        Self { latency }
    }
}

impl MemoryController for SimpleController {
    fn access_latency(&mut self, _addr: u64) -> u64 {
        self.latency
    }
}

/// Bytes per DRAM row (2 KiB, matching an x8 DDR3 device page).
const ROW_BYTES: u64 = 2048;

/// DRAM-style controller with one open row.
#[derive(Debug)]
pub struct DramController {
    open_row: Option<u64>,
    t_cas: u64,
    t_ras: u64,
    t_pre: u64,
}

impl DramController {
    /// Creates a DRAM controller with the given timing parameters (in cycles).
    ///
    /// # Arguments
    ///
    /// * `t_cas` - Column access strobe latency.
    /// * `t_ras` - Row access strobe latency.
    /// * `t_pre` - Precharge latency.
    pub const fn new(t_cas: u64, t_ras: u64, t_pre: u64) -> Self {
        Self {
            open_row: None,
            t_cas,
            t_ras,
            t_pre,
        }
    }
}

impl MemoryController for DramController {
    fn access_latency(&mut self, addr: u64) -> u64 {
        let row = addr / ROW_BYTES;
        match self.open_row.replace(row) {
            Some(open) if open == row => self.t_cas,
            Some(_) => self.t_pre + self.t_ras + self.t_cas,
            None => self.t_ras + self.t_cas,
        }
    }
}
