use std::collections::HashMap;

use mockall::mock;
use pipesim_core::common::LoadError;
use pipesim_core::isa::{Program, Workload, WorkloadLoader};

mock! {
    /// Loader with scripted results.
    pub Loader {}
    impl WorkloadLoader for Loader {
        fn load(&self, workload: &Workload) -> Result<Program, LoadError>;
    }
}

/// Loader that serves programs by workload path.
#[derive(Debug, Default)]
pub struct MapLoader {
    programs: HashMap<String, Program>,
}

impl MapLoader {
    /// An empty loader; every path fails to load.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serves `program` for `path`.
    pub fn with(mut self, path: &str, program: Program) -> Self {
        let _ = self.programs.insert(path.to_string(), program);
        self
    }
}

impl WorkloadLoader for MapLoader {
    fn load(&self, workload: &Workload) -> Result<Program, LoadError> {
        self.programs
            .get(&workload.path)
            .cloned()
            .ok_or_else(|| LoadError::Unreadable {
                path: workload.path.clone(),
                reason: "no such program".into(),
            })
    }
}
