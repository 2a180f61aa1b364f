/// Mock workload loader.
pub mod loader;
