pub mod config;
pub mod model_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{EcosystemConfig, EcosystemSection, StructureConfig, DynamicsConfig, ScenarioConfig, InitialConditions, SolverConfig, SweepConfig, OutputConfig};
pub use model_params::{ModelParams, SolverOptions};
pub use snapshot::{RunSummary, SweepRecord};
