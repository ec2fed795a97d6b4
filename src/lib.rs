//! Population dynamics of a symbiotic microbial consortium.
//!
//! A [`MicrobialEcosystem`] draws its species interaction structure once and
//! then integrates an extended Lotka-Volterra system (logistic growth plus
//! treatment-scaled symbiosis, modulated by a thermal response) for any number
//! of scenarios against that fixed structure.

pub mod dynamics;
pub mod ecosystem;
pub mod error;
pub mod metrics;
pub mod output;
pub mod solver;
pub mod structure;

pub use dynamics::{temperature_factor, thermal_response, ConsortiumRates, OdeSystem, Scenario};
pub use ecosystem::{MicrobialEcosystem, ScenarioRequest, SimulationRun};
pub use error::{EcosystemError, Result};
pub use metrics::{shannon_diversity, total_biomass};
pub use solver::{integrate, DenseSolution, Solution, SolverStats};
pub use structure::InteractionStructure;
