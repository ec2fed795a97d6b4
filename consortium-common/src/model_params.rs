use serde::{Deserialize, Serialize};

/// Numeric constants of the consortium model, derived from the configuration.
/// `Default` yields the reference consortium values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParams {
    // Interaction structure
    pub self_competition: f64, // Diagonal of the interaction matrix (negative)
    pub symbiosis_probability: f64, // Chance that an ordered pair interacts
    pub symbiosis_min: f64,
    pub symbiosis_max: f64,
    pub growth_rate_min: f64,
    pub growth_rate_max: f64,

    // Dynamics
    pub carrying_capacity: f64, // Per-species logistic cap
    pub optimal_temperature_c: f64, // Peak of the thermal response
    pub thermal_width_c: f64, // Gaussian width of the thermal response
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams {
            self_competition: -0.05,
            symbiosis_probability: 0.3,
            symbiosis_min: 0.01,
            symbiosis_max: 0.1,
            growth_rate_min: 0.1,
            growth_rate_max: 0.8,
            carrying_capacity: 1000.0,
            optimal_temperature_c: 30.0,
            thermal_width_c: 15.0,
        }
    }
}

/// Tolerances and limits for the adaptive integrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverOptions {
    pub rtol: f64,
    pub atol: f64,
    /// Optional cap on attempted steps (accepted + rejected) per run.
    /// `None` integrates until the end of the interval, however long it takes.
    pub max_steps: Option<usize>,
    /// Fixed first step; `None` selects one automatically.
    pub first_step: Option<f64>,
}

impl Default for SolverOptions {
    fn default() -> Self {
        SolverOptions {
            rtol: 1e-3,
            atol: 1e-6,
            max_steps: None,
            first_step: None,
        }
    }
}
