use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::model_params::{ModelParams, SolverOptions};
use std::path::Path;

// Size of the consortium and the seed of its interaction structure
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EcosystemSection {
    pub species_count: usize,
    pub structure_seed: u64,
}

// How the interaction matrix and growth rates are drawn
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct StructureConfig {
    #[serde(default = "default_self_competition")]
    pub self_competition: f64,
    #[serde(default = "default_symbiosis_probability")]
    pub symbiosis_probability: f64,
    #[serde(default = "default_symbiosis_min")]
    pub symbiosis_min: f64,
    #[serde(default = "default_symbiosis_max")]
    pub symbiosis_max: f64,
    #[serde(default = "default_growth_rate_min")]
    pub growth_rate_min: f64,
    #[serde(default = "default_growth_rate_max")]
    pub growth_rate_max: f64,
}

// Constants of the rate function
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct DynamicsConfig {
    #[serde(default = "default_carrying_capacity")]
    pub carrying_capacity: f64,
    #[serde(default = "default_optimal_temperature")]
    pub optimal_temperature_c: f64,
    #[serde(default = "default_thermal_width")]
    pub thermal_width_c: f64,
}

// A single run
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ScenarioConfig {
    pub duration_hours: f64,
    pub temperature_c: f64,
    pub intervention_level: f64,
}

// Initial population is drawn uniformly from [population_min, population_max)
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    pub population_min: f64,
    pub population_max: f64,
    pub seed: u64,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SolverConfig {
    #[serde(default = "default_rtol")]
    pub rtol: f64,
    #[serde(default = "default_atol")]
    pub atol: f64,
    #[serde(default)]
    pub max_steps: Option<usize>, // Unlimited when absent
    #[serde(default)]
    pub first_step: Option<f64>,
}

// Grid of scenarios run in parallel with --sweep
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SweepConfig {
    #[serde(default)]
    pub temperatures_c: Vec<f64>,
    #[serde(default)]
    pub intervention_levels: Vec<f64>,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_summary: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    #[serde(default)]
    pub save_trajectory: bool, // Per-species CSV of every accepted step
}

// Main configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct EcosystemConfig {
    pub ecosystem: EcosystemSection,
    #[serde(default)]
    pub structure: StructureConfig,
    #[serde(default)]
    pub dynamics: DynamicsConfig,
    pub scenario: ScenarioConfig,
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub solver: SolverConfig,
    #[serde(default)]
    pub sweep: SweepConfig,
    pub output: OutputConfig,
}

impl Default for StructureConfig {
    fn default() -> Self {
        StructureConfig {
            self_competition: default_self_competition(),
            symbiosis_probability: default_symbiosis_probability(),
            symbiosis_min: default_symbiosis_min(),
            symbiosis_max: default_symbiosis_max(),
            growth_rate_min: default_growth_rate_min(),
            growth_rate_max: default_growth_rate_max(),
        }
    }
}

impl Default for DynamicsConfig {
    fn default() -> Self {
        DynamicsConfig {
            carrying_capacity: default_carrying_capacity(),
            optimal_temperature_c: default_optimal_temperature(),
            thermal_width_c: default_thermal_width(),
        }
    }
}

impl Default for SolverConfig {
    fn default() -> Self {
        SolverConfig {
            rtol: default_rtol(),
            atol: default_atol(),
            max_steps: None,
            first_step: None,
        }
    }
}

impl EcosystemConfig {
    /// Loads the configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration held in memory.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: EcosystemConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ecosystem.species_count == 0 {
            anyhow::bail!("species_count must be greater than 0.");
        }

        let s = &self.structure;
        if !(s.self_competition < 0.0) {
            anyhow::bail!("self_competition must be negative.");
        }
        if !(0.0..=1.0).contains(&s.symbiosis_probability) {
            anyhow::bail!("symbiosis_probability must lie in [0, 1].");
        }
        if !(s.symbiosis_min > 0.0 && s.symbiosis_min < s.symbiosis_max) {
            anyhow::bail!("symbiosis range must satisfy 0 < symbiosis_min < symbiosis_max.");
        }
        if !(s.growth_rate_min > 0.0 && s.growth_rate_min < s.growth_rate_max) {
            anyhow::bail!("growth rate range must satisfy 0 < growth_rate_min < growth_rate_max.");
        }

        let d = &self.dynamics;
        if !(d.carrying_capacity > 0.0) {
            anyhow::bail!("carrying_capacity must be positive.");
        }
        if !(d.thermal_width_c > 0.0) {
            anyhow::bail!("thermal_width_c must be positive.");
        }

        if !(self.scenario.duration_hours > 0.0) {
            anyhow::bail!("duration_hours must be positive.");
        }

        let ic = &self.initial_conditions;
        if !(ic.population_min >= 0.0 && ic.population_min < ic.population_max) {
            anyhow::bail!("initial population range must satisfy 0 <= population_min < population_max.");
        }

        if !(self.solver.rtol > 0.0 && self.solver.atol > 0.0) {
            anyhow::bail!("solver tolerances must be positive.");
        }
        if self.solver.max_steps == Some(0) {
            anyhow::bail!("max_steps must be greater than 0 when set.");
        }
        if let Some(h) = self.solver.first_step {
            if !(h > 0.0) {
                anyhow::bail!("first_step must be positive when set.");
            }
        }
        Ok(())
    }

    /// Converts the configuration into the model constants used at runtime.
    pub fn get_model_params(&self) -> ModelParams {
        ModelParams {
            self_competition: self.structure.self_competition,
            symbiosis_probability: self.structure.symbiosis_probability,
            symbiosis_min: self.structure.symbiosis_min,
            symbiosis_max: self.structure.symbiosis_max,
            growth_rate_min: self.structure.growth_rate_min,
            growth_rate_max: self.structure.growth_rate_max,
            carrying_capacity: self.dynamics.carrying_capacity,
            optimal_temperature_c: self.dynamics.optimal_temperature_c,
            thermal_width_c: self.dynamics.thermal_width_c,
        }
    }

    pub fn get_solver_options(&self) -> SolverOptions {
        SolverOptions {
            rtol: self.solver.rtol,
            atol: self.solver.atol,
            max_steps: self.solver.max_steps,
            first_step: self.solver.first_step,
        }
    }
}

// Defaults reproduce the reference consortium
fn default_self_competition() -> f64 {
    -0.05
}

fn default_symbiosis_probability() -> f64 {
    0.3
}

fn default_symbiosis_min() -> f64 {
    0.01
}

fn default_symbiosis_max() -> f64 {
    0.1
}

fn default_growth_rate_min() -> f64 {
    0.1
}

fn default_growth_rate_max() -> f64 {
    0.8
}

fn default_carrying_capacity() -> f64 {
    1000.0
}

fn default_optimal_temperature() -> f64 {
    30.0
}

fn default_thermal_width() -> f64 {
    15.0
}

fn default_rtol() -> f64 {
    1e-3
}

fn default_atol() -> f64 {
    1e-6
}
