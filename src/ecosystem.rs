//! The consortium facade: a fixed interaction structure plus the runs made against it.
//!
//! Construction draws the structure once; `simulate` validates a scenario,
//! integrates the rate function and derives biomass and diversity from the
//! trajectory. Batches of scenarios run in parallel on Rayon.

use crate::dynamics::{ConsortiumRates, Scenario};
use crate::error::{EcosystemError, Result};
use crate::metrics::{shannon_diversity, total_biomass};
use crate::solver::{integrate, DenseSolution, SolverStats};
use crate::structure::InteractionStructure;
use consortium_common::{EcosystemConfig, ModelParams, RunSummary, SolverOptions};
use log::{debug, info, warn};
use ndarray::{aview1, Array1, Array2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Temperatures the consortium is characterised for (°C).
const DESIGN_TEMPERATURE_RANGE: (f64, f64) = (25.0, 35.0);
/// Meaningful treatment levels.
const DESIGN_INTERVENTION_RANGE: (f64, f64) = (0.0, 1.0);

/// Result of one `simulate` call. Owned entirely by the caller.
#[derive(Debug, Clone)]
pub struct SimulationRun {
    pub initial_population: Vec<f64>,
    pub scenario: Scenario,
    /// Accepted solver times in hours, from 0 to `duration_hours`.
    pub time: Vec<f64>,
    /// Species-major: `populations[[i, k]]` is species `i` at `time[k]`.
    pub populations: Array2<f64>,
    /// Sum over species at each entry of `time`.
    pub total_biomass: Vec<f64>,
    /// Shannon index of the final population vector.
    pub diversity: f64,
    /// Continuous solution over `[0, duration_hours]`.
    pub dense: DenseSolution,
    pub stats: SolverStats,
}

impl SimulationRun {
    /// Population vector at the last sample.
    pub fn final_population(&self) -> Vec<f64> {
        self.populations.column(self.populations.ncols() - 1).to_vec()
    }

    /// Population vector at an arbitrary time inside the run.
    pub fn population_at(&self, t: f64) -> Result<Array1<f64>> {
        self.dense.evaluate(t)
    }

    /// The plain-sequence subset handed to writers.
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            time: self.time.clone(),
            total_biomass: self.total_biomass.clone(),
            diversity: self.diversity,
        }
    }
}

/// One entry of a batch: an initial population and its scenario.
#[derive(Debug, Clone)]
pub struct ScenarioRequest {
    pub initial_population: Vec<f64>,
    pub scenario: Scenario,
}

impl ScenarioRequest {
    /// Every `temperature x intervention` pair for one initial population,
    /// temperature-major.
    pub fn grid(
        initial_population: &[f64],
        duration_hours: f64,
        temperatures_c: &[f64],
        intervention_levels: &[f64],
    ) -> Vec<Self> {
        temperatures_c
            .iter()
            .flat_map(|&t| {
                intervention_levels.iter().map(move |&i| ScenarioRequest {
                    initial_population: initial_population.to_vec(),
                    scenario: Scenario::new(duration_hours, t, i),
                })
            })
            .collect()
    }
}

/// A symbiotic consortium with a fixed interaction structure.
///
/// The structure is drawn once at construction and shared read-only by every
/// run, so repeated runs are directly comparable and may execute in parallel.
#[derive(Debug, Clone)]
pub struct MicrobialEcosystem {
    structure: InteractionStructure,
    params: ModelParams,
    solver: SolverOptions,
}

impl MicrobialEcosystem {
    /// Builds a consortium of `species_count` species with the reference model constants.
    pub fn new<R: Rng + ?Sized>(species_count: usize, rng: &mut R) -> Result<Self> {
        Self::with_params(species_count, ModelParams::default(), SolverOptions::default(), rng)
    }

    pub fn with_params<R: Rng + ?Sized>(
        species_count: usize,
        params: ModelParams,
        solver: SolverOptions,
        rng: &mut R,
    ) -> Result<Self> {
        let structure = InteractionStructure::generate(species_count, &params, rng)?;
        Self::from_structure(structure, params, solver)
    }

    /// Wraps an existing structure (for controlled experiments).
    pub fn from_structure(structure: InteractionStructure, params: ModelParams, solver: SolverOptions) -> Result<Self> {
        if !(params.carrying_capacity > 0.0) {
            return Err(EcosystemError::configuration("carrying_capacity must be positive"));
        }
        if !(params.thermal_width_c > 0.0) {
            return Err(EcosystemError::configuration("thermal_width_c must be positive"));
        }
        info!(
            "Consortium initialised: {} species, connectance {:.3}.",
            structure.species_count(),
            structure.connectance()
        );
        Ok(Self { structure, params, solver })
    }

    /// Builds the consortium described by a loaded configuration, seeding its own RNG.
    pub fn from_config(config: &EcosystemConfig) -> Result<Self> {
        let mut rng = StdRng::seed_from_u64(config.ecosystem.structure_seed);
        Self::with_params(
            config.ecosystem.species_count,
            config.get_model_params(),
            config.get_solver_options(),
            &mut rng,
        )
    }

    pub fn species_count(&self) -> usize {
        self.structure.species_count()
    }

    pub fn structure(&self) -> &InteractionStructure {
        &self.structure
    }

    pub fn params(&self) -> &ModelParams {
        &self.params
    }

    pub fn solver_options(&self) -> &SolverOptions {
        &self.solver
    }

    /// Integrates the consortium from `initial_population` over `duration_hours`.
    pub fn simulate(
        &self,
        initial_population: &[f64],
        duration_hours: f64,
        temperature: f64,
        intervention_level: f64,
    ) -> Result<SimulationRun> {
        self.simulate_scenario(initial_population, &Scenario::new(duration_hours, temperature, intervention_level))
    }

    pub fn simulate_scenario(&self, initial_population: &[f64], scenario: &Scenario) -> Result<SimulationRun> {
        self.validate(initial_population, scenario)?;

        let rates = ConsortiumRates::new(&self.structure, &self.params, scenario);
        debug!(
            "Simulating {:.2} h at {:.1} °C (thermal factor {:.4}), intervention {:.2}.",
            scenario.duration_hours,
            scenario.temperature_c,
            rates.thermal_factor(),
            scenario.intervention_level
        );

        let solution = integrate(&rates, 0.0, aview1(initial_population), scenario.duration_hours, &self.solver)?;

        // Solver output is sample-major; results are species-major.
        let diversity = shannon_diversity(solution.y.row(solution.y.nrows() - 1))?;
        let populations = solution.y.reversed_axes();
        let total_biomass = total_biomass(&populations);

        debug!(
            "Run finished: {} accepted / {} rejected steps, {} rate evaluations; diversity {:.3}.",
            solution.stats.accepted_steps,
            solution.stats.rejected_steps,
            solution.stats.rate_evaluations,
            diversity
        );

        Ok(SimulationRun {
            initial_population: initial_population.to_vec(),
            scenario: *scenario,
            time: solution.t,
            populations,
            total_biomass,
            diversity,
            dense: solution.dense,
            stats: solution.stats,
        })
    }

    /// Runs independent scenarios in parallel against the shared structure.
    /// Results come back in request order.
    pub fn simulate_batch(&self, requests: &[ScenarioRequest]) -> Vec<Result<SimulationRun>> {
        requests
            .par_iter()
            .map(|req| self.simulate_scenario(&req.initial_population, &req.scenario))
            .collect()
    }

    fn validate(&self, initial_population: &[f64], scenario: &Scenario) -> Result<()> {
        let n = self.species_count();
        if initial_population.len() != n {
            return Err(EcosystemError::input(format!(
                "initial population has {} entries, consortium has {} species",
                initial_population.len(),
                n
            )));
        }
        if let Some((i, v)) = initial_population
            .iter()
            .enumerate()
            .find(|(_, v)| !(v.is_finite() && **v >= 0.0))
        {
            return Err(EcosystemError::input(format!(
                "initial population of species {} is {}, expected a finite non-negative value",
                i, v
            )));
        }
        if !(scenario.duration_hours.is_finite() && scenario.duration_hours > 0.0) {
            return Err(EcosystemError::input(format!(
                "duration_hours must be positive, got {}",
                scenario.duration_hours
            )));
        }
        if !scenario.temperature_c.is_finite() || !scenario.intervention_level.is_finite() {
            return Err(EcosystemError::input("temperature and intervention level must be finite"));
        }

        let (t_lo, t_hi) = DESIGN_TEMPERATURE_RANGE;
        if scenario.temperature_c < t_lo || scenario.temperature_c > t_hi {
            warn!(
                "Temperature {:.1} °C is outside the characterised range {}-{} °C.",
                scenario.temperature_c, t_lo, t_hi
            );
        }
        let (i_lo, i_hi) = DESIGN_INTERVENTION_RANGE;
        if scenario.intervention_level < i_lo || scenario.intervention_level > i_hi {
            warn!(
                "Intervention level {:.2} is outside the meaningful range {}-{}.",
                scenario.intervention_level, i_lo, i_hi
            );
        }
        Ok(())
    }
}
