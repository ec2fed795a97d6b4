use serde::{Serialize, Deserialize};

/// The plain-sequence view of one simulation run, as handed to writers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)] // Derive traits for easy saving/loading
pub struct RunSummary {
    /// Accepted solver times in hours, starting at 0.
    pub time: Vec<f64>,
    /// Sum over species of the population vector at each entry of `time`.
    pub total_biomass: Vec<f64>,
    /// Shannon diversity index of the final population vector.
    pub diversity: f64,
}

impl RunSummary {
    pub fn initial_biomass(&self) -> Option<f64> {
        self.total_biomass.first().copied()
    }

    pub fn final_biomass(&self) -> Option<f64> {
        self.total_biomass.last().copied()
    }

    /// Relative biomass change over the run (0.25 means +25%).
    /// `None` when the run is empty or started from zero biomass.
    pub fn biomass_increase(&self) -> Option<f64> {
        let start = self.initial_biomass()?;
        let end = self.final_biomass()?;
        if start > 0.0 { Some(end / start - 1.0) } else { None }
    }
}

/// One row of a scenario sweep.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SweepRecord {
    pub temperature_c: f64,
    pub intervention_level: f64,
    pub final_biomass: f64,
    pub diversity: f64,
    pub error: Option<String>, // Empty column for successful runs
}
