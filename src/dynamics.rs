//! The instantaneous rate of change of the consortium.

use crate::structure::InteractionStructure;
use consortium_common::ModelParams;
use ndarray::{ArrayView1, ArrayViewMut1, Zip};

/// A first-order system `dy/dt = f(t, y)`.
///
/// Implementors must be pure: the same `(t, y)` always writes the same `dydt`.
pub trait OdeSystem {
    /// Dimension of the state vector.
    fn dim(&self) -> usize;

    /// Writes `f(t, y)` into `dydt`. Both views have length `dim()`.
    fn rate(&self, t: f64, y: ArrayView1<f64>, dydt: ArrayViewMut1<f64>);
}

/// Scenario scalars of one run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Scenario {
    pub duration_hours: f64,
    pub temperature_c: f64,
    pub intervention_level: f64,
}

impl Scenario {
    pub fn new(duration_hours: f64, temperature_c: f64, intervention_level: f64) -> Self {
        Self { duration_hours, temperature_c, intervention_level }
    }
}

/// Gaussian thermal response `exp(-((T - T_opt) / width)^2)`.
#[inline]
pub fn thermal_response(temperature_c: f64, optimal_c: f64, width_c: f64) -> f64 {
    let z = (temperature_c - optimal_c) / width_c;
    (-(z * z)).exp()
}

/// Thermal response of the reference consortium (peak at 30 °C, width 15 °C).
/// Exactly 1.0 at 30 °C.
pub fn temperature_factor(temperature_c: f64) -> f64 {
    let p = ModelParams::default();
    thermal_response(temperature_c, p.optimal_temperature_c, p.thermal_width_c)
}

/// Extended Lotka-Volterra rates for one scenario:
/// `(r_i y_i (1 - y_i/K) + intervention * (A y)_i) * thermal(T)`.
///
/// Borrows the structure; the thermal factor is computed once per run.
#[derive(Debug, Clone)]
pub struct ConsortiumRates<'a> {
    structure: &'a InteractionStructure,
    carrying_capacity: f64,
    intervention_level: f64,
    thermal_factor: f64,
}

impl<'a> ConsortiumRates<'a> {
    pub fn new(structure: &'a InteractionStructure, params: &ModelParams, scenario: &Scenario) -> Self {
        Self {
            structure,
            carrying_capacity: params.carrying_capacity,
            intervention_level: scenario.intervention_level,
            thermal_factor: thermal_response(
                scenario.temperature_c,
                params.optimal_temperature_c,
                params.thermal_width_c,
            ),
        }
    }

    pub fn thermal_factor(&self) -> f64 {
        self.thermal_factor
    }
}

impl OdeSystem for ConsortiumRates<'_> {
    fn dim(&self) -> usize {
        self.structure.species_count()
    }

    fn rate(&self, _t: f64, y: ArrayView1<f64>, dydt: ArrayViewMut1<f64>) {
        let interaction = self.structure.interaction_matrix().dot(&y);
        let k = self.carrying_capacity;
        Zip::from(dydt)
            .and(&y)
            .and(self.structure.growth_rates())
            .and(&interaction)
            .for_each(|d, &yi, &r, &ai| {
                let growth = r * yi * (1.0 - yi / k);
                *d = (growth + ai * self.intervention_level) * self.thermal_factor;
            });
    }
}
