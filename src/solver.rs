//! Adaptive Dormand-Prince 5(4) integrator with a continuous extension.
//!
//! Step control follows the classic RK45 recipe: the embedded fourth-order
//! solution estimates the local error, the RMS norm of the error scaled by
//! `atol + max(|y_old|, |y_new|) * rtol` decides acceptance, and the next step
//! is scaled by `0.9 * err^(-1/5)` clamped to `[0.2, 10]` (no growth right
//! after a rejection). Every accepted step keeps the coefficients of the
//! quartic Dormand-Prince interpolant so the solution can be evaluated
//! anywhere in the integrated interval.

use crate::dynamics::OdeSystem;
use crate::error::{EcosystemError, Result};
use consortium_common::SolverOptions;
use log::trace;
use ndarray::{arr1, aview1, aview2, s, Array1, Array2, ArrayView1, ArrayViewMut1, Zip};

const N_STAGES: usize = 6;
const ERROR_ESTIMATOR_ORDER: f64 = 4.0;
const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

const C: [f64; N_STAGES] = [0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0];

const A: [[f64; 5]; N_STAGES] = [
    [0.0, 0.0, 0.0, 0.0, 0.0],
    [1.0 / 5.0, 0.0, 0.0, 0.0, 0.0],
    [3.0 / 40.0, 9.0 / 40.0, 0.0, 0.0, 0.0],
    [44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0, 0.0, 0.0],
    [19372.0 / 6561.0, -25360.0 / 2187.0, 64448.0 / 6561.0, -212.0 / 729.0, 0.0],
    [9017.0 / 3168.0, -355.0 / 33.0, 46732.0 / 5247.0, 49.0 / 176.0, -5103.0 / 18656.0],
];

const B: [f64; N_STAGES] = [35.0 / 384.0, 0.0, 500.0 / 1113.0, 125.0 / 192.0, -2187.0 / 6784.0, 11.0 / 84.0];

// Difference between the fifth- and fourth-order weights, including the FSAL stage.
const E: [f64; N_STAGES + 1] = [
    -71.0 / 57600.0,
    0.0,
    71.0 / 16695.0,
    -71.0 / 1920.0,
    17253.0 / 339200.0,
    -22.0 / 525.0,
    1.0 / 40.0,
];

// Dense output: y(t_old + x h) = y_old + h * sum_s K_s * (P_s . [x, x^2, x^3, x^4])
const P: [[f64; 4]; N_STAGES + 1] = [
    [1.0, -8048581381.0 / 2820520608.0, 8663915743.0 / 2820520608.0, -12715105075.0 / 11282082432.0],
    [0.0, 0.0, 0.0, 0.0],
    [0.0, 131558114200.0 / 32700410799.0, -68118460800.0 / 10900136933.0, 87487479700.0 / 32700410799.0],
    [0.0, -1754552775.0 / 470086768.0, 14199869525.0 / 1410260304.0, -10690763975.0 / 1880347072.0],
    [0.0, 127303824393.0 / 49829197408.0, -318862633887.0 / 49829197408.0, 701980252875.0 / 199316789632.0],
    [0.0, -282668133.0 / 205662961.0, 2019193451.0 / 616988883.0, -1453857185.0 / 822651844.0],
    [0.0, 40617522.0 / 29380423.0, -110615467.0 / 29380423.0, 69997945.0 / 29380423.0],
];

/// Counters describing how hard the integrator worked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SolverStats {
    pub accepted_steps: usize,
    pub rejected_steps: usize,
    pub rate_evaluations: usize,
}

// One accepted step of the continuous extension.
#[derive(Debug, Clone)]
struct DenseSegment {
    t_old: f64,
    h: f64,
    y_old: Array1<f64>,
    q: Array2<f64>, // K^T P, one row of polynomial coefficients per component
}

impl DenseSegment {
    fn evaluate(&self, t: f64) -> Array1<f64> {
        let x = (t - self.t_old) / self.h;
        let powers = arr1(&[x, x * x, x * x * x, x * x * x * x]);
        &self.y_old + &(self.q.dot(&powers) * self.h)
    }
}

/// Piecewise quartic interpolant over all accepted steps.
#[derive(Debug, Clone)]
pub struct DenseSolution {
    knots: Vec<f64>, // Step boundaries, length = segments + 1
    segments: Vec<DenseSegment>,
}

impl DenseSolution {
    /// The interval `[t0, t_end]` the interpolant covers.
    pub fn span(&self) -> (f64, f64) {
        (self.knots[0], self.knots[self.knots.len() - 1])
    }

    /// State at time `t`. Fails with `InvalidInput` outside the integrated interval.
    pub fn evaluate(&self, t: f64) -> Result<Array1<f64>> {
        let (t0, t_end) = self.span();
        if !(t >= t0 && t <= t_end) {
            return Err(EcosystemError::input(format!(
                "t = {} lies outside the integrated interval [{}, {}]",
                t, t0, t_end
            )));
        }
        let idx = self
            .knots
            .partition_point(|&k| k < t)
            .saturating_sub(1)
            .min(self.segments.len() - 1);
        Ok(self.segments[idx].evaluate(t))
    }

    /// Evaluates at every time in `times`, returning a `dim x times.len()` table.
    pub fn sample(&self, times: &[f64]) -> Result<Array2<f64>> {
        let dim = self.segments[0].y_old.len();
        let mut table = Array2::zeros((dim, times.len()));
        for (k, &t) in times.iter().enumerate() {
            table.column_mut(k).assign(&self.evaluate(t)?);
        }
        Ok(table)
    }
}

/// Output of one integration.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Accepted times, `t[0] == t0` and the last entry equals `t_bound` exactly.
    pub t: Vec<f64>,
    /// State at each accepted time, one row per entry of `t`.
    pub y: Array2<f64>,
    pub dense: DenseSolution,
    pub stats: SolverStats,
}

fn rms_norm(v: &Array1<f64>) -> f64 {
    if v.is_empty() {
        return 0.0;
    }
    (v.dot(v) / v.len() as f64).sqrt()
}

// Evaluates the system into `out` and rejects non-finite rates.
fn eval<S: OdeSystem + ?Sized>(
    system: &S,
    nfev: &mut usize,
    t: f64,
    y: ArrayView1<f64>,
    mut out: ArrayViewMut1<f64>,
) -> Result<()> {
    system.rate(t, y, out.view_mut());
    *nfev += 1;
    if let Some(i) = out.iter().position(|v| !v.is_finite()) {
        return Err(EcosystemError::integration(format!(
            "rate of component {} is not finite at t = {}",
            i, t
        )));
    }
    Ok(())
}

// Stage derivatives and counters of a single integration call.
struct Workspace<'s, S: OdeSystem + ?Sized> {
    system: &'s S,
    k: Array2<f64>, // (N_STAGES + 1) x dim, last row is the FSAL stage
    nfev: usize,
}

impl<'s, S: OdeSystem + ?Sized> Workspace<'s, S> {
    fn new(system: &'s S) -> Self {
        Self { system, k: Array2::zeros((N_STAGES + 1, system.dim())), nfev: 0 }
    }

    // One Dormand-Prince step from (t, y) with f = f(t, y). Fills `k`, returns y_new.
    fn rk_step(&mut self, t: f64, y: &Array1<f64>, f: &Array1<f64>, h: f64) -> Result<Array1<f64>> {
        self.k.row_mut(0).assign(f);
        for i in 1..N_STAGES {
            let dy = self.k.slice(s![..i, ..]).t().dot(&aview1(&A[i][..i])) * h;
            let stage = y + &dy;
            eval(self.system, &mut self.nfev, t + C[i] * h, stage.view(), self.k.row_mut(i))?;
        }

        let y_new = y + &(self.k.slice(s![..N_STAGES, ..]).t().dot(&aview1(&B)) * h);
        if let Some(i) = y_new.iter().position(|v| !v.is_finite()) {
            return Err(EcosystemError::integration(format!(
                "state component {} is not finite at t = {}",
                i,
                t + h
            )));
        }
        eval(self.system, &mut self.nfev, t + h, y_new.view(), self.k.row_mut(N_STAGES))?;
        Ok(y_new)
    }

    fn error_norm(&self, h: f64, y: &Array1<f64>, y_new: &Array1<f64>, rtol: f64, atol: f64) -> f64 {
        let error = self.k.t().dot(&aview1(&E)) * h;
        let scaled = Zip::from(&error)
            .and(y)
            .and(y_new)
            .map_collect(|&e, &a, &b| e / (atol + a.abs().max(b.abs()) * rtol));
        rms_norm(&scaled)
    }

    fn dense_segment(&self, t_old: f64, h: f64, y_old: &Array1<f64>) -> DenseSegment {
        DenseSegment { t_old, h, y_old: y_old.clone(), q: self.k.t().dot(&aview2(&P)) }
    }
}

// Smallest representable distance above `t`.
fn spacing_above(t: f64) -> f64 {
    if t == 0.0 {
        return f64::from_bits(1);
    }
    let next = if t > 0.0 { f64::from_bits(t.to_bits() + 1) } else { f64::from_bits(t.to_bits() - 1) };
    next - t
}

// Hairer/Norsett/Wanner initial step heuristic.
fn select_initial_step<S: OdeSystem + ?Sized>(
    ws: &mut Workspace<'_, S>,
    t0: f64,
    y0: &Array1<f64>,
    f0: &Array1<f64>,
    interval: f64,
    rtol: f64,
    atol: f64,
) -> Result<f64> {
    let scale = y0.mapv(|v| atol + v.abs() * rtol);
    let d0 = rms_norm(&(y0 / &scale));
    let d1 = rms_norm(&(f0 / &scale));
    let h0 = if d0 < 1e-5 || d1 < 1e-5 { 1e-6 } else { 0.01 * d0 / d1 };
    let h0 = h0.min(interval);

    let y1 = y0 + &(f0 * h0);
    let mut f1 = Array1::<f64>::zeros(y0.len());
    eval(ws.system, &mut ws.nfev, t0 + h0, y1.view(), f1.view_mut())?;
    let d2 = rms_norm(&((&f1 - f0) / &scale)) / h0;

    let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
        (h0 * 1e-3).max(1e-6)
    } else {
        (0.01 / d1.max(d2)).powf(1.0 / (ERROR_ESTIMATOR_ORDER + 1.0))
    };
    Ok((100.0 * h0).min(h1).min(interval))
}

/// Integrates `system` from `(t0, y0)` forward to `t_bound`.
///
/// The integrator is reentrant: all state lives in buffers owned by this call,
/// so one system may be integrated from several threads at once. Without a
/// `max_steps` budget it runs until `t_bound` is reached.
pub fn integrate<S: OdeSystem + ?Sized>(
    system: &S,
    t0: f64,
    y0: ArrayView1<f64>,
    t_bound: f64,
    options: &SolverOptions,
) -> Result<Solution> {
    let n = system.dim();
    if y0.len() != n {
        return Err(EcosystemError::input(format!("initial state has {} entries, system has {}", y0.len(), n)));
    }
    if !(t_bound > t0) {
        return Err(EcosystemError::input(format!("t_bound ({}) must be greater than t0 ({})", t_bound, t0)));
    }
    if !(options.rtol > 0.0 && options.atol > 0.0) {
        return Err(EcosystemError::configuration("solver tolerances must be positive"));
    }
    let (rtol, atol) = (options.rtol, options.atol);
    let error_exponent = -1.0 / (ERROR_ESTIMATOR_ORDER + 1.0);

    let mut ws = Workspace::new(system);
    let mut t = t0;
    let mut y = y0.to_owned();
    let mut f = Array1::<f64>::zeros(n);
    eval(ws.system, &mut ws.nfev, t, y.view(), f.view_mut())?;

    let mut h_abs = match options.first_step {
        Some(h) if h > 0.0 => h.min(t_bound - t0),
        Some(h) => return Err(EcosystemError::configuration(format!("first_step must be positive, got {}", h))),
        None => select_initial_step(&mut ws, t0, &y, &f, t_bound - t0, rtol, atol)?,
    };

    let mut times = vec![t0];
    let mut states = vec![y.clone()];
    let mut knots = vec![t0];
    let mut segments = Vec::new();
    let mut stats = SolverStats::default();

    while t < t_bound {
        let min_step = 10.0 * spacing_above(t);
        if h_abs < min_step {
            h_abs = min_step;
        }

        let mut step_rejected = false;
        let (t_new, h, y_new) = loop {
            if let Some(budget) = options.max_steps {
                if stats.accepted_steps + stats.rejected_steps >= budget {
                    return Err(EcosystemError::integration(format!(
                        "step budget of {} exhausted at t = {}",
                        budget, t
                    )));
                }
            }
            if h_abs < min_step {
                return Err(EcosystemError::integration(format!(
                    "required step size is less than spacing between numbers at t = {}",
                    t
                )));
            }

            let t_new = if t + h_abs > t_bound { t_bound } else { t + h_abs };
            let h = t_new - t;
            h_abs = h.abs();

            let y_new = ws.rk_step(t, &y, &f, h)?;
            let error_norm = ws.error_norm(h, &y, &y_new, rtol, atol);

            if error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    MAX_FACTOR.min(SAFETY * error_norm.powf(error_exponent))
                };
                if step_rejected {
                    factor = factor.min(1.0);
                }
                h_abs *= factor;
                break (t_new, h, y_new);
            }

            trace!("Rejected step h = {:.3e} at t = {:.4} (error norm {:.3})", h, t, error_norm);
            h_abs *= MIN_FACTOR.max(SAFETY * error_norm.powf(error_exponent));
            step_rejected = true;
            stats.rejected_steps += 1;
        };

        segments.push(ws.dense_segment(t, h, &y));
        knots.push(t_new);
        stats.accepted_steps += 1;

        t = t_new;
        y = y_new;
        f.assign(&ws.k.row(N_STAGES));
        times.push(t);
        states.push(y.clone());
    }

    stats.rate_evaluations = ws.nfev;
    let y = Array2::from_shape_fn((states.len(), n), |(k, i)| states[k][i]);
    Ok(Solution { t: times, y, dense: DenseSolution { knots, segments }, stats })
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Decay;

    impl OdeSystem for Decay {
        fn dim(&self) -> usize {
            1
        }
        fn rate(&self, _t: f64, y: ArrayView1<f64>, mut dydt: ArrayViewMut1<f64>) {
            dydt[0] = -y[0];
        }
    }

    // y'' = -y as a first-order pair
    struct Oscillator;

    impl OdeSystem for Oscillator {
        fn dim(&self) -> usize {
            2
        }
        fn rate(&self, _t: f64, y: ArrayView1<f64>, mut dydt: ArrayViewMut1<f64>) {
            dydt[0] = y[1];
            dydt[1] = -y[0];
        }
    }

    struct Poisoned;

    impl OdeSystem for Poisoned {
        fn dim(&self) -> usize {
            1
        }
        fn rate(&self, t: f64, _y: ArrayView1<f64>, mut dydt: ArrayViewMut1<f64>) {
            dydt[0] = if t > 0.5 { f64::NAN } else { 1.0 };
        }
    }

    fn last_state(sol: &Solution) -> ArrayView1<'_, f64> {
        sol.y.row(sol.y.nrows() - 1)
    }

    #[test]
    fn exponential_decay_matches_closed_form() {
        let sol = integrate(&Decay, 0.0, aview1(&[1.0]), 5.0, &SolverOptions::default()).unwrap();
        assert_eq!(*sol.t.last().unwrap(), 5.0);
        assert_eq!(sol.t.len(), sol.y.nrows());
        for (t, y) in sol.t.iter().zip(sol.y.rows()) {
            assert!((y[0] - (-t).exp()).abs() < 1e-3, "t={} y={}", t, y[0]);
        }
        assert!(sol.t.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn tighter_tolerance_is_more_accurate() {
        let start = aview1(&[0.0, 1.0]);
        let loose = integrate(&Oscillator, 0.0, start, 10.0, &SolverOptions::default()).unwrap();
        let tight_opts = SolverOptions { rtol: 1e-9, atol: 1e-12, ..SolverOptions::default() };
        let tight = integrate(&Oscillator, 0.0, start, 10.0, &tight_opts).unwrap();
        let exact = 10.0f64.sin();
        let loose_err = (last_state(&loose)[0] - exact).abs();
        let tight_err = (last_state(&tight)[0] - exact).abs();
        assert!(tight_err < 1e-7);
        assert!(tight_err < loose_err);
        assert!(tight.stats.accepted_steps > loose.stats.accepted_steps);
    }

    #[test]
    fn dense_output_reproduces_knots_and_interpolates() {
        let opts = SolverOptions { rtol: 1e-8, atol: 1e-10, ..SolverOptions::default() };
        let sol = integrate(&Decay, 0.0, aview1(&[1.0]), 3.0, &opts).unwrap();
        for (t, y) in sol.t.iter().zip(sol.y.rows()) {
            let v = sol.dense.evaluate(*t).unwrap();
            assert!((v[0] - y[0]).abs() < 1e-9);
        }
        for i in 0..=30 {
            let t = i as f64 * 0.1;
            let v = sol.dense.evaluate(t).unwrap();
            assert!((v[0] - (-t).exp()).abs() < 1e-6, "t={} v={}", t, v[0]);
        }
        assert!(sol.dense.evaluate(3.5).is_err());
        assert!(sol.dense.evaluate(-0.1).is_err());
    }

    #[test]
    fn sample_returns_component_major_table() {
        let sol = integrate(&Oscillator, 0.0, aview1(&[0.0, 1.0]), 1.0, &SolverOptions::default()).unwrap();
        let table = sol.dense.sample(&[0.0, 0.5, 1.0]).unwrap();
        assert_eq!(table.dim(), (2, 3));
        assert_eq!(table[[0, 0]], 0.0);
    }

    #[test]
    fn non_finite_rate_is_an_integration_error() {
        let err = integrate(&Poisoned, 0.0, aview1(&[0.0]), 1.0, &SolverOptions::default()).unwrap_err();
        assert!(matches!(err, EcosystemError::IntegrationError(_)));
    }

    #[test]
    fn step_budget_is_enforced_when_set() {
        let opts = SolverOptions { max_steps: Some(3), rtol: 1e-10, atol: 1e-12, first_step: None };
        let err = integrate(&Oscillator, 0.0, aview1(&[0.0, 1.0]), 100.0, &opts).unwrap_err();
        assert!(matches!(err, EcosystemError::IntegrationError(_)));
    }

    #[test]
    fn long_horizon_runs_without_a_default_step_cap() {
        // Several thousand steps: any small built-in budget would trip here.
        let opts = SolverOptions::default();
        assert_eq!(opts.max_steps, None);
        let sol = integrate(&Oscillator, 0.0, aview1(&[0.0, 1.0]), 5_000.0, &opts).unwrap();
        assert_eq!(*sol.t.last().unwrap(), 5_000.0);
        assert!(sol.stats.accepted_steps > 1_000);

        let capped = SolverOptions { max_steps: Some(1_000), ..SolverOptions::default() };
        assert!(integrate(&Oscillator, 0.0, aview1(&[0.0, 1.0]), 5_000.0, &capped).is_err());
    }

    #[test]
    fn rejects_bad_bounds_and_dimensions() {
        let opts = SolverOptions::default();
        assert!(matches!(integrate(&Decay, 0.0, aview1(&[1.0]), 0.0, &opts), Err(EcosystemError::InvalidInput(_))));
        assert!(matches!(integrate(&Decay, 0.0, aview1(&[1.0, 2.0]), 1.0, &opts), Err(EcosystemError::InvalidInput(_))));
    }

    #[test]
    fn fixed_first_step_is_honoured() {
        let opts = SolverOptions { first_step: Some(0.01), ..SolverOptions::default() };
        let sol = integrate(&Decay, 0.0, aview1(&[1.0]), 1.0, &opts).unwrap();
        assert!((sol.t[1] - 0.01).abs() < 1e-15);
    }
}
