// xps_irf - Forward simulator and inverse fitter for a near-Fermi-edge XPS
// instrumental response function
// Copyright (C) 2026

// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as
// published by the Free Software Foundation, either version 3 of the
// License, or (at your option) any later version.

// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU Affero General Public License for more details.

// You should have received a copy of the GNU Affero General Public License
// along with this program.  If not, see <https://www.gnu.org/licenses/>.

//! Estimating the full vector of IRF parameters by matching a simulated
//! spectrum to an observed one, via Differential Evolution over the forward
//! simulator.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::FitError;
use crate::optimize::{DEOptions, DEResult, DifferentialEvolution, OptimizationBounds};
use crate::simulator::{simulate, SimulatorParams};

/// Parameter order used throughout this module: `(kappa, theta, sigma_res,
/// alpha, sigma_x, sigma_y, gamma_x, gamma_y)`.
pub(crate) const PARAM_COUNT: usize = 8;

/// Default search bounds, in the parameter order above.
pub fn default_bounds() -> OptimizationBounds {
    OptimizationBounds::new(
        vec![0.0, -0.5, 0.1, -0.01, 0.01, 0.01, -5.0, -10.0],
        vec![0.1, 0.5, 10.0, 0.01, 5.0, 5.0, 5.0, 10.0],
    )
}

/// Result of [`estimate_irf`].
#[derive(Clone, Debug)]
pub struct IRFEstimationResult {
    pub success: bool,
    pub kappa: f64,
    pub theta: f64,
    pub sigma_res: f64,
    pub alpha: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    pub gamma_x: f64,
    pub gamma_y: f64,
    pub fitted_spectrum: Vec<f64>,
    pub estimated_irf: Vec<f64>,
    pub final_loss: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub message: String,
}

impl IRFEstimationResult {
    fn failure(message: FitError) -> Self {
        IRFEstimationResult {
            success: false,
            kappa: 0.0,
            theta: 0.0,
            sigma_res: 0.0,
            alpha: 0.0,
            sigma_x: 0.0,
            sigma_y: 0.0,
            gamma_x: 0.0,
            gamma_y: 0.0,
            fitted_spectrum: vec![],
            estimated_irf: vec![],
            final_loss: f64::INFINITY,
            iterations: 0,
            evaluations: 0,
            message: message.to_string(),
        }
    }
}

fn params_from_vector(x: &[f64], temp: f64) -> SimulatorParams {
    SimulatorParams {
        sigma_x: x[4],
        sigma_y: x[5],
        alpha: x[3],
        gamma_x: x[6],
        gamma_y: x[7],
        kappa: x[0],
        theta: x[1],
        sigma_res: x[2],
        temp,
        poisson_noise: 0.0,
        gaussian_noise: 0.0,
    }
}

/// Mean squared error between two spectra, each normalized by its own
/// `max + 1e-12`, over their shorter common length.
fn normalized_mse(simulated: &[f64], observed: &[f64]) -> f64 {
    let n = simulated.len().min(observed.len());
    let sim_max = simulated.iter().cloned().fold(f64::MIN, f64::max) + 1e-12;
    let obs_max = observed.iter().cloned().fold(f64::MIN, f64::max) + 1e-12;
    let mut sum_sq = 0.0;
    for i in 0..n {
        let diff = simulated[i] / sim_max - observed[i] / obs_max;
        sum_sq += diff * diff;
    }
    sum_sq / n as f64
}

/// Estimates all eight IRF parameters by Differential Evolution against the
/// forward simulator. `temp` is the (known) sample temperature; `bounds`
/// defaults to [`default_bounds`] when `None`; `max_iterations` defaults to
/// 50 when `None`.
pub fn estimate_irf(observed: &[f64], temp: f64, bounds: Option<OptimizationBounds>, max_iterations: Option<usize>) -> IRFEstimationResult {
    estimate_irf_with_progress(observed, temp, bounds, max_iterations, None, |_, _| {})
}

/// Same as [`estimate_irf`], forwarding Differential Evolution progress
/// (`iteration`, `best_fitness`) to `on_progress` and polling `cancel` (if
/// given) once per DE sweep.
pub fn estimate_irf_with_progress<P>(
    observed: &[f64],
    temp: f64,
    bounds: Option<OptimizationBounds>,
    max_iterations: Option<usize>,
    cancel: Option<Arc<AtomicBool>>,
    mut on_progress: P,
) -> IRFEstimationResult
where
    P: FnMut(usize, f64),
{
    if observed.is_empty() {
        return IRFEstimationResult::failure(FitError::EmptyInput("observed spectrum"));
    }
    if observed.iter().any(|v| !v.is_finite()) {
        return IRFEstimationResult::failure(FitError::NonFiniteInput("observed spectrum"));
    }

    let bounds = bounds.unwrap_or_else(default_bounds);
    if bounds.dim() != PARAM_COUNT {
        return IRFEstimationResult::failure(FitError::LengthMismatch {
            what: "IRF estimation bounds",
            a: bounds.dim(),
            b: PARAM_COUNT,
        });
    }
    let max_iter = max_iterations.unwrap_or(50);

    let evaluations = std::cell::Cell::new(0usize);
    let objective = |x: &[f64]| -> f64 {
        evaluations.set(evaluations.get() + 1);
        let params = params_from_vector(x, temp);
        let result = simulate(&params);
        normalized_mse(&result.spectrum_clean, observed)
    };

    let mut options = DEOptions::default();
    options.max_iter(max_iter).pop(15).seed(42);
    if let Some(flag) = cancel {
        options.cancel_flag(flag);
    }
    let de = DifferentialEvolution::new(options);
    let DEResult { x, fitness, iterations, .. } = de.run(objective, &bounds, |iter, fit| on_progress(iter, fit));
    let evaluations = evaluations.get();

    let params = params_from_vector(&x, temp);
    let result = simulate(&params);

    IRFEstimationResult {
        success: true,
        kappa: x[0],
        theta: x[1],
        sigma_res: x[2],
        alpha: x[3],
        sigma_x: x[4],
        sigma_y: x[5],
        gamma_x: x[6],
        gamma_y: x[7],
        fitted_spectrum: result.spectrum_clean,
        estimated_irf: result.irf,
        final_loss: fitness,
        iterations,
        evaluations,
        message: "converged".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_parameters_from_a_noise_free_simulation() {
        let truth = SimulatorParams {
            sigma_x: 0.6,
            sigma_y: 0.4,
            alpha: 0.001,
            gamma_x: 0.0,
            gamma_y: 0.0,
            kappa: 0.02,
            theta: 0.1,
            sigma_res: 1.2,
            temp: 5.0,
            poisson_noise: 0.0,
            gaussian_noise: 0.0,
        };
        let observed = simulate(&truth).spectrum_clean;
        let result = estimate_irf(&observed, 5.0, None, Some(30));
        assert!(result.success);
        assert!(result.final_loss < 1.0);
        assert_eq!(result.evaluations, 15 + result.iterations * 15);
    }

    #[test]
    fn empty_observed_spectrum_is_reported_as_failure() {
        let result = estimate_irf(&[], 5.0, None, None);
        assert!(!result.success);
        assert_eq!(result.message, "observed spectrum must not be empty");
    }

    #[test]
    fn wrong_dimension_bounds_are_reported_as_failure_not_a_panic() {
        let observed = simulate(&SimulatorParams::default()).spectrum_clean;
        let bad_bounds = OptimizationBounds::new(vec![0.0, 0.0], vec![1.0, 1.0]);
        let result = estimate_irf(&observed, 5.0, Some(bad_bounds), None);
        assert!(!result.success);
        assert_eq!(result.message, "IRF estimation bounds length mismatch: 2 != 8");
    }

    #[test]
    fn progress_iterations_are_contiguous_and_increasing() {
        let observed = simulate(&SimulatorParams::default()).spectrum_clean;
        let mut iterations = vec![];
        estimate_irf_with_progress(&observed, 5.0, None, Some(10), None, |it, _| iterations.push(it));
        assert!(!iterations.is_empty());
        assert!(iterations.len() <= 10);
        assert_eq!(iterations, (1..=iterations.len()).collect::<Vec<_>>());
    }
}
