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

//! Composite curve fitting: Differential Evolution for a bounded global
//! search, Levenberg-Marquardt for local refinement.

use super::de::{DEOptions, DifferentialEvolution, OptimizationBounds};
use super::lm::{LMOptions, LevenbergMarquardt};

/// `param_errors` entries above this magnitude are replaced with `NaN`
/// (displayed externally as "N/A").
const ERROR_MAGNITUDE_CAP: f64 = 1e6;
/// `param_errors[i]` is also capped relative to the fitted value itself.
const ERROR_RELATIVE_FACTOR: f64 = 100.0;
const ERROR_RELATIVE_FLOOR: f64 = 1e-10;

/// Tuning knobs for [`curve_fit`].
#[derive(Clone)]
pub struct CurveFitOptions {
    pub de_options: DEOptions,
    pub lm_options: LMOptions,
    /// Whether to run the Differential Evolution stage at all. When `false`,
    /// `curve_fit` runs Levenberg-Marquardt alone from `initial`.
    pub use_global_opt: bool,
}

impl Default for CurveFitOptions {
    fn default() -> Self {
        CurveFitOptions {
            de_options: DEOptions::default(),
            lm_options: LMOptions::default(),
            use_global_opt: true,
        }
    }
}

/// Result of a [`curve_fit`] call.
#[derive(Clone, Debug)]
pub struct CurveFitResult {
    pub params: Vec<f64>,
    pub param_errors: Vec<f64>,
    pub covariance: Vec<Vec<f64>>,
    pub residuals: Vec<f64>,
    pub r_squared: f64,
    pub converged: bool,
}

/// Fits `model(x, params) -> y_hat` to `(x, y)` by minimizing the sum of
/// squared residuals, using DE (if `options.use_global_opt`) to find a good
/// basin within `bounds` and then LM to refine it. `on_progress(iteration,
/// best_fitness)` is forwarded from the DE stage only; LM has no notion of
/// caller-visible progress.
pub fn curve_fit<M, P>(model: M, x: &[f64], y: &[f64], bounds: &OptimizationBounds, initial: &[f64], options: &CurveFitOptions, mut on_progress: P) -> CurveFitResult
where
    M: Fn(&[f64], &[f64]) -> Vec<f64>,
    P: FnMut(usize, f64),
{
    let residual_of = |params: &[f64]| -> Vec<f64> {
        let y_hat = model(x, params);
        y.iter().zip(y_hat.iter()).map(|(&yv, &yh)| yv - yh).collect()
    };

    let start = if options.use_global_opt {
        let objective = |p: &[f64]| residual_of(p).iter().map(|r| r * r).sum::<f64>();
        let de = DifferentialEvolution::new(options.de_options.clone());
        let de_result = de.run(objective, bounds, |iter, fitness| on_progress(iter, fitness));
        de_result.x
    } else {
        initial.to_vec()
    };

    let lm = LevenbergMarquardt::new(options.lm_options.clone());
    let lm_result = lm.run(residual_of, &start);

    let mut params = lm_result.x;
    for (p, (lo, hi)) in params.iter_mut().zip(bounds.lower.iter().zip(bounds.upper.iter())) {
        *p = p.clamp(*lo, *hi);
    }

    let residuals = residual_of(&params);
    let r_squared = r_squared(y, &residuals);
    let param_errors = sanitize_errors(&lm_result.covariance, &params);

    CurveFitResult {
        params,
        param_errors,
        covariance: lm_result.covariance,
        residuals,
        r_squared,
        converged: lm_result.converged,
    }
}

fn r_squared(y: &[f64], residuals: &[f64]) -> f64 {
    let mean = y.iter().sum::<f64>() / y.len() as f64;
    let ss_tot: f64 = y.iter().map(|v| (v - mean).powi(2)).sum();
    let ss_res: f64 = residuals.iter().map(|r| r * r).sum();
    if ss_tot.abs() < 1e-300 {
        return 1.0;
    }
    1.0 - ss_res / ss_tot
}

/// `sqrt(|cov[i][i]|)`, replaced with `NaN` when non-finite or implausibly
/// large relative to the fitted value, per the covariance sanitization rule.
fn sanitize_errors(covariance: &[Vec<f64>], params: &[f64]) -> Vec<f64> {
    params
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let raw = covariance.get(i).and_then(|row| row.get(i)).copied().unwrap_or(f64::NAN);
            let err = raw.abs().sqrt();
            let relative_cap = ERROR_RELATIVE_FACTOR * p.abs() + ERROR_RELATIVE_FLOOR;
            if !err.is_finite() || err > ERROR_MAGNITUDE_CAP || err > relative_cap {
                f64::NAN
            } else {
                err
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovers_a_line_with_global_search() {
        let x: Vec<f64> = (0..30).map(|i| i as f64 * 0.1).collect();
        let y: Vec<f64> = x.iter().map(|&xv| 2.5 * xv - 1.0).collect();
        let model = |x: &[f64], p: &[f64]| -> Vec<f64> { x.iter().map(|&xv| p[0] * xv + p[1]).collect() };
        let bounds = OptimizationBounds::new(vec![-10.0, -10.0], vec![10.0, 10.0]);
        let mut options = CurveFitOptions::default();
        options.de_options.seed(42);
        let result = curve_fit(model, &x, &y, &bounds, &[0.0, 0.0], &options, |_, _| {});
        assert!((result.params[0] - 2.5).abs() < 1e-3);
        assert!((result.params[1] + 1.0).abs() < 1e-3);
        assert!(result.r_squared > 0.999);
    }

    #[test]
    fn params_stay_within_bounds() {
        let x: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let y: Vec<f64> = x.iter().map(|&xv| 100.0 * xv).collect();
        let model = |x: &[f64], p: &[f64]| -> Vec<f64> { x.iter().map(|&xv| p[0] * xv).collect() };
        let bounds = OptimizationBounds::new(vec![0.0], vec![1.0]);
        let options = CurveFitOptions::default();
        let result = curve_fit(model, &x, &y, &bounds, &[0.5], &options, |_, _| {});
        assert!(result.params[0] >= 0.0 && result.params[0] <= 1.0);
    }

    #[test]
    fn huge_relative_error_is_marked_not_a_number() {
        let covariance = vec![vec![1e20]];
        let params = vec![1.0];
        let errors = sanitize_errors(&covariance, &params);
        assert!(errors[0].is_nan());
    }

    #[test]
    fn small_error_passes_through() {
        let covariance = vec![vec![0.0001]];
        let params = vec![1.0];
        let errors = sanitize_errors(&covariance, &params);
        assert!((errors[0] - 0.01).abs() < 1e-9);
    }
}
