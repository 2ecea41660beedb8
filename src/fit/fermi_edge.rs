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

//! Fitting an analytic Fermi-edge model (edge position, total resolution,
//! optionally temperature) to an observed spectrum.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::error::{validate_spectrum, FitError};
use crate::kernels::{convolve, fermi_dirac, gaussian_kernel};
use crate::optimize::{curve_fit, CurveFitOptions, OptimizationBounds};

/// Result of [`fit_fermi_edge`].
#[derive(Clone, Debug)]
pub struct FermiEdgeFitResult {
    pub success: bool,
    pub ef_shift: f64,
    pub ef_shift_error: f64,
    /// Total resolution, eV.
    pub sigma_total: f64,
    pub sigma_total_error: f64,
    /// `None` when `fit_temp` was `false`.
    pub temp_fit: Option<f64>,
    pub temp_error: Option<f64>,
    pub amplitude: f64,
    pub offset: f64,
    pub fitted_spectrum: Vec<f64>,
    pub r_squared: f64,
    pub residuals: Vec<f64>,
    pub error_message: Option<String>,
}

impl FermiEdgeFitResult {
    fn failure(message: FitError) -> Self {
        FermiEdgeFitResult {
            success: false,
            ef_shift: 0.0,
            ef_shift_error: f64::NAN,
            sigma_total: 0.0,
            sigma_total_error: f64::NAN,
            temp_fit: None,
            temp_error: None,
            amplitude: 0.0,
            offset: 0.0,
            fitted_spectrum: vec![],
            r_squared: 0.0,
            residuals: vec![],
            error_message: Some(message.to_string()),
        }
    }
}

/// Fermi-Dirac occupation convolved with a Gaussian of width `sigma` (eV),
/// sampled on `e`. Pads the axis by `clamp(ceil(10*sigma/de), 10, 1000)`
/// samples on each side before convolving, then returns the central
/// `e.len()` samples, so edge effects from the convolution never leak into
/// the reported window.
fn fermi_dirac_convolved(e: &[f64], ef: f64, temp: f64, sigma: f64) -> Vec<f64> {
    let de = (e[1] - e[0]).abs();
    let n = e.len();
    let n_pad = (((10.0 * sigma.max(0.0) / de).ceil() as i64).clamp(10, 1000)) as usize;
    let total = n + 2 * n_pad;
    let start = e[0] - n_pad as f64 * de;
    let padded_axis: Vec<f64> = (0..total).map(|i| start + i as f64 * de).collect();
    let fd: Vec<f64> = padded_axis.iter().map(|&x| fermi_dirac(x, temp, ef)).collect();
    let kernel = gaussian_kernel(sigma, de);
    let convolved = convolve(&fd, &kernel);
    convolved[n_pad..n_pad + n].to_vec()
}

/// Fits `amplitude * fermi_dirac_convolved(e, ef_shift, T, sigma_total) +
/// offset` to `(energy, observed)` by Differential Evolution followed by
/// Levenberg-Marquardt. `temp` is the sample temperature (K); when
/// `fit_temp` is `false` it is held fixed at `temp`, otherwise it is fit as
/// a free parameter seeded at `temp`.
pub fn fit_fermi_edge(energy: &[f64], observed: &[f64], temp: f64, fit_temp: bool, use_global_opt: bool) -> FermiEdgeFitResult {
    fit_fermi_edge_with_progress(energy, observed, temp, fit_temp, use_global_opt, None, |_, _| {})
}

/// Same as [`fit_fermi_edge`], forwarding Differential Evolution progress
/// (`iteration`, `best_fitness`) to `on_progress` and polling `cancel` (if
/// given) once per DE sweep and once per LM iteration.
pub fn fit_fermi_edge_with_progress<P>(
    energy: &[f64],
    observed: &[f64],
    temp: f64,
    fit_temp: bool,
    use_global_opt: bool,
    cancel: Option<Arc<AtomicBool>>,
    on_progress: P,
) -> FermiEdgeFitResult
where
    P: FnMut(usize, f64),
{
    if let Err(e) = validate_spectrum(energy, observed) {
        return FermiEdgeFitResult::failure(e);
    }
    if energy.len() < 2 {
        return FermiEdgeFitResult::failure(FitError::LengthMismatch { what: "energy", a: energy.len(), b: 2 });
    }

    let mut options = CurveFitOptions::default();
    options.use_global_opt = use_global_opt;
    if let Some(flag) = cancel {
        options.de_options.cancel_flag(flag.clone());
        options.lm_options.cancel_flag(flag);
    }

    if fit_temp {
        let bounds = OptimizationBounds::new(vec![-0.05, 1e-4, 0.1, 0.5, -0.5], vec![0.05, 0.05, 300.0, 2.0, 0.5]);
        let initial = vec![0.0, 0.005, temp, 1.0, 0.0];
        let model = move |e: &[f64], p: &[f64]| -> Vec<f64> {
            fermi_dirac_convolved(e, p[0], p[2], p[1]).iter().map(|fd| p[3] * fd + p[4]).collect()
        };
        let result = curve_fit(model, energy, observed, &bounds, &initial, &options, on_progress);
        FermiEdgeFitResult {
            success: true,
            ef_shift: result.params[0],
            ef_shift_error: result.param_errors[0],
            sigma_total: result.params[1],
            sigma_total_error: result.param_errors[1],
            temp_fit: Some(result.params[2]),
            temp_error: Some(result.param_errors[2]),
            amplitude: result.params[3],
            offset: result.params[4],
            fitted_spectrum: observed.iter().zip(result.residuals.iter()).map(|(o, r)| o - r).collect(),
            r_squared: result.r_squared,
            residuals: result.residuals,
            error_message: None,
        }
    } else {
        let bounds = OptimizationBounds::new(vec![-0.05, 1e-4, 0.5, -0.5], vec![0.05, 0.05, 2.0, 0.5]);
        let initial = vec![0.0, 0.005, 1.0, 0.0];
        let model = move |e: &[f64], p: &[f64]| -> Vec<f64> {
            fermi_dirac_convolved(e, p[0], temp, p[1]).iter().map(|fd| p[2] * fd + p[3]).collect()
        };
        let result = curve_fit(model, energy, observed, &bounds, &initial, &options, on_progress);
        FermiEdgeFitResult {
            success: true,
            ef_shift: result.params[0],
            ef_shift_error: result.param_errors[0],
            sigma_total: result.params[1],
            sigma_total_error: result.param_errors[1],
            temp_fit: None,
            temp_error: None,
            amplitude: result.params[2],
            offset: result.params[3],
            fitted_spectrum: observed.iter().zip(result.residuals.iter()).map(|(o, r)| o - r).collect(),
            r_squared: result.r_squared,
            residuals: result.residuals,
            error_message: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::linspace;

    #[test]
    fn recovers_edge_position_and_resolution() {
        let e = linspace(-0.05, 0.05, 200);
        let true_sigma = 0.002;
        let observed: Vec<f64> = fermi_dirac_convolved(&e, 0.0, 5.0, true_sigma);
        let result = fit_fermi_edge(&e, &observed, 5.0, false, true);
        assert!(result.success);
        assert!(result.ef_shift.abs() < 0.002);
        assert!((result.sigma_total - true_sigma).abs() < 0.002);
        assert!(result.r_squared > 0.999);
    }

    #[test]
    fn convolved_curve_is_monotone_and_crosses_half_near_zero() {
        let e = linspace(-0.05, 0.05, 400);
        let curve = fermi_dirac_convolved(&e, 0.0, 5.0, 0.002);
        for w in curve.windows(2) {
            assert!(w[1] <= w[0] + 1e-9);
        }
        let crossing = e.iter().zip(curve.iter()).find(|(_, &v)| v <= 0.5).map(|(e, _)| *e).unwrap();
        assert!(crossing.abs() < 0.0005);
    }

    #[test]
    fn empty_input_is_reported_as_failure() {
        let result = fit_fermi_edge(&[], &[], 5.0, false, true);
        assert!(!result.success);
        assert!(result.error_message.is_some());
    }

    #[test]
    fn mismatched_lengths_are_reported_as_failure() {
        let result = fit_fermi_edge(&[0.0, 0.1], &[1.0, 2.0, 3.0], 5.0, false, true);
        assert!(!result.success);
    }
}
