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

//! The forward simulator: composes the physics kernels and the display/
//! extended grids into a predicted 2D detector image and 1D spectrum.
//!
//! [`simulate`] is total - for any finite [`SimulatorParams`] it returns a
//! finite [`SimulationResult`], possibly all-zero if the inputs are
//! degenerate, but it never panics.

mod noise;
mod projection;

use crate::grid::Grid;
use crate::kernels::{convolve, elliptical_gaussian_2d, fermi_dirac_axis, gaussian_kernel, interp};
use crate::optimize::prng::Mulberry32;
use noise::apply_noise;
use projection::project_to_1d;

/// Physical inputs to the forward simulator. `sigma_x` and `sigma_res` are
/// in meV; everything else is in the unit named in its doc comment.
#[derive(Clone, Debug, PartialEq)]
pub struct SimulatorParams {
    /// Source energy resolution, meV.
    pub sigma_x: f64,
    /// Spot spatial width, mm.
    pub sigma_y: f64,
    /// Energy gradient across the spot, eV/mm.
    pub alpha: f64,
    /// Skewness of the energy-direction spot profile.
    pub gamma_x: f64,
    /// Skewness of the spatial-direction spot profile.
    pub gamma_y: f64,
    /// Smile (parabolic detector) curvature.
    pub kappa: f64,
    /// Detector tilt, degrees.
    pub theta: f64,
    /// Detector intrinsic resolution, meV.
    pub sigma_res: f64,
    /// Sample temperature, K (>= 0).
    pub temp: f64,
    /// Poisson-noise-approximation level (>= 0, 0 disables it).
    pub poisson_noise: f64,
    /// Additive Gaussian noise level (>= 0, 0 disables it).
    pub gaussian_noise: f64,
}

impl Default for SimulatorParams {
    /// The scenario (a) default parameter set from the testable properties:
    /// `sigma_combined ~= sqrt(0.5^2 + 1.5^2) = 1.5811` meV.
    fn default() -> Self {
        SimulatorParams {
            sigma_x: 0.5,
            sigma_y: 0.5,
            alpha: 0.002,
            gamma_x: 0.0,
            gamma_y: 0.0,
            kappa: 0.01,
            theta: 0.08,
            sigma_res: 1.5,
            temp: 5.0,
            poisson_noise: 0.0,
            gaussian_noise: 0.0,
        }
    }
}

/// Output of the forward simulator. All vectors are finite and the lengths
/// named in the invariants below always hold.
#[derive(Clone, Debug)]
pub struct SimulationResult {
    /// Energy axis, eV, length = display grid `e_steps`.
    pub energy: Vec<f64>,
    /// Normalized spectrum with noise applied (equal to `spectrum_clean`
    /// when both noise levels are zero).
    pub spectrum: Vec<f64>,
    /// Normalized spectrum without noise; max value is <= 1.
    pub spectrum_clean: Vec<f64>,
    /// Bare Fermi-Dirac occupation sampled on the display energy axis.
    pub ideal_fd: Vec<f64>,
    /// Instrumental response function; `max(|irf|) == 1`, sign-flipped to
    /// the binding-energy convention.
    pub irf: Vec<f64>,
    /// Row-major `[y_steps][e_steps]` ideal image on the display grid.
    pub image_2d: Vec<f64>,
    /// Row-major `[y_steps][e_steps]` spot profile on the display grid.
    pub spot_profile: Vec<f64>,
    /// Spatial axis, mm, length = display grid `y_steps`.
    pub y_axis: Vec<f64>,
    /// Source resolution contribution, meV.
    pub sigma_source: f64,
    /// Detector resolution contribution, meV.
    pub sigma_detector: f64,
    /// Combined resolution, meV: `sqrt(sigma_source^2 + sigma_detector^2)`.
    pub sigma_combined: f64,
}

/// Builds the `[y_steps][e_steps]` emission image: the ideal Fermi-Dirac
/// occupation shifted per-row by `alpha * y` and modulated by a skew-Gaussian
/// spatial profile (step 4/11 of the simulator pipeline).
///
/// The asymmetric interpolation fill (`left = ideal_fd[0]`, `right = 0`)
/// preserves the occupied plateau on the low-energy side while enforcing
/// zero occupation above the Fermi edge once it has been shifted off-axis.
fn build_emission(e_axis: &[f64], y_axis: &[f64], ideal_fd: &[f64], alpha: f64, sigma_y: f64, gamma_y: f64) -> Vec<f64> {
    let e_steps = e_axis.len();
    let mut emission = vec![0.0; y_axis.len() * e_steps];
    let left = ideal_fd[0];
    for (i, &y) in y_axis.iter().enumerate() {
        let shift = alpha * y;
        let shifted_query: Vec<f64> = e_axis.iter().map(|&e| e - shift).collect();
        let row = interp(&shifted_query, e_axis, ideal_fd, Some(left), Some(0.0));
        let skew = crate::kernels::skew_gaussian(y, sigma_y, gamma_y);
        let base = i * e_steps;
        for j in 0..e_steps {
            emission[base + j] = row[j] * skew;
        }
    }
    emission
}

/// Runs steps 3-7 of the pipeline (ideal FD -> emission -> projection ->
/// resolution convolutions) on the extended grid at the given temperature,
/// returning the raw (un-normalized) 1D spectrum on the extended energy axis.
fn forward_pass(grid_ext: &Grid, params: &SimulatorParams, temp: f64, sigma_source: f64, sigma_det: f64) -> Vec<f64> {
    let ideal_fd_ext = fermi_dirac_axis(&grid_ext.e_axis, temp);
    let emission_ext = build_emission(&grid_ext.e_axis, &grid_ext.y_axis, &ideal_fd_ext, params.alpha, params.sigma_y, params.gamma_y);
    let mut spec_ext = project_to_1d(&emission_ext, &grid_ext.y_axis, &grid_ext.e_axis, params.theta, params.kappa);
    if sigma_source > 0.0 {
        let kernel = gaussian_kernel(sigma_source, grid_ext.de);
        spec_ext = convolve(&spec_ext, &kernel);
    }
    if sigma_det > 0.0 {
        let kernel = gaussian_kernel(sigma_det, grid_ext.de);
        spec_ext = convolve(&spec_ext, &kernel);
    }
    spec_ext
}

/// Central-difference derivative of `y` with spacing `dx`; forward/backward
/// differences are used at the two endpoints.
fn central_difference(y: &[f64], dx: f64) -> Vec<f64> {
    let n = y.len();
    let mut d = vec![0.0; n];
    if n < 2 {
        return d;
    }
    d[0] = (y[1] - y[0]) / dx;
    d[n - 1] = (y[n - 1] - y[n - 2]) / dx;
    for i in 1..n - 1 {
        d[i] = (y[i + 1] - y[i - 1]) / (2.0 * dx);
    }
    d
}

/// Runs the forward simulator with the default noise seed (42, matching the
/// Differential Evolution default seed used elsewhere in the crate).
pub fn simulate(params: &SimulatorParams) -> SimulationResult {
    simulate_with_seed(params, 42)
}

/// Runs the forward simulator, using `seed` to drive the Mulberry32 stream
/// that generates approximate Poisson/Gaussian noise when either noise level
/// is non-zero. Two simulations with different seeds but otherwise-identical
/// parameters only need to agree on `spectrum_clean`/`ideal_fd`/`irf`, not on
/// `spectrum`, once noise is enabled.
pub fn simulate_with_seed(params: &SimulatorParams, seed: u32) -> SimulationResult {
    let grid_ext = Grid::extended_default();
    let grid_disp = Grid::display_default();

    let sigma_source = params.sigma_x / 1000.0;
    let sigma_det = params.sigma_res / 1000.0;

    // Steps 3-8: raw spectrum at the sample temperature, interpolated and
    // normalized onto the display grid.
    let spec_ext = forward_pass(&grid_ext, params, params.temp, sigma_source, sigma_det);
    let spectrum_raw = interp(&grid_disp.e_axis, &grid_ext.e_axis, &spec_ext, None, None);
    let max_raw = spectrum_raw.iter().cloned().fold(f64::MIN, f64::max);
    let norm = max_raw + 1e-12;
    let spectrum_clean: Vec<f64> = spectrum_raw.iter().map(|v| v / norm).collect();

    // Step 9: optional noise.
    let mut spectrum = spectrum_clean.clone();
    if params.poisson_noise > 0.0 || params.gaussian_noise > 0.0 {
        let mut rng = Mulberry32::new(seed);
        apply_noise(&mut spectrum, params.poisson_noise, params.gaussian_noise, &mut rng);
    }

    // Step 10: IRF extraction at near-zero temperature.
    let spec_ext_001 = forward_pass(&grid_ext, params, 0.01, sigma_source, sigma_det);
    let spectrum_001 = interp(&grid_disp.e_axis, &grid_ext.e_axis, &spec_ext_001, None, None);
    let irf_raw = central_difference(&spectrum_001, grid_disp.de);
    let irf_max = irf_raw.iter().cloned().fold(0.0_f64, |acc, v| acc.max(v.abs())) + 1e-12;
    let irf: Vec<f64> = irf_raw.iter().map(|v| -v / irf_max).collect();

    // Step 11: ideal (undistorted) 2D image on the display grid.
    let ideal_fd_disp = fermi_dirac_axis(&grid_disp.e_axis, params.temp);
    let image_2d = build_emission(&grid_disp.e_axis, &grid_disp.y_axis, &ideal_fd_disp, params.alpha, params.sigma_y, params.gamma_y);

    // Step 5: spot profile on the display grid.
    let spot_profile = elliptical_gaussian_2d(&grid_disp.e_mesh, &grid_disp.y_mesh, sigma_source, params.sigma_y, params.gamma_x, params.gamma_y, 0.0);

    // Step 12: resolutions, meV.
    let sigma_combined = (params.sigma_x.powi(2) + params.sigma_res.powi(2)).sqrt();

    SimulationResult {
        energy: grid_disp.e_axis.clone(),
        spectrum,
        spectrum_clean,
        ideal_fd: ideal_fd_disp,
        irf,
        image_2d,
        spot_profile,
        y_axis: grid_disp.y_axis.clone(),
        sigma_source: params.sigma_x,
        sigma_detector: params.sigma_res,
        sigma_combined,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_match_sigma_combined_scenario() {
        let result = simulate(&SimulatorParams::default());
        assert!((result.sigma_combined - 1.5811).abs() < 1e-3);
    }

    #[test]
    fn output_lengths_match_display_grid() {
        let grid_disp = Grid::display_default();
        let result = simulate(&SimulatorParams::default());
        assert_eq!(result.energy.len(), grid_disp.e_steps());
        assert_eq!(result.spectrum.len(), grid_disp.e_steps());
        assert_eq!(result.spectrum_clean.len(), grid_disp.e_steps());
        assert_eq!(result.ideal_fd.len(), grid_disp.e_steps());
        assert_eq!(result.irf.len(), grid_disp.e_steps());
        assert_eq!(result.image_2d.len(), grid_disp.y_steps() * grid_disp.e_steps());
        assert_eq!(result.spot_profile.len(), grid_disp.y_steps() * grid_disp.e_steps());
        assert_eq!(result.y_axis.len(), grid_disp.y_steps());
    }

    #[test]
    fn everything_is_finite() {
        let result = simulate(&SimulatorParams::default());
        for v in result.spectrum.iter().chain(result.irf.iter()).chain(result.image_2d.iter()) {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn spectrum_clean_is_normalized() {
        let result = simulate(&SimulatorParams::default());
        let max = result.spectrum_clean.iter().cloned().fold(f64::MIN, f64::max);
        assert!(max <= 1.0 + 1e-9);
    }

    #[test]
    fn irf_peak_magnitude_is_one_and_sign_flipped() {
        let result = simulate(&SimulatorParams::default());
        let max_abs = result.irf.iter().cloned().fold(0.0_f64, |acc, v| acc.max(v.abs()));
        assert!((max_abs - 1.0).abs() < 1e-6);
        // The occupation step falls off with increasing energy, so its raw
        // derivative is negative; after the sign flip the IRF's positive
        // lobe sits at positive energy (above E_F).
        let positive_half_sum: f64 = result
            .energy
            .iter()
            .zip(result.irf.iter())
            .filter(|(e, _)| **e > 0.0)
            .map(|(_, v)| *v)
            .sum();
        assert!(positive_half_sum > 0.0);
    }

    #[test]
    fn simulator_is_total_for_degenerate_parameters() {
        let mut params = SimulatorParams::default();
        params.sigma_x = 0.0;
        params.sigma_res = 0.0;
        params.sigma_y = 1e-6;
        let result = simulate(&params);
        for v in result.spectrum.iter() {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn noise_free_determinism() {
        let a = simulate(&SimulatorParams::default());
        let b = simulate(&SimulatorParams::default());
        assert_eq!(a.spectrum_clean, b.spectrum_clean);
        assert_eq!(a.irf, b.irf);
    }
}
