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

//! Approximate noise model for a simulated spectrum.
//!
//! This is explicitly an approximation: a Gaussian with a `sqrt(lambda)`
//! deviation is used in place of a true Poisson draw. Do not "fix" this
//! without updating the tests that pin the current behavior - it is a
//! deliberate scope decision, not an oversight.

use crate::optimize::prng::Mulberry32;

/// Draws one standard-normal sample via the Box-Muller transform, consuming
/// two draws from `rng`.
pub(crate) fn box_muller(rng: &mut Mulberry32) -> f64 {
    let u1 = rng.next_f64().max(f64::MIN_POSITIVE);
    let u2 = rng.next_f64();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Applies the Poisson-approximation and additive Gaussian noise models to
/// `spectrum` in place, clamping every sample to be non-negative.
pub(crate) fn apply_noise(spectrum: &mut [f64], poisson_noise: f64, gaussian_noise: f64, rng: &mut Mulberry32) {
    for v in spectrum.iter_mut() {
        let mut value = *v;
        if poisson_noise > 1e-5 {
            let scale = 1000.0 / poisson_noise;
            let lambda = value * scale;
            let z = box_muller(rng);
            value = (lambda + z * lambda.max(0.0).sqrt()) / scale;
        }
        if gaussian_noise > 0.0 {
            let z = box_muller(rng);
            value += z * (gaussian_noise / 100.0);
        }
        *v = value.max(0.0);
    }
}
