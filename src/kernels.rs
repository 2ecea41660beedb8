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

//! Pure numerical primitives shared by the simulator and the fitting code:
//! the error function, the Fermi-Dirac distribution, skew-Gaussian densities
//! in one and two dimensions, linear interpolation and an edge-replicated
//! convolution.
//!
//! Nothing in this module holds state; every function is a value-to-value
//! transform, which is what lets the forward simulator in
//! [`crate::simulator`] stay total (it never panics on finite input).

/// Boltzmann constant in eV/K.
pub const KB: f64 = 8.617_333_262e-5;

/// Error function via the Abramowitz & Stegun 7.1.26 rational approximation
/// (max error ~1.5e-7).
pub fn erf(x: f64) -> f64 {
    const A1: f64 = 0.254_829_592;
    const A2: f64 = -0.284_496_736;
    const A3: f64 = 1.421_413_741;
    const A4: f64 = -1.453_152_027;
    const A5: f64 = 1.061_405_429;
    const P: f64 = 0.327_591_1;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A5 * t + A4) * t + A3) * t + A2) * t + A1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// Standard normal CDF, derived from [`erf`].
#[inline]
fn normal_cdf(z: f64) -> f64 {
    0.5 * (1.0 + erf(z / std::f64::consts::SQRT_2))
}

/// Fermi-Dirac occupation at energy `e` (eV), temperature `temp` (K), and
/// edge position `ef` (eV, default 0).
///
/// Below 0.1 K the distribution is treated as a hard step to avoid dividing
/// by a near-zero thermal energy; above it, the exponent is clamped to
/// `[-100, 100]` to prevent overflow while leaving the occupation value
/// unaffected to machine precision.
pub fn fermi_dirac(e: f64, temp: f64, ef: f64) -> f64 {
    if temp < 0.1 {
        return if e <= ef { 1.0 } else { 0.0 };
    }
    let x = ((e - ef) / (KB * temp)).clamp(-100.0, 100.0);
    1.0 / (1.0 + x.exp())
}

/// [`fermi_dirac`] evaluated over a whole axis at `ef = 0`.
pub fn fermi_dirac_axis(energy: &[f64], temp: f64) -> Vec<f64> {
    energy.iter().map(|&e| fermi_dirac(e, temp, 0.0)).collect()
}

/// One-dimensional skew-Gaussian density: a Gaussian modulated by the normal
/// CDF of a linear argument, `2*phi(x/sigma)/sigma * Phi(gamma*x/sigma)`.
pub fn skew_gaussian(x: f64, sigma: f64, gamma: f64) -> f64 {
    let phi = (-0.5 * (x / sigma).powi(2)).exp() / (sigma * (2.0 * std::f64::consts::PI).sqrt());
    2.0 * phi * normal_cdf(gamma * x / sigma)
}

/// [`skew_gaussian`] evaluated over a whole axis.
pub fn skew_gaussian_axis(x: &[f64], sigma: f64, gamma: f64) -> Vec<f64> {
    x.iter().map(|&v| skew_gaussian(v, sigma, gamma)).collect()
}

/// Unnormalized one-dimensional skew factor used inside
/// [`elliptical_gaussian_2d`]: `2*exp(-x^2/(2 sigma^2)) * Phi(gamma*x/(sigma*sqrt(2)))`.
#[inline]
fn skew_factor(x: f64, sigma: f64, gamma: f64) -> f64 {
    2.0 * (-x * x / (2.0 * sigma * sigma)).exp()
        * normal_cdf(gamma * x / (sigma * std::f64::consts::SQRT_2))
}

/// Rotated, skewed 2D Gaussian spot profile sampled on a mesh.
///
/// `e_mesh`/`y_mesh` are row-major `[y_steps][e_steps]` meshes (as produced
/// by [`crate::grid::Grid`]); the result has the same shape and is
/// normalized to unit sum whenever that sum exceeds `1e-12` (left untouched
/// otherwise, since dividing by a near-zero sum would blow the profile up
/// rather than suppress it).
#[allow(clippy::too_many_arguments)]
pub fn elliptical_gaussian_2d(
    e_mesh: &[f64],
    y_mesh: &[f64],
    sigma_x: f64,
    sigma_y: f64,
    gamma_x: f64,
    gamma_y: f64,
    rotation_deg: f64,
) -> Vec<f64> {
    assert_eq!(e_mesh.len(), y_mesh.len());
    let theta = rotation_deg.to_radians();
    let (sin_t, cos_t) = theta.sin_cos();
    let mut out = vec![0.0; e_mesh.len()];
    let mut sum = 0.0;
    for i in 0..e_mesh.len() {
        let e = e_mesh[i];
        let y = y_mesh[i];
        let xr = e * cos_t - y * sin_t;
        let yr = e * sin_t + y * cos_t;
        let v = skew_factor(xr, sigma_x, gamma_x) * skew_factor(yr, sigma_y, gamma_y);
        out[i] = v;
        sum += v;
    }
    if sum > 1e-12 {
        for v in out.iter_mut() {
            *v /= sum;
        }
    }
    out
}

/// Linear interpolation of `y_old(x_old)` at query points `x_new`.
///
/// `x_old` is assumed strictly increasing. Queries below `x_old[0]` return
/// `left` (default `y_old[0]`); queries above `x_old[len-1]` return `right`
/// (default `y_old[len-1]`).
pub fn interp(x_new: &[f64], x_old: &[f64], y_old: &[f64], left: Option<f64>, right: Option<f64>) -> Vec<f64> {
    assert_eq!(x_old.len(), y_old.len());
    assert!(!x_old.is_empty());
    let left = left.unwrap_or(y_old[0]);
    let right = right.unwrap_or(y_old[y_old.len() - 1]);
    let n = x_old.len();
    x_new
        .iter()
        .map(|&x| {
            if x <= x_old[0] {
                return if x < x_old[0] { left } else { y_old[0] };
            }
            if x >= x_old[n - 1] {
                return if x > x_old[n - 1] { right } else { y_old[n - 1] };
            }
            // Binary search for the interval containing x.
            let mut lo = 0usize;
            let mut hi = n - 1;
            while hi - lo > 1 {
                let mid = (lo + hi) / 2;
                if x_old[mid] <= x {
                    lo = mid;
                } else {
                    hi = mid;
                }
            }
            let (x0, x1) = (x_old[lo], x_old[hi]);
            let (y0, y1) = (y_old[lo], y_old[hi]);
            if x1 == x0 {
                y0
            } else {
                y0 + (y1 - y0) * (x - x0) / (x1 - x0)
            }
        })
        .collect()
}

/// Same-length convolution with edge-replicated padding.
///
/// `data` is padded by `kernel.len()/2` samples on each side by repeating
/// its first/last value, then a plain dot-product sum is computed per
/// output sample. `kernel` is expected to be pre-normalized (see
/// [`gaussian_kernel`]).
pub fn convolve(data: &[f64], kernel: &[f64]) -> Vec<f64> {
    if kernel.is_empty() {
        return data.to_vec();
    }
    let half = kernel.len() / 2;
    let n = data.len();
    let mut out = vec![0.0; n];
    for i in 0..n {
        let mut acc = 0.0;
        for (k, &kv) in kernel.iter().enumerate() {
            let offset = k as isize - half as isize;
            let idx = i as isize + offset;
            let sample = if idx < 0 {
                data[0]
            } else if idx as usize >= n {
                data[n - 1]
            } else {
                data[idx as usize]
            };
            acc += sample * kv;
        }
        out[i] = acc;
    }
    out
}

/// Normalized Gaussian convolution kernel with spacing `de` and width
/// `sigma`, half-width `w = ceil(5*sigma/de)`. Returns the identity kernel
/// `[1]` when `sigma` is so small relative to `de` that `w <= 0`.
pub fn gaussian_kernel(sigma: f64, de: f64) -> Vec<f64> {
    if sigma <= 0.0 {
        return vec![1.0];
    }
    let w = (5.0 * sigma / de).ceil() as i64;
    if w <= 0 {
        return vec![1.0];
    }
    let mut kernel: Vec<f64> = (-w..=w)
        .map(|i| {
            let x = i as f64 * de;
            (-x * x / (2.0 * sigma * sigma)).exp()
        })
        .collect();
    let sum: f64 = kernel.iter().sum();
    if sum > 0.0 {
        for v in kernel.iter_mut() {
            *v /= sum;
        }
    }
    kernel
}

/// `n` equally spaced samples from `a` to `b` inclusive.
pub fn linspace(a: f64, b: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![a];
    }
    let step = (b - a) / (n - 1) as f64;
    (0..n).map(|i| a + step * i as f64).collect()
}

/// Row-major mesh of `x` (varying along rows) and `y` (varying along
/// columns): `(e_mesh[i*nx+j], y_mesh[i*nx+j]) = (x[j], y[i])`.
pub fn meshgrid(x: &[f64], y: &[f64]) -> (Vec<f64>, Vec<f64>) {
    let nx = x.len();
    let ny = y.len();
    let mut e_mesh = vec![0.0; nx * ny];
    let mut y_mesh = vec![0.0; nx * ny];
    for i in 0..ny {
        for j in 0..nx {
            e_mesh[i * nx + j] = x[j];
            y_mesh[i * nx + j] = y[i];
        }
    }
    (e_mesh, y_mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn erf_properties() {
        assert!(erf(0.0).abs() < 1e-12);
        assert!((erf(-1.3) + erf(1.3)).abs() < 1e-6);
        assert!(erf(5.0) <= 1.0);
        assert!(erf(-5.0) >= -1.0);
    }

    #[test]
    fn fermi_dirac_zero_temp_is_a_step() {
        assert_eq!(fermi_dirac(-0.01, 0.0, 0.0), 1.0);
        assert_eq!(fermi_dirac(0.0, 0.0, 0.0), 1.0);
        assert_eq!(fermi_dirac(0.01, 0.0, 0.0), 0.0);
    }

    #[test]
    fn fermi_dirac_monotone_and_bounded_above_zero() {
        let temp = 10.0;
        let mut prev = f64::INFINITY;
        for i in 0..200 {
            let e = -0.1 + i as f64 * 0.001;
            let f = fermi_dirac(e, temp, 0.0);
            assert!(f > 0.0 && f < 1.0);
            assert!(f < prev);
            prev = f;
        }
    }

    #[test]
    fn gaussian_kernel_is_normalized_and_symmetric() {
        let k = gaussian_kernel(0.002, 0.0001);
        let sum: f64 = k.iter().sum();
        assert!((sum - 1.0).abs() < 1e-12);
        let n = k.len();
        for i in 0..n / 2 {
            assert!((k[i] - k[n - 1 - i]).abs() < 1e-12);
        }
    }

    #[test]
    fn convolve_identity_kernel_is_a_no_op() {
        let data = vec![1.0, 5.0, 2.0, -3.0, 7.0];
        let out = convolve(&data, &[1.0]);
        assert_eq!(out, data);
    }

    #[test]
    fn interp_reproduces_linear_function() {
        let x_old = linspace(0.0, 10.0, 11);
        let y_old: Vec<f64> = x_old.iter().map(|&x| 2.0 * x + 1.0).collect();
        let x_new = vec![0.5, 3.3, 9.9];
        let y_new = interp(&x_new, &x_old, &y_old, None, None);
        for (x, y) in x_new.iter().zip(y_new.iter()) {
            assert!((y - (2.0 * x + 1.0)).abs() < 1e-9);
        }
    }

    #[test]
    fn interp_clamps_out_of_range() {
        let x_old = vec![0.0, 1.0, 2.0];
        let y_old = vec![10.0, 20.0, 30.0];
        let y_new = interp(&[-5.0, 10.0], &x_old, &y_old, Some(-1.0), Some(99.0));
        assert_eq!(y_new, vec![-1.0, 99.0]);
    }

    #[test]
    fn meshgrid_shapes() {
        let x = linspace(0.0, 1.0, 3);
        let y = linspace(0.0, 2.0, 2);
        let (e, yy) = meshgrid(&x, &y);
        assert_eq!(e.len(), 6);
        assert_eq!(e[0], 0.0);
        assert_eq!(e[2], 1.0);
        assert_eq!(yy[0], 0.0);
        assert_eq!(yy[3], 2.0);
    }
}
