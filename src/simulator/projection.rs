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

//! Projection of the 2D emission image through detector geometry (rotation
//! tilt + parabolic "smile" curvature) down to a 1D spectrum.

/// Bilinear sample of a row-major `[y_steps][e_steps]` image at
/// `(y_query, e_query)` over the given axes. Returns 0 for any query outside
/// the axis range, matching the "out-of-range returns 0" rule for the
/// detector-distortion projection.
fn bilinear_sample(image: &[f64], y_axis: &[f64], e_axis: &[f64], y_query: f64, e_query: f64) -> f64 {
    let ny = y_axis.len();
    let nx = e_axis.len();
    if y_query < y_axis[0] || y_query > y_axis[ny - 1] || e_query < e_axis[0] || e_query > e_axis[nx - 1] {
        return 0.0;
    }
    let dy = if ny > 1 { y_axis[1] - y_axis[0] } else { 1.0 };
    let de = if nx > 1 { e_axis[1] - e_axis[0] } else { 1.0 };
    let fi = ((y_query - y_axis[0]) / dy).clamp(0.0, (ny - 1) as f64);
    let fj = ((e_query - e_axis[0]) / de).clamp(0.0, (nx - 1) as f64);
    let i0 = fi.floor() as usize;
    let j0 = fj.floor() as usize;
    let i1 = (i0 + 1).min(ny - 1);
    let j1 = (j0 + 1).min(nx - 1);
    let ti = fi - i0 as f64;
    let tj = fj - j0 as f64;

    let v00 = image[i0 * nx + j0];
    let v01 = image[i0 * nx + j1];
    let v10 = image[i1 * nx + j0];
    let v11 = image[i1 * nx + j1];
    let v0 = v00 * (1.0 - tj) + v01 * tj;
    let v1 = v10 * (1.0 - tj) + v11 * tj;
    v0 * (1.0 - ti) + v1 * ti
}

/// Projects the 2D `emission` image (row-major `[y_steps][e_steps]` over
/// `y_axis`/`e_axis`) through a detector rotated by `theta_deg` with smile
/// curvature `kappa`, returning the column-summed 1D spectrum (length
/// `e_axis.len()`).
pub(crate) fn project_to_1d(emission: &[f64], y_axis: &[f64], e_axis: &[f64], theta_deg: f64, kappa: f64) -> Vec<f64> {
    let theta_rad = theta_deg.to_radians();
    let (sin_t, cos_t) = theta_rad.sin_cos();
    let y_max = y_axis.iter().fold(0.0_f64, |acc, &y| acc.max(y.abs())).max(1e-12);
    let ny = y_axis.len();
    let nx = e_axis.len();
    let mut spec_1d = vec![0.0; nx];
    for i in 0..ny {
        let y = y_axis[i];
        let y_norm = y / y_max;
        for j in 0..nx {
            let e = e_axis[j];
            let e_src = e * cos_t + y * sin_t;
            let y_src = -e * sin_t + y * cos_t;
            let e_src_curved = e_src - kappa * y_norm * y_norm;
            spec_1d[j] += bilinear_sample(emission, y_axis, e_axis, y_src, e_src_curved);
        }
    }
    spec_1d
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::linspace;

    #[test]
    fn zero_distortion_is_a_column_sum() {
        let e_axis = linspace(-1.0, 1.0, 5);
        let y_axis = linspace(-1.0, 1.0, 3);
        let emission: Vec<f64> = (0..15).map(|i| i as f64).collect();
        let spec = project_to_1d(&emission, &y_axis, &e_axis, 0.0, 0.0);
        for j in 0..5 {
            let expected: f64 = (0..3).map(|i| emission[i * 5 + j]).sum();
            assert!((spec[j] - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn out_of_range_bilinear_sample_is_zero() {
        let y_axis = linspace(-1.0, 1.0, 3);
        let e_axis = linspace(-1.0, 1.0, 3);
        let image = vec![1.0; 9];
        assert_eq!(bilinear_sample(&image, &y_axis, &e_axis, 5.0, 0.0), 0.0);
        assert_eq!(bilinear_sample(&image, &y_axis, &e_axis, 0.0, -5.0), 0.0);
    }
}
