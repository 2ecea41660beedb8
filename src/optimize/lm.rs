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

//! Levenberg-Marquardt local refinement for nonlinear least squares.
//!
//! Every numerical degeneracy this solver can hit (a singular normal-
//! equations system, an ill-conditioned covariance) is absorbed locally per
//! the error handling design - this module never returns a `Result`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Forward-difference step for the Jacobian.
const JACOBIAN_STEP: f64 = 1e-7;
/// Floor added to each diagonal entry before Levenberg-Marquardt damping, so
/// that a zero diagonal never zeroes out the damping term entirely.
const DAMPING_FLOOR: f64 = 1e-10;
/// Regularization injected in place of a near-zero pivot during Gaussian
/// elimination, rather than failing the solve.
const PIVOT_FLOOR: f64 = 1e-12;

/// Tuning knobs for [`LevenbergMarquardt`].
#[derive(Clone)]
pub struct LMOptions {
    max_iter: usize,
    tol: f64,
    lambda0: f64,
    lambda_up: f64,
    lambda_down: f64,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for LMOptions {
    fn default() -> Self {
        LMOptions {
            max_iter: 100,
            tol: 1e-8,
            lambda0: 0.001,
            lambda_up: 10.0,
            lambda_down: 0.1,
            cancel: None,
        }
    }
}

impl LMOptions {
    pub fn max_iter(&mut self, max_iter: usize) -> &mut Self {
        self.max_iter = max_iter;
        self
    }

    pub fn tol(&mut self, tol: f64) -> &mut Self {
        self.tol = tol;
        self
    }

    pub fn lambda0(&mut self, lambda0: f64) -> &mut Self {
        self.lambda0 = lambda0;
        self
    }

    pub fn cancel_flag(&mut self, flag: Arc<AtomicBool>) -> &mut Self {
        self.cancel = Some(flag);
        self
    }
}

/// Result of a [`LevenbergMarquardt::run`] call.
#[derive(Clone, Debug)]
pub struct LMResult {
    pub x: Vec<f64>,
    pub residuals: Vec<f64>,
    pub jacobian: Vec<Vec<f64>>,
    pub covariance: Vec<Vec<f64>>,
    pub iterations: usize,
    pub converged: bool,
}

pub struct LevenbergMarquardt {
    options: LMOptions,
}

impl LevenbergMarquardt {
    pub fn new(options: LMOptions) -> Self {
        LevenbergMarquardt { options }
    }

    /// Minimizes `sum(r(p)^2)` starting from `p0`, where `r` returns the
    /// residual vector for a given parameter vector.
    pub fn run<F>(&self, r: F, p0: &[f64]) -> LMResult
    where
        F: Fn(&[f64]) -> Vec<f64>,
    {
        let p_dim = p0.len();
        let mut params = p0.to_vec();
        let mut residuals = r(&params);
        let mut jacobian = forward_difference_jacobian(&r, &params, &residuals);
        let mut cost = sum_sq(&residuals);
        let mut lambda = self.options.lambda0;
        let mut iterations = 0;
        let mut converged = false;

        for iter in 1..=self.options.max_iter {
            if let Some(flag) = &self.options.cancel {
                if flag.load(Ordering::Relaxed) {
                    break;
                }
            }
            iterations = iter;
            let (a, g) = normal_equations(&jacobian, &residuals);
            let mut damped = a.clone();
            for i in 0..p_dim {
                let diag_floor = a[i][i] + DAMPING_FLOOR;
                damped[i][i] = a[i][i] + lambda * diag_floor;
            }
            let neg_g: Vec<f64> = g.iter().map(|v| -v).collect();
            let delta = solve_linear_system(&damped, &neg_g);

            let mut candidate = params.clone();
            for i in 0..p_dim {
                candidate[i] += delta[i];
            }
            let candidate_residuals = r(&candidate);
            let candidate_cost = sum_sq(&candidate_residuals);

            let max_delta = delta.iter().cloned().fold(0.0_f64, |acc, v| acc.max(v.abs()));

            if candidate_cost < cost {
                let improvement = cost - candidate_cost;
                params = candidate;
                residuals = candidate_residuals;
                lambda *= self.options.lambda_down;
                jacobian = forward_difference_jacobian(&r, &params, &residuals);
                let stalled = improvement < self.options.tol * cost || max_delta < self.options.tol;
                cost = candidate_cost;
                if stalled {
                    converged = true;
                    break;
                }
            } else {
                lambda *= self.options.lambda_up;
            }
        }

        let covariance = covariance_from_jacobian(&jacobian, cost, residuals.len(), p_dim);

        LMResult { x: params, residuals, jacobian, covariance, iterations, converged }
    }
}

fn sum_sq(v: &[f64]) -> f64 {
    v.iter().map(|x| x * x).sum()
}

/// `J[i][j] = (r_j(p + delta*e_j)[i] - r[i]) / delta`.
fn forward_difference_jacobian<F>(r: &F, params: &[f64], base_residuals: &[f64]) -> Vec<Vec<f64>>
where
    F: Fn(&[f64]) -> Vec<f64>,
{
    let n = base_residuals.len();
    let p_dim = params.len();
    let mut jacobian = vec![vec![0.0; p_dim]; n];
    for j in 0..p_dim {
        let mut perturbed = params.to_vec();
        perturbed[j] += JACOBIAN_STEP;
        let perturbed_residuals = r(&perturbed);
        for i in 0..n {
            jacobian[i][j] = (perturbed_residuals[i] - base_residuals[i]) / JACOBIAN_STEP;
        }
    }
    jacobian
}

/// `A = J^T J`, `g = J^T r`.
fn normal_equations(jacobian: &[Vec<f64>], residuals: &[f64]) -> (Vec<Vec<f64>>, Vec<f64>) {
    let n = jacobian.len();
    let p_dim = if n > 0 { jacobian[0].len() } else { 0 };
    let mut a = vec![vec![0.0; p_dim]; p_dim];
    let mut g = vec![0.0; p_dim];
    for i in 0..p_dim {
        for j in 0..p_dim {
            let mut sum = 0.0;
            for row in jacobian.iter() {
                sum += row[i] * row[j];
            }
            a[i][j] = sum;
        }
        let mut sum = 0.0;
        for k in 0..n {
            sum += jacobian[k][i] * residuals[k];
        }
        g[i] = sum;
    }
    (a, g)
}

/// Gaussian elimination with partial pivoting. Pivots with magnitude below
/// [`PIVOT_FLOOR`] are regularized in place rather than failing the solve.
fn solve_linear_system(a: &[Vec<f64>], b: &[f64]) -> Vec<f64> {
    let n = a.len();
    let mut m: Vec<Vec<f64>> = a.iter().cloned().collect();
    let mut rhs = b.to_vec();

    for col in 0..n {
        let mut pivot_row = col;
        let mut pivot_val = m[col][col].abs();
        for row in (col + 1)..n {
            if m[row][col].abs() > pivot_val {
                pivot_val = m[row][col].abs();
                pivot_row = row;
            }
        }
        if pivot_row != col {
            m.swap(col, pivot_row);
            rhs.swap(col, pivot_row);
        }
        if m[col][col].abs() < PIVOT_FLOOR {
            m[col][col] += PIVOT_FLOOR;
        }
        for row in (col + 1)..n {
            let factor = m[row][col] / m[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let mut sum = rhs[row];
        for k in (row + 1)..n {
            sum -= m[row][k] * x[k];
        }
        x[row] = sum / m[row][row];
    }
    x
}

/// Inverts `a` by solving `a * x_k = e_k` for each unit vector `e_k`.
fn invert_matrix(a: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let n = a.len();
    let mut inverse = vec![vec![0.0; n]; n];
    for col in 0..n {
        let mut e = vec![0.0; n];
        e[col] = 1.0;
        let x = solve_linear_system(a, &e);
        for row in 0..n {
            inverse[row][col] = x[row];
        }
    }
    inverse
}

/// Regularizes `J^T J`, inverts it and scales by the residual variance. Falls
/// back to a diagonal proxy if the inverse is non-finite or implausibly
/// large, per the covariance design in the component spec.
fn covariance_from_jacobian(jacobian: &[Vec<f64>], cost: f64, n: usize, p_dim: usize) -> Vec<Vec<f64>> {
    if p_dim == 0 {
        return vec![];
    }
    let (mut a, _) = normal_equations(jacobian, &vec![0.0; n]);
    for i in 0..p_dim {
        a[i][i] += DAMPING_FLOOR;
    }
    let variance = cost / (n.saturating_sub(p_dim)).max(1) as f64;
    let inverse = invert_matrix(&a);

    let max_abs = inverse.iter().flatten().cloned().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    let all_finite = inverse.iter().flatten().all(|v| v.is_finite());
    if !all_finite || max_abs > 1e10 {
        let mut fallback = vec![vec![0.0; p_dim]; p_dim];
        for i in 0..p_dim {
            fallback[i][i] = variance * 0.01;
        }
        return fallback;
    }
    inverse.into_iter().map(|row| row.into_iter().map(|v| v * variance).collect()).collect()
}
