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

//! Differential Evolution (DE/rand/1/bin), the global optimizer used both
//! directly (IRF parameter estimation) and as the first stage of
//! [`crate::optimize::curve_fit`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::prng::Mulberry32;

/// Paired per-dimension lower/upper bounds for a bounded optimization.
#[derive(Clone, Debug)]
pub struct OptimizationBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl OptimizationBounds {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(lower.len(), upper.len(), "bounds must have matching lengths");
        for (l, u) in lower.iter().zip(upper.iter()) {
            assert!(l <= u, "lower bound must not exceed upper bound");
        }
        OptimizationBounds { lower, upper }
    }

    pub fn dim(&self) -> usize {
        self.lower.len()
    }

    fn clamp(&self, x: &mut [f64]) {
        for (v, (lo, hi)) in x.iter_mut().zip(self.lower.iter().zip(self.upper.iter())) {
            *v = v.clamp(*lo, *hi);
        }
    }
}

/// Tuning knobs for [`DifferentialEvolution`], following the teacher's
/// `RKF45Solver` builder idiom (`with_*` setters returning `&mut Self`).
#[derive(Clone)]
pub struct DEOptions {
    max_iter: usize,
    pop: usize,
    f: f64,
    cr: f64,
    tol: f64,
    seed: u32,
    cancel: Option<Arc<AtomicBool>>,
}

impl Default for DEOptions {
    fn default() -> Self {
        DEOptions {
            max_iter: 100,
            pop: 15,
            f: 0.8,
            cr: 0.7,
            tol: 1e-8,
            seed: 42,
            cancel: None,
        }
    }
}

impl DEOptions {
    pub fn max_iter(&mut self, max_iter: usize) -> &mut Self {
        self.max_iter = max_iter;
        self
    }

    pub fn pop(&mut self, pop: usize) -> &mut Self {
        self.pop = pop;
        self
    }

    pub fn f(&mut self, f: f64) -> &mut Self {
        self.f = f;
        self
    }

    pub fn cr(&mut self, cr: f64) -> &mut Self {
        self.cr = cr;
        self
    }

    pub fn tol(&mut self, tol: f64) -> &mut Self {
        self.tol = tol;
        self
    }

    pub fn seed(&mut self, seed: u32) -> &mut Self {
        self.seed = seed;
        self
    }

    /// Installs a cooperative cancellation flag, polled once per generation
    /// (see the concurrency model in the crate's top-level documentation).
    pub fn cancel_flag(&mut self, flag: Arc<AtomicBool>) -> &mut Self {
        self.cancel = Some(flag);
        self
    }
}

/// Result of a [`DifferentialEvolution::run`] call.
#[derive(Clone, Debug)]
pub struct DEResult {
    pub x: Vec<f64>,
    pub fitness: f64,
    pub iterations: usize,
    pub converged: bool,
}

/// DE/rand/1/bin differential evolution over bounded real vectors, seeded by
/// [`Mulberry32`] for cross-implementation reproducibility.
pub struct DifferentialEvolution {
    options: DEOptions,
}

impl DifferentialEvolution {
    pub fn new(options: DEOptions) -> Self {
        DifferentialEvolution { options }
    }

    /// Minimizes `objective` over `bounds`, calling `on_progress(iteration,
    /// best_fitness)` once after each generation's sweep if provided.
    pub fn run<F, P>(&self, objective: F, bounds: &OptimizationBounds, mut on_progress: P) -> DEResult
    where
        F: Fn(&[f64]) -> f64,
        P: FnMut(usize, f64),
    {
        let dim = bounds.dim();
        let pop_size = self.options.pop;
        let mut rng = Mulberry32::new(self.options.seed);

        let mut population: Vec<Vec<f64>> = (0..pop_size)
            .map(|_| {
                (0..dim)
                    .map(|j| rng.next_range(bounds.lower[j], bounds.upper[j]))
                    .collect()
            })
            .collect();
        let mut fitness: Vec<f64> = population.iter().map(|x| objective(x)).collect();

        let mut best_idx = argmin(&fitness);
        let mut best_fitness = fitness[best_idx];
        let mut iterations = 0;
        let mut converged = false;

        for iter in 1..=self.options.max_iter {
            if let Some(flag) = &self.options.cancel {
                if flag.load(Ordering::Relaxed) {
                    break;
                }
            }
            let prev_best = best_fitness;
            for i in 0..pop_size {
                let (a, b, c) = distinct_triplet(&mut rng, pop_size, i);
                let mut trial = vec![0.0; dim];
                let forced_dim = rng.next_index(dim);
                for j in 0..dim {
                    let donor = population[a][j] + self.options.f * (population[b][j] - population[c][j]);
                    trial[j] = if rng.next_f64() < self.options.cr || j == forced_dim {
                        donor
                    } else {
                        population[i][j]
                    };
                }
                bounds.clamp(&mut trial);
                let trial_fitness = objective(&trial);
                if trial_fitness < fitness[i] {
                    population[i] = trial;
                    fitness[i] = trial_fitness;
                    if trial_fitness < best_fitness {
                        best_fitness = trial_fitness;
                        best_idx = i;
                    }
                }
            }
            iterations = iter;
            on_progress(iter, best_fitness);
            if (best_fitness - prev_best).abs() < self.options.tol {
                converged = true;
                break;
            }
        }

        DEResult {
            x: population[best_idx].clone(),
            fitness: best_fitness,
            iterations,
            converged,
        }
    }
}

fn argmin(values: &[f64]) -> usize {
    let mut best = 0;
    for i in 1..values.len() {
        if values[i] < values[best] {
            best = i;
        }
    }
    best
}

/// Draws three indices in `0..pop_size`, all distinct from each other and
/// from `exclude`.
fn distinct_triplet(rng: &mut Mulberry32, pop_size: usize, exclude: usize) -> (usize, usize, usize) {
    let draw_excluding = |rng: &mut Mulberry32, excluded: &[usize]| loop {
        let candidate = rng.next_index(pop_size);
        if !excluded.contains(&candidate) {
            return candidate;
        }
    };
    let a = draw_excluding(rng, &[exclude]);
    let b = draw_excluding(rng, &[exclude, a]);
    let c = draw_excluding(rng, &[exclude, a, b]);
    (a, b, c)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sphere_like(x: &[f64]) -> f64 {
        (x[0] - 1.0).powi(2) + (x[1] + 2.0).powi(2)
    }

    #[test]
    fn converges_on_a_simple_quadratic() {
        let bounds = OptimizationBounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]);
        let de = DifferentialEvolution::new(DEOptions::default());
        let result = de.run(sphere_like, &bounds, |_, _| {});
        assert!(result.fitness < 1e-6);
        assert!((result.x[0] - 1.0).abs() < 1e-2);
        assert!((result.x[1] + 2.0).abs() < 1e-2);
    }

    #[test]
    fn identical_seed_gives_identical_trajectory() {
        let bounds = OptimizationBounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]);
        let de = DifferentialEvolution::new(DEOptions::default());
        let mut trace_a = vec![];
        let mut trace_b = vec![];
        de.run(sphere_like, &bounds, |it, fit| trace_a.push((it, fit)));
        de.run(sphere_like, &bounds, |it, fit| trace_b.push((it, fit)));
        assert_eq!(trace_a, trace_b);
    }

    #[test]
    fn different_seed_changes_the_trajectory() {
        let bounds = OptimizationBounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]);
        let mut opts_b = DEOptions::default();
        opts_b.seed(7);
        let de_a = DifferentialEvolution::new(DEOptions::default());
        let de_b = DifferentialEvolution::new(opts_b);
        let a = de_a.run(sphere_like, &bounds, |_, _| {});
        let b = de_b.run(sphere_like, &bounds, |_, _| {});
        assert_ne!(a.x, b.x);
    }

    #[test]
    fn progress_callback_fires_once_per_generation() {
        let bounds = OptimizationBounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]);
        let mut options = DEOptions::default();
        options.max_iter(20).tol(0.0); // disable early convergence
        let de = DifferentialEvolution::new(options);
        let mut iterations = vec![];
        de.run(sphere_like, &bounds, |it, _| iterations.push(it));
        assert_eq!(iterations, (1..=20).collect::<Vec<_>>());
    }

    #[test]
    fn cancellation_flag_stops_iteration_early() {
        let bounds = OptimizationBounds::new(vec![-5.0, -5.0], vec![5.0, 5.0]);
        let flag = Arc::new(AtomicBool::new(false));
        let mut options = DEOptions::default();
        options.max_iter(1000).tol(0.0).cancel_flag(flag.clone());
        let de = DifferentialEvolution::new(options);
        let flag_for_callback = flag.clone();
        let mut count = 0;
        de.run(
            sphere_like,
            &bounds,
            |it, _| {
                count = it;
                if it == 3 {
                    flag_for_callback.store(true, Ordering::Relaxed);
                }
            },
        );
        assert!(count < 1000);
    }
}
