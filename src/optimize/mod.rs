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

//! Bounded global optimization (Differential Evolution), local refinement
//! (Levenberg-Marquardt), and their composition (`curve_fit`).

pub(crate) mod prng;

pub mod curve_fit;
pub mod de;
pub mod lm;

pub use curve_fit::{curve_fit, CurveFitOptions, CurveFitResult};
pub use de::{DEOptions, DEResult, DifferentialEvolution, OptimizationBounds};
pub use lm::{LMOptions, LMResult, LevenbergMarquardt};
