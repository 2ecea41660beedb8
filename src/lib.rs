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

//! Forward simulator and inverse fitter for the instrumental response
//! function of a near-Fermi-edge XPS measurement.
//!
//! Usage
//! -----
//!
//! Run the forward model for a given set of physical parameters:
//!
//! ```
//! use xps_irf::simulator::{simulate, SimulatorParams};
//!
//! let params = SimulatorParams::default();
//! let result = simulate(&params);
//! assert_eq!(result.spectrum.len(), result.energy.len());
//! ```
//!
//! Fit an analytic Fermi-edge model to an observed spectrum:
//!
//! ```
//! use xps_irf::fit::fit_fermi_edge;
//!
//! # let energy = xps_irf::kernels::linspace(-0.05, 0.05, 50);
//! # let observed: Vec<f64> = energy.iter().map(|&e| 1.0/(1.0+(e/0.003).exp())).collect();
//! let result = fit_fermi_edge(&energy, &observed, 5.0, false, true);
//! assert!(result.success);
//! ```

pub mod error;
pub mod fit;
pub mod grid;
pub mod kernels;
pub mod optimize;
pub mod simulator;
pub mod worker;

pub use error::FitError;
