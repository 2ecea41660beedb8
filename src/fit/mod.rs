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

//! The two user-facing fitting APIs, both built on [`crate::optimize`]:
//! Fermi-edge fitting of an analytic model, and full IRF parameter
//! estimation against the forward simulator.

pub mod fermi_edge;
pub mod irf;

pub use fermi_edge::{fit_fermi_edge, FermiEdgeFitResult};
pub use irf::{estimate_irf, IRFEstimationResult};
