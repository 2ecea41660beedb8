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

//! Rectangular energy/position grids.
//!
//! The simulator runs the same pipeline over two grids sharing one layout:
//! a narrower "display" grid (what gets reported to callers) and a wider
//! "extended" grid (absorbs convolution edge effects before the result is
//! interpolated back down onto the display grid).

use crate::kernels::{linspace, meshgrid};

/// A rectangular product grid over an energy axis and a spatial (`y`) axis.
///
/// Mirrors the teacher's `EquidistantGrid1D`, generalized to two equidistant
/// axes combined into a mesh rather than one.
#[derive(Clone, Debug)]
pub struct Grid {
    pub e_axis: Vec<f64>,
    pub y_axis: Vec<f64>,
    /// Row-major `[y_steps][e_steps]` mesh of the energy axis.
    pub e_mesh: Vec<f64>,
    /// Row-major `[y_steps][e_steps]` mesh of the y axis.
    pub y_mesh: Vec<f64>,
    pub de: f64,
}

impl Grid {
    /// Builds a grid from `(e_start, e_end, e_steps, y_start, y_end, y_steps)`.
    ///
    /// # Panics
    /// Panics if either axis has fewer than 2 steps or is degenerate
    /// (`start == end`), since both would violate the strictly-monotonic-axis
    /// invariant.
    pub fn new(e_start: f64, e_end: f64, e_steps: usize, y_start: f64, y_end: f64, y_steps: usize) -> Self {
        assert!(e_steps >= 2, "e_steps must be >= 2");
        assert!(y_steps >= 2, "y_steps must be >= 2");
        assert!(e_end > e_start, "e_end must be greater than e_start");
        assert!(y_end > y_start, "y_end must be greater than y_start");
        let e_axis = linspace(e_start, e_end, e_steps);
        let y_axis = linspace(y_start, y_end, y_steps);
        let de = e_axis[1] - e_axis[0];
        let (e_mesh, y_mesh) = meshgrid(&e_axis, &y_axis);
        Grid { e_axis, y_axis, e_mesh, y_mesh, de }
    }

    pub fn e_steps(&self) -> usize {
        self.e_axis.len()
    }

    pub fn y_steps(&self) -> usize {
        self.y_axis.len()
    }

    /// Display grid default: `(-0.1, 0.1, 500, -10, 10, 200)` eV / mm.
    pub fn display_default() -> Self {
        Grid::new(-0.1, 0.1, 500, -10.0, 10.0, 200)
    }

    /// Extended grid default: `(-0.15, 0.15, 750, -10, 10, 200)` eV / mm.
    pub fn extended_default() -> Self {
        Grid::new(-0.15, 0.15, 750, -10.0, 10.0, 200)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axes_are_monotonic_and_sized_correctly() {
        let g = Grid::new(-1.0, 1.0, 5, 0.0, 4.0, 3);
        assert_eq!(g.e_axis.len(), 5);
        assert_eq!(g.y_axis.len(), 3);
        for w in g.e_axis.windows(2) {
            assert!(w[1] > w[0]);
        }
        for w in g.y_axis.windows(2) {
            assert!(w[1] > w[0]);
        }
        assert!((g.de - 0.5).abs() < 1e-12);
    }

    #[test]
    fn mesh_matches_row_major_layout() {
        let g = Grid::new(0.0, 1.0, 2, 0.0, 2.0, 2);
        // e_mesh[i][j] == e_axis[j]; y_mesh[i][j] == y_axis[i]
        assert_eq!(g.e_mesh[0 * 2 + 1], g.e_axis[1]);
        assert_eq!(g.y_mesh[1 * 2 + 0], g.y_axis[1]);
    }

    #[test]
    fn default_grids_match_spec() {
        let display = Grid::display_default();
        assert_eq!(display.e_steps(), 500);
        assert_eq!(display.y_steps(), 200);
        let extended = Grid::extended_default();
        assert_eq!(extended.e_steps(), 750);
    }
}
