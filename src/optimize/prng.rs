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

//! Mulberry32 pseudorandom stream.
//!
//! This exact generator (not `rand`'s `SmallRng` or anything else) is part
//! of the external contract: Differential Evolution must produce
//! bit-identical trajectories for a given seed across implementations, so
//! the 32-bit wrapping arithmetic below is written out explicitly rather
//! than delegated to a general-purpose RNG crate.

/// Mulberry32 PRNG state.
#[derive(Clone, Debug)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    pub fn new(seed: u32) -> Self {
        Mulberry32 { state: seed }
    }

    /// Advances the stream and returns the next sample in `[0, 1)`.
    pub fn next_f64(&mut self) -> f64 {
        self.state = self.state.wrapping_add(0x6D2B79F5);
        let mut t = self.state;
        t = t ^ (t >> 15);
        t = t.wrapping_mul(t | 1);
        t ^= t.wrapping_add((t ^ (t >> 7)).wrapping_mul(t | 61));
        let result = t ^ (t >> 14);
        (result as f64) / 4294967296.0
    }

    /// A sample in `[low, high)`.
    pub fn next_range(&mut self, low: f64, high: f64) -> f64 {
        low + self.next_f64() * (high - low)
    }

    /// A uniformly distributed index in `0..n`.
    pub fn next_index(&mut self, n: usize) -> usize {
        ((self.next_f64() * n as f64) as usize).min(n - 1)
    }
}
