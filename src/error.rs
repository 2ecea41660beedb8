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

//! Error type for invalid caller input and the worker message boundary.
//!
//! Numerical degeneracies inside the optimizers (a singular LM system, an
//! ill-conditioned covariance) are absorbed where they occur and never reach
//! this type - see the module docs on [`crate::optimize::lm`].

use std::error::Error;
use std::fmt;

/// Failure kinds that can be reported back across the fitting API / worker
/// boundary. Every variant's [`Display`](fmt::Display) text is the exact
/// string placed into the corresponding result's `error_message`/`message`
/// field, or into a [`crate::worker::WorkerResponse::Error`].
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// An input array that must contain at least one sample was empty.
    EmptyInput(&'static str),
    /// Two arrays that are required to have matching lengths did not.
    LengthMismatch { what: &'static str, a: usize, b: usize },
    /// An input value was `NaN` or infinite where a finite value is required.
    NonFiniteInput(&'static str),
    /// A worker message carried a `type` discriminator this crate does not
    /// recognize.
    UnknownMessageType,
    /// A caller-supplied pair of optimization bounds was malformed: wrong
    /// dimension count, mismatched `lower`/`upper` lengths, or a `lower[i]`
    /// exceeding its `upper[i]`.
    InvalidBounds(&'static str),
    /// A request was submitted while another was still running.
    AlreadyRunning,
    /// The in-flight request was cancelled before it produced a result.
    Cancelled,
}

impl Error for FitError {}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitError::EmptyInput(what) => write!(f, "{what} must not be empty"),
            FitError::LengthMismatch { what, a, b } => {
                write!(f, "{what} length mismatch: {a} != {b}")
            }
            FitError::NonFiniteInput(what) => write!(f, "{what} contains a non-finite value"),
            FitError::UnknownMessageType => write!(f, "Unknown message type"),
            FitError::InvalidBounds(why) => write!(f, "{why}"),
            FitError::AlreadyRunning => write!(f, "A fit request is already running"),
            FitError::Cancelled => write!(f, "Operation cancelled"),
        }
    }
}

/// Checks that `energy` and `observed` are non-empty, equal length, and
/// entirely finite. Used at the top of both fitting entry points per the
/// "invalid input" error kind in the error handling design.
pub(crate) fn validate_spectrum(energy: &[f64], observed: &[f64]) -> Result<(), FitError> {
    if energy.is_empty() {
        return Err(FitError::EmptyInput("energy"));
    }
    if observed.is_empty() {
        return Err(FitError::EmptyInput("observed spectrum"));
    }
    if energy.len() != observed.len() {
        return Err(FitError::LengthMismatch {
            what: "energy/observed spectrum",
            a: energy.len(),
            b: observed.len(),
        });
    }
    if energy.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteInput("energy"));
    }
    if observed.iter().any(|v| !v.is_finite()) {
        return Err(FitError::NonFiniteInput("observed spectrum"));
    }
    Ok(())
}
