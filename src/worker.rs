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

//! Computation side of the fitting worker contract: request/response message
//! types and the `idle -> running -> {success, error, cancelled}` state
//! machine, with a cooperative cancellation flag.
//!
//! Everything an actual host needs to run this off the UI path - a thread, a
//! `postMessage` channel, a socket, and the choice of wire format (JSON,
//! bincode, ...) - is deliberately left to the host; this module only
//! dispatches an already-deserialized request to the right fitter and
//! produces the response messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::FitError;
use crate::fit::fermi_edge::{fit_fermi_edge_with_progress, FermiEdgeFitResult};
use crate::fit::irf::{estimate_irf_with_progress, IRFEstimationResult};
use crate::optimize::OptimizationBounds;

/// Request messages accepted by [`FitWorker::handle`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerRequest {
    FitFermiEdge {
        id: String,
        energy: Vec<f64>,
        observed_spectrum: Vec<f64>,
        temp: f64,
        fit_temp: bool,
        use_global_opt: bool,
    },
    EstimateIRF {
        id: String,
        observed_spectrum: Vec<f64>,
        temp: f64,
        #[serde(default)]
        bounds: Option<IRFBounds>,
        #[serde(default)]
        max_iterations: Option<usize>,
    },
}

/// Wire representation of [`OptimizationBounds`] for the `EstimateIRF`
/// request, since `OptimizationBounds` itself carries no serde impl.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IRFBounds {
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl From<IRFBounds> for OptimizationBounds {
    fn from(b: IRFBounds) -> Self {
        OptimizationBounds::new(b.lower, b.upper)
    }
}

impl IRFBounds {
    /// Checks the wire bounds before they are trusted as input to
    /// `OptimizationBounds::new`, which asserts (and panics) on a dimension
    /// mismatch or an inverted `lower[i] > upper[i]` pair rather than
    /// returning a `Result` - safe for this crate's own hardcoded bounds,
    /// not for a caller-supplied message off the wire.
    fn validate(&self) -> Result<(), FitError> {
        if self.lower.len() != self.upper.len() {
            return Err(FitError::LengthMismatch {
                what: "IRF bounds lower/upper",
                a: self.lower.len(),
                b: self.upper.len(),
            });
        }
        if self.lower.len() != crate::fit::irf::PARAM_COUNT {
            return Err(FitError::LengthMismatch {
                what: "IRF bounds",
                a: self.lower.len(),
                b: crate::fit::irf::PARAM_COUNT,
            });
        }
        if self.lower.iter().zip(self.upper.iter()).any(|(l, u)| l > u) {
            return Err(FitError::InvalidBounds("IRF bounds: lower must not exceed upper"));
        }
        Ok(())
    }
}

/// The union of fit result payloads a `Result` response can carry.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FitOutcome {
    FermiEdge(FermiEdgeFitResultWire),
    Irf(IRFEstimationResultWire),
}

/// Response messages produced by [`FitWorker::handle`].
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkerResponse {
    Progress { id: String, iteration: usize, fitness: f64, progress: f64 },
    Result { id: String, result: FitOutcome },
    Error { id: String, error: String },
}

/// State of the single in-flight request a [`FitWorker`] can hold.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum State {
    Idle,
    Running,
}

/// Runs one fit request at a time, enforcing the `idle -> running ->
/// {success, error, cancelled}` lifecycle: a second request submitted while
/// one is running is rejected synchronously rather than queued.
pub struct FitWorker {
    state: State,
    cancel: Arc<AtomicBool>,
}

impl Default for FitWorker {
    fn default() -> Self {
        FitWorker::new()
    }
}

impl FitWorker {
    pub fn new() -> Self {
        FitWorker { state: State::Idle, cancel: Arc::new(AtomicBool::new(false)) }
    }

    /// A clone of the cooperative cancellation flag; a host may set it from
    /// another thread to request early termination of the in-flight request
    /// without tearing down the worker itself.
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        self.cancel.clone()
    }

    /// Requests cancellation of the current request, if any.
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Relaxed);
    }

    /// Dispatches `request`, forwarding every `Progress` message produced
    /// along the way to `on_message` before the terminal `Result` or `Error`
    /// message, matching the ordering guarantee in the worker contract.
    /// Returns the request's `id` unchanged on the terminal message.
    pub fn handle<F>(&mut self, request: WorkerRequest, mut on_message: F)
    where
        F: FnMut(WorkerResponse),
    {
        if self.state == State::Running {
            let id = request_id(&request).to_string();
            on_message(WorkerResponse::Error { id, error: FitError::AlreadyRunning.to_string() });
            return;
        }

        self.state = State::Running;
        self.cancel.store(false, Ordering::Relaxed);
        let cancel = self.cancel.clone();

        match request {
            WorkerRequest::FitFermiEdge { id, energy, observed_spectrum, temp, fit_temp, use_global_opt } => {
                const NOMINAL_MAX_ITERATIONS: f64 = 100.0;
                let id_for_progress = id.clone();
                let result = fit_fermi_edge_with_progress(
                    &energy,
                    &observed_spectrum,
                    temp,
                    fit_temp,
                    use_global_opt,
                    Some(cancel.clone()),
                    |iteration, fitness| {
                        on_message(WorkerResponse::Progress {
                            id: id_for_progress.clone(),
                            iteration,
                            fitness,
                            progress: (iteration as f64 / NOMINAL_MAX_ITERATIONS * 100.0).min(100.0),
                        });
                    },
                );
                self.finish(&cancel, id, FitOutcome::FermiEdge(result.into()), &mut on_message);
            }
            WorkerRequest::EstimateIRF { id, observed_spectrum, temp, bounds, max_iterations } => {
                if let Some(b) = &bounds {
                    if let Err(e) = b.validate() {
                        self.state = State::Idle;
                        on_message(WorkerResponse::Error { id, error: e.to_string() });
                        return;
                    }
                }
                let max_iter = max_iterations.unwrap_or(50);
                let id_for_progress = id.clone();
                let result = estimate_irf_with_progress(
                    &observed_spectrum,
                    temp,
                    bounds.map(Into::into),
                    Some(max_iter),
                    Some(cancel.clone()),
                    |iteration, fitness| {
                        on_message(WorkerResponse::Progress {
                            id: id_for_progress.clone(),
                            iteration,
                            fitness,
                            progress: (iteration as f64 / max_iter as f64 * 100.0).min(100.0),
                        });
                    },
                );
                self.finish(&cancel, id, FitOutcome::Irf(result.into()), &mut on_message);
            }
        }
    }

    fn finish<F>(&mut self, cancel: &Arc<AtomicBool>, id: String, outcome: FitOutcome, on_message: &mut F)
    where
        F: FnMut(WorkerResponse),
    {
        self.state = State::Idle;
        if cancel.load(Ordering::Relaxed) {
            on_message(WorkerResponse::Error { id, error: FitError::Cancelled.to_string() });
        } else {
            on_message(WorkerResponse::Result { id, result: outcome });
        }
    }
}

fn request_id(request: &WorkerRequest) -> &str {
    match request {
        WorkerRequest::FitFermiEdge { id, .. } => id,
        WorkerRequest::EstimateIRF { id, .. } => id,
    }
}

/// Serde-friendly mirror of [`FermiEdgeFitResult`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FermiEdgeFitResultWire {
    pub success: bool,
    pub ef_shift: f64,
    pub ef_shift_error: f64,
    pub sigma_total: f64,
    pub sigma_total_error: f64,
    pub temp_fit: Option<f64>,
    pub temp_error: Option<f64>,
    pub amplitude: f64,
    pub offset: f64,
    pub fitted_spectrum: Vec<f64>,
    pub r_squared: f64,
    pub residuals: Vec<f64>,
    pub error_message: Option<String>,
}

impl From<FermiEdgeFitResult> for FermiEdgeFitResultWire {
    fn from(r: FermiEdgeFitResult) -> Self {
        FermiEdgeFitResultWire {
            success: r.success,
            ef_shift: r.ef_shift,
            ef_shift_error: r.ef_shift_error,
            sigma_total: r.sigma_total,
            sigma_total_error: r.sigma_total_error,
            temp_fit: r.temp_fit,
            temp_error: r.temp_error,
            amplitude: r.amplitude,
            offset: r.offset,
            fitted_spectrum: r.fitted_spectrum,
            r_squared: r.r_squared,
            residuals: r.residuals,
            error_message: r.error_message,
        }
    }
}

/// Serde-friendly mirror of [`IRFEstimationResult`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IRFEstimationResultWire {
    pub success: bool,
    pub kappa: f64,
    pub theta: f64,
    pub sigma_res: f64,
    pub alpha: f64,
    pub sigma_x: f64,
    pub sigma_y: f64,
    pub gamma_x: f64,
    pub gamma_y: f64,
    pub fitted_spectrum: Vec<f64>,
    pub estimated_irf: Vec<f64>,
    pub final_loss: f64,
    pub iterations: usize,
    pub evaluations: usize,
    pub message: String,
}

impl From<IRFEstimationResult> for IRFEstimationResultWire {
    fn from(r: IRFEstimationResult) -> Self {
        IRFEstimationResultWire {
            success: r.success,
            kappa: r.kappa,
            theta: r.theta,
            sigma_res: r.sigma_res,
            alpha: r.alpha,
            sigma_x: r.sigma_x,
            sigma_y: r.sigma_y,
            gamma_x: r.gamma_x,
            gamma_y: r.gamma_y,
            fitted_spectrum: r.fitted_spectrum,
            estimated_irf: r.estimated_irf,
            final_loss: r.final_loss,
            iterations: r.iterations,
            evaluations: r.evaluations,
            message: r.message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernels::linspace;

    fn sample_fermi_request(id: &str) -> WorkerRequest {
        let e = linspace(-0.05, 0.05, 100);
        let observed: Vec<f64> = e.iter().map(|&x| 1.0 / (1.0 + (x / 0.003).exp())).collect();
        WorkerRequest::FitFermiEdge {
            id: id.to_string(),
            energy: e,
            observed_spectrum: observed,
            temp: 5.0,
            fit_temp: false,
            use_global_opt: true,
        }
    }

    #[test]
    fn a_request_produces_progress_then_a_terminal_result() {
        let mut worker = FitWorker::new();
        let mut messages = vec![];
        worker.handle(sample_fermi_request("req-1"), |m| messages.push(m));
        assert!(messages.len() > 1);
        let (progress, terminal) = messages.split_at(messages.len() - 1);
        for m in progress {
            assert!(matches!(m, WorkerResponse::Progress { .. }));
        }
        assert!(matches!(terminal[0], WorkerResponse::Result { .. }));
    }

    #[test]
    fn a_second_request_while_running_would_be_rejected_synchronously() {
        let mut worker = FitWorker::new();
        worker.state = State::Running;
        let mut messages = vec![];
        worker.handle(sample_fermi_request("req-2"), |m| messages.push(m));
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            WorkerResponse::Error { error, .. } => assert_eq!(error, "A fit request is already running"),
            _ => panic!("expected an Error message"),
        }
    }

    #[test]
    fn unknown_message_type_yields_the_fixed_error_text() {
        // A host deserializing with serde_json (or any other serde format)
        // hits this before a request ever reaches `FitWorker::handle`; the
        // fixed text it should surface lives on `FitError` either way.
        let parsed: Result<WorkerRequest, _> = serde_json::from_str(r#"{"type":"NotARealRequest"}"#);
        assert!(parsed.is_err());
        assert_eq!(FitError::UnknownMessageType.to_string(), "Unknown message type");
    }

    #[test]
    fn serialized_fermi_edge_request_round_trips() {
        let request = sample_fermi_request("req-3");
        let json = serde_json::to_string(&request).unwrap();
        let parsed: WorkerRequest = serde_json::from_str(&json).unwrap();
        match parsed {
            WorkerRequest::FitFermiEdge { id, .. } => assert_eq!(id, "req-3"),
            _ => panic!("expected FitFermiEdge"),
        }
    }

    #[test]
    fn malformed_irf_bounds_are_rejected_without_panicking() {
        let mut worker = FitWorker::new();
        let mut messages = vec![];
        let request = WorkerRequest::EstimateIRF {
            id: "req-bad-bounds".to_string(),
            observed_spectrum: vec![0.1, 0.2, 0.3],
            temp: 5.0,
            bounds: Some(IRFBounds { lower: vec![0.0, 0.0], upper: vec![1.0, 1.0] }),
            max_iterations: Some(5),
        };
        worker.handle(request, |m| messages.push(m));
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            WorkerResponse::Error { error, .. } => assert_eq!(error, "IRF bounds length mismatch: 2 != 8"),
            _ => panic!("expected an Error message"),
        }
    }

    #[test]
    fn inverted_irf_bounds_are_rejected_without_panicking() {
        let mut worker = FitWorker::new();
        let mut messages = vec![];
        let request = WorkerRequest::EstimateIRF {
            id: "req-inverted-bounds".to_string(),
            observed_spectrum: vec![0.1, 0.2, 0.3],
            temp: 5.0,
            bounds: Some(IRFBounds { lower: vec![1.0; 8], upper: vec![0.0; 8] }),
            max_iterations: Some(5),
        };
        worker.handle(request, |m| messages.push(m));
        assert_eq!(messages.len(), 1);
        match &messages[0] {
            WorkerResponse::Error { error, .. } => assert_eq!(error, "IRF bounds: lower must not exceed upper"),
            _ => panic!("expected an Error message"),
        }
    }

    #[test]
    fn cooperative_cancellation_from_another_thread_is_reported_as_cancelled() {
        let mut worker = FitWorker::new();
        let cancel = worker.cancel_handle();
        std::thread::spawn(move || {
            std::thread::sleep(std::time::Duration::from_millis(1));
            cancel.store(true, Ordering::Relaxed);
        });
        let e = linspace(-0.05, 0.05, 100);
        let observed: Vec<f64> = e.iter().map(|&x| 1.0 / (1.0 + (x / 0.003).exp())).collect();
        let request = WorkerRequest::EstimateIRF {
            id: "req-4".to_string(),
            observed_spectrum: observed,
            temp: 5.0,
            bounds: None,
            max_iterations: Some(5000),
        };
        let mut messages = vec![];
        worker.handle(request, |m| messages.push(m));
        let last = messages.last().unwrap();
        match last {
            WorkerResponse::Error { error, .. } => assert_eq!(error, "Operation cancelled"),
            _ => panic!("expected an Error message reporting cancellation"),
        }
    }
}
