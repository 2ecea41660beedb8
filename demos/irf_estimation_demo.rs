// Demo: simulate a spectrum then re-estimate the full IRF parameter vector
// from it via Differential Evolution.

use xps_irf::fit::estimate_irf;
use xps_irf::simulator::{simulate, SimulatorParams};

fn main() {
    let truth = SimulatorParams::default();
    let observed = simulate(&truth).spectrum_clean;

    println!("running IRF estimation (this runs the forward simulator once per trial vector)...");
    let result = estimate_irf(&observed, truth.temp, None, Some(50));

    println!("final_loss  = {:.8}", result.final_loss);
    println!("iterations  = {}", result.iterations);
    println!("evaluations = {}", result.evaluations);
    println!();
    println!("{:>10} {:>12} {:>12}", "param", "truth", "fitted");
    println!("{:>10} {:>12.4} {:>12.4}", "kappa", truth.kappa, result.kappa);
    println!("{:>10} {:>12.4} {:>12.4}", "theta", truth.theta, result.theta);
    println!("{:>10} {:>12.4} {:>12.4}", "sigma_res", truth.sigma_res, result.sigma_res);
    println!("{:>10} {:>12.4} {:>12.4}", "alpha", truth.alpha, result.alpha);
    println!("{:>10} {:>12.4} {:>12.4}", "sigma_x", truth.sigma_x, result.sigma_x);
    println!("{:>10} {:>12.4} {:>12.4}", "sigma_y", truth.sigma_y, result.sigma_y);
    println!("{:>10} {:>12.4} {:>12.4}", "gamma_x", truth.gamma_x, result.gamma_x);
    println!("{:>10} {:>12.4} {:>12.4}", "gamma_y", truth.gamma_y, result.gamma_y);
}
