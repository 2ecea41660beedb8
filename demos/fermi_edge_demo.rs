// Demo: simulate a spectrum then recover the Fermi-edge parameters from it.

use xps_irf::fit::fit_fermi_edge;
use xps_irf::simulator::{simulate, SimulatorParams};

fn main() {
    let params = SimulatorParams::default();
    let result = simulate(&params);
    println!("simulated sigma_combined = {:.4} meV", result.sigma_combined);

    let fit = fit_fermi_edge(&result.energy, &result.spectrum_clean, params.temp, false, true);
    if !fit.success {
        println!("fit failed: {}", fit.error_message.unwrap_or_default());
        return;
    }
    println!("ef_shift       = {:.6} eV (+/- {:.6})", fit.ef_shift, fit.ef_shift_error);
    println!("sigma_total    = {:.6} eV (+/- {:.6})", fit.sigma_total, fit.sigma_total_error);
    println!("amplitude      = {:.4}", fit.amplitude);
    println!("offset         = {:.4}", fit.offset);
    println!("r_squared      = {:.6}", fit.r_squared);
}
