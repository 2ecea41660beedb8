use criterion::{criterion_group, criterion_main, Criterion};

use xps_irf::fit::fit_fermi_edge;
use xps_irf::kernels::linspace;

fn fit_a_fermi_edge() {
    let energy = linspace(-0.05, 0.05, 200);
    let observed: Vec<f64> = energy.iter().map(|&e| 1.0 / (1.0 + (e / 0.003).exp())).collect();
    let result = fit_fermi_edge(&energy, &observed, 5.0, false, true);
    criterion::black_box(result);
}

fn my_benchmark(c: &mut Criterion) {
    c.bench_function("fit_fermi_edge_de_then_lm", |b| b.iter(fit_a_fermi_edge));
}

criterion_group! {
    name = benches;
    config = Criterion::default().sample_size(10);
    targets = my_benchmark
}
criterion_main!(benches);
