//! KS2D and SPI throughput benchmarks.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use spi_core::divergence::{ks2d2s, PValueMethod};
use spi_core::{BackendConfig, DistributionModel, NativeBackend, Sample};

fn draw(n: usize, seed: u64) -> Sample {
    let mut model =
        DistributionModel::with_backend(Arc::new(NativeBackend::new(BackendConfig::default())));
    model
        .define_params([0.1, 0.3], [[0.15, -0.06], [-0.06, 0.1]], [0.8, -0.7])
        .expect("valid parameters");
    model.sample(n, &mut ChaCha8Rng::seed_from_u64(seed)).expect("sample").clone()
}

fn bench_ks2d_analytic(c: &mut Criterion) {
    let mut group = c.benchmark_group("ks2d_analytic");
    for &n in &[100usize, 500, 1000] {
        let a = draw(n, 1);
        let b = draw(n, 2);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, _| {
            bench.iter(|| ks2d2s(black_box(&a), black_box(&b), PValueMethod::Analytic))
        });
    }
    group.finish();
}

fn bench_ks2d_bootstrap(c: &mut Criterion) {
    let a = draw(200, 3);
    let b = draw(200, 4);
    let method = PValueMethod::Bootstrap { nboot: 100, seed: 7 };
    c.bench_function("ks2d_bootstrap_200x100", |bench| {
        bench.iter(|| ks2d2s(black_box(&a), black_box(&b), method))
    });
}

criterion_group!(benches, bench_ks2d_analytic, bench_ks2d_bootstrap);
criterion_main!(benches);
