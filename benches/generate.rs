use criterion::{criterion_group, criterion_main, Criterion};
use densample::config::GenConfig;
use densample::direct::DirectSampler;
use densample::distributions::{DensityFunction, FnDensity};
use densample::foam::FoamGenerator;
use densample::johnson::Johnson;
use densample::parameter::Parameter;
use rand::rngs::SmallRng;
use rand::SeedableRng;
use std::hint::black_box;

fn johnson() -> Johnson {
    Johnson::new(
        Parameter::new("mass", 1.0, -2.0, 6.0),
        Parameter::new("mu", 1.0, -5.0, 5.0),
        Parameter::new("lambda", 0.8, 0.0, 5.0),
        Parameter::new("gamma", -0.5, -5.0, 5.0),
        Parameter::new("delta", 1.2, 0.0, 5.0),
    )
    .unwrap()
}

fn bench_generation(c: &mut Criterion) {
    let density = johnson();

    let masses: Vec<f64> = (0..10_000).map(|i| -2.0 + i as f64 * 8e-4).collect();
    c.bench_function("johnson_evaluate_batch_10k", |b| {
        b.iter(|| black_box(density.evaluate_batch(&masses).unwrap()))
    });

    c.bench_function("johnson_direct_10k", |b| {
        let mut sampler = DirectSampler::new(&density, "mass", 100_000_000).unwrap();
        let mut rng = SmallRng::seed_from_u64(42);
        b.iter(|| black_box(sampler.generate(10_000, &mut rng).unwrap()))
    });

    let config = GenConfig::default();
    c.bench_function("johnson_foam_explore", |b| {
        let mut rng = SmallRng::seed_from_u64(42);
        b.iter(|| {
            black_box(FoamGenerator::new(&density, &["mass"], &[], &config, &mut rng).unwrap())
        })
    });

    let ring = FnDensity::new(
        vec![
            Parameter::new("x", 0.0, -1.0, 1.0),
            Parameter::new("y", 0.0, -1.0, 1.0),
        ],
        |p: &[f64]| (-8.0 * (p[0] * p[0] + p[1] * p[1] - 0.25).powi(2)).exp(),
    );
    let mut rng = SmallRng::seed_from_u64(42);
    let mut foam = FoamGenerator::new(&ring, &["x", "y"], &[], &config, &mut rng).unwrap();
    c.bench_function("ring_foam_generate_10k", |b| {
        b.iter(|| black_box(foam.generate(10_000, &mut rng).unwrap()))
    });
}

criterion_group!(benches, bench_generation);
criterion_main!(benches);
