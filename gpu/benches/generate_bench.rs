//! Benchmarks for kernel generation and host reference execution

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use meanforge_gpu::reference::{execute, HostTensor};
use meanforge_gpu::{MeanKernelGenerator, ReductionSpec};

fn bench_generate(c: &mut Criterion) {
    let gen = MeanKernelGenerator::default();
    let mut group = c.benchmark_group("generate");

    for (h, w, ch) in [(4, 4, 4), (32, 32, 4), (224, 224, 64), (7, 7, 2048)] {
        let spec = ReductionSpec::spatial(h, w, ch);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}x{}", h, w, ch)),
            &spec,
            |b, spec| b.iter(|| gen.generate(black_box(spec)).unwrap()),
        );
    }

    group.finish();
}

fn bench_reference(c: &mut Criterion) {
    let gen = MeanKernelGenerator::default();
    let mut group = c.benchmark_group("reference");

    for (h, w, ch) in [(32, 32, 16), (128, 128, 16)] {
        let spec = ReductionSpec::spatial(h, w, ch);
        let plan = gen.plan(&spec).unwrap();
        let tensor = HostTensor::from_fn(h, w, ch, |y, x, c| (y + x + c) as f32);
        group.bench_with_input(
            BenchmarkId::from_parameter(format!("{}x{}x{}", h, w, ch)),
            &tensor,
            |b, tensor| b.iter(|| execute(black_box(&plan), tensor).unwrap()),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_generate, bench_reference);
criterion_main!(benches);
