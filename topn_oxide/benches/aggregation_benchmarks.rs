use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::rngs::SmallRng;
use rand::SeedableRng;
use topn_oxide::runner::{AdaptiveRunner, MethodRunner, RunnerConfig};
use topn_oxide::sketch::{aggregate_summaries, StreamSummary};
use topn_oxide::workload::{KeyDistribution, ZipfianGenerator};

fn worker_sketches(workers: usize, capacity: usize, items_each: u64) -> Vec<StreamSummary<u64>> {
    let zipf = ZipfianGenerator::new(500, 1.2).unwrap();
    let mut rng = SmallRng::seed_from_u64(17);
    (0..workers)
        .map(|_| {
            let mut sketch = StreamSummary::new(capacity).unwrap();
            for _ in 0..items_each {
                sketch.insert(zipf.sample(&mut rng));
            }
            sketch
        })
        .collect()
}

/// Benchmark: merging worker sketches with telemetry
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_summaries");

    for workers in [2, 8, 32] {
        let summaries = worker_sketches(workers, 100, 10_000);
        group.bench_with_input(
            BenchmarkId::new("workers", workers),
            &summaries,
            |b, summaries| {
                b.iter(|| {
                    aggregate_summaries(black_box(summaries), 100 * summaries.len(), 20).unwrap()
                });
            },
        );
    }

    group.finish();
}

/// Benchmark: a full adaptive window (route, aggregate, adapt)
fn bench_adaptive_window(c: &mut Criterion) {
    let mut group = c.benchmark_group("adaptive_window");
    group.sample_size(20);

    group.bench_function("m4_n20_zipf", |b| {
        let zipf = ZipfianGenerator::new(500, 1.2).unwrap();
        let mut rng = SmallRng::seed_from_u64(23);
        let mut runner: AdaptiveRunner<u64> =
            AdaptiveRunner::new(&RunnerConfig::new(4, 20)).unwrap();
        b.iter(|| {
            runner.initialize_sketches(0).unwrap();
            for step in 0..40_000u64 {
                let item = zipf.sample(&mut rng);
                runner.insert_item((step % 4) as usize, item).unwrap();
            }
            black_box(runner.finalize_window(0).unwrap())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_aggregate, bench_adaptive_window);
criterion_main!(benches);
