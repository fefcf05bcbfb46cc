//! Kernel throughput benchmarks: ticks per second for a full squad run.
//!
//! Run with: `cargo bench`

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};
use crucible::data::{AplSource, DataRepo, Difficulty, Roster};
use crucible::sim::Simulation;

const ROTATION: &str = "\
1211|action|1211_E_EX|attribute.1211:energy>=60
1091|action|1091_E_EX|attribute.1091:energy>=60
1211|action|1211_NA_1
1091|action|1091_NA_1
1300|action|1300_NA_1
";

fn roster(seed: u64) -> Roster {
    Roster {
        characters: vec![1211, 1091, 1300],
        enemy_index: 11001,
        enemy_adjustment: 1.0,
        difficulty: Difficulty::Normal,
        apl: AplSource::Inline(ROTATION.to_string()),
        seed,
    }
}

fn bench_kernel(c: &mut Criterion) {
    let mut group = c.benchmark_group("kernel");
    group.sample_size(50);

    for ticks in [600u64, 3600] {
        group.throughput(Throughput::Elements(ticks));
        group.bench_with_input(format!("run_{ticks}_ticks"), &ticks, |b, &ticks| {
            b.iter(|| {
                let mut sim = Simulation::init(roster(7), DataRepo::demo())
                    .expect("demo roster initializes");
                let summary = sim.run(black_box(ticks)).expect("run completes");
                black_box(summary.total_damage)
            });
        });
    }

    group.bench_function("init_only", |b| {
        b.iter(|| {
            let sim = Simulation::init(roster(7), DataRepo::demo())
                .expect("demo roster initializes");
            black_box(sim.records.len())
        });
    });

    group.finish();
}

criterion_group!(benches, bench_kernel);
criterion_main!(benches);
