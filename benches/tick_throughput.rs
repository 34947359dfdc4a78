//! Tick throughput benchmarks.
//!
//! Measures wall-clock cost of `Scheduler::tick` as population size grows,
//! run with: cargo bench --bench tick_throughput

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use evochora_runtime::config::Config;
use evochora_runtime::coord::Coord;
use evochora_runtime::isa::REGISTRY;
use evochora_runtime::molecule::{MoleculeLayout, MoleculeType};
use evochora_runtime::{ProgramArtifact, Scheduler};

fn drifting_genome(layout: &MoleculeLayout) -> ProgramArtifact {
    let push_i = REGISTRY.id_of("PUSH", "I").unwrap();
    let drop_id = REGISTRY.id_of("DROP", "-").unwrap();
    ProgramArtifact::new("bench")
        .with_code(Coord::from_slice(&[0, 0]), layout.pack(MoleculeType::Code, push_i, 0))
        .with_code(Coord::from_slice(&[1, 0]), layout.pack(MoleculeType::Data, 1, 0))
        .with_code(Coord::from_slice(&[2, 0]), layout.pack(MoleculeType::Code, drop_id, 0))
}

fn scheduler_with_population(shape: usize, population: usize) -> Scheduler {
    let config = Config { shape: vec![shape, shape], ..Config::default() };
    let mut scheduler = Scheduler::with_seed(config, 0xC0FFEE);
    let layout = MoleculeLayout::default();
    let genome = drifting_genome(&layout);
    let lanes_per_row = (shape / 4).max(1);
    for i in 0..population {
        let col = (i % lanes_per_row) * 4;
        let row = (i / lanes_per_row) * 4;
        scheduler
            .spawn_organism(
                &genome,
                Coord::from_slice(&[row as i64, col as i64]),
                Coord::from_slice(&[1, 0]),
            )
            .ok();
    }
    scheduler
}

fn bench_tick_scaling(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick_throughput");
    for &population in &[10usize, 100, 1_000] {
        group.bench_function(format!("organisms_{population}"), |b| {
            b.iter_batched(
                || scheduler_with_population(512, population),
                |mut scheduler| {
                    black_box(scheduler.tick());
                },
                criterion::BatchSize::LargeInput,
            );
        });
    }
    group.finish();
}

fn bench_single_tick_empty_world(c: &mut Criterion) {
    c.bench_function("tick_empty_world_1000x1000", |b| {
        b.iter_batched(
            || Scheduler::with_seed(Config { shape: vec![1000, 1000], ..Config::default() }, 1),
            |mut scheduler| {
                black_box(scheduler.tick());
            },
            criterion::BatchSize::LargeInput,
        );
    });
}

criterion_group!(benches, bench_tick_scaling, bench_single_tick_empty_world);
criterion_main!(benches);
