use std::sync::Arc;

use criterion::{black_box, criterion_group, BatchSize, BenchmarkId, Criterion};
use vx_common::config::GeneratorConfig;
use vx_common::voxel::generator::flat::FlatGenerator;
use vx_common::voxel::scheduler::ChunkGenerator;
use vx_common::voxel::worker_pool::ManualWorkerPool;
use vx_schemas::coordinates::AbsChunkPos;
use vx_schemas::voxel::gen_level::ChunkGenLevel;

fn new_generator() -> (ChunkGenerator, Arc<ManualWorkerPool>) {
    let pool = Arc::new(ManualWorkerPool::new());
    let generator = ChunkGenerator::new(
        pool.clone(),
        Arc::new(FlatGenerator::grassland(16)),
        &GeneratorConfig::default(),
    )
    .unwrap();
    (generator, pool)
}

fn run_to_completion(generator: &mut ChunkGenerator, pool: &ManualWorkerPool) {
    while generator.queries_outstanding() > 0 {
        pool.run_all();
        black_box(generator.update());
    }
}

fn bench_area_generation(c: &mut Criterion) {
    for radius in [2, 6] {
        c.bench_with_input(BenchmarkId::new("generate_area", radius), &radius, |b, &r| {
            b.iter_batched(
                new_generator,
                |(mut generator, pool)| {
                    for y in 0..2 {
                        for z in -r..=r {
                            for x in -r..=r {
                                let pos = AbsChunkPos::new(x, y, z);
                                generator.request(pos, ChunkGenLevel::Terrain).unwrap();
                                generator.request(pos, ChunkGenLevel::Done).unwrap();
                            }
                        }
                    }
                    run_to_completion(&mut generator, &pool);
                    generator
                },
                BatchSize::SmallInput,
            )
        });
    }
}

fn bench_short_circuit(c: &mut Criterion) {
    let (mut generator, pool) = new_generator();
    let pos = AbsChunkPos::ZERO;
    generator.request(pos, ChunkGenLevel::Done).unwrap();
    run_to_completion(&mut generator, &pool);
    c.bench_function("satisfied_query", |b| {
        b.iter(|| generator.request(black_box(pos), ChunkGenLevel::Flora))
    });
}

criterion_group!(query_benches, bench_area_generation, bench_short_circuit);
