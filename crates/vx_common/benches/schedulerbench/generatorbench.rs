use criterion::{black_box, criterion_group, Criterion};
use vx_common::config::PlanetGenConfig;
use vx_common::voxel::generator::generate_chunk_levels;
use vx_common::voxel::generator::height_noise::HeightNoiseGenerator;
use vx_common::voxel::generator::ProceduralGenerator;
use vx_schemas::coordinates::{AbsChunkPos, ColumnPos};
use vx_schemas::voxel::chunk_storage::ChunkVoxels;
use vx_schemas::voxel::gen_level::ChunkGenLevel;

fn bench_noise_heightmap(c: &mut Criterion) {
    let generator = HeightNoiseGenerator::new(&PlanetGenConfig::default());
    c.bench_function("noise_heightmap", |b| {
        b.iter(|| generator.generate_heightmap(black_box(ColumnPos::new(12, -7))))
    });
}

fn bench_noise_chunk(c: &mut Criterion) {
    let generator = HeightNoiseGenerator::new(&PlanetGenConfig::default());
    let pos = AbsChunkPos::new(12, 0, -7);
    let heightmap = generator.generate_heightmap(pos.column());
    c.bench_function("noise_chunk_done", |b| {
        b.iter(|| {
            let mut voxels = ChunkVoxels::default();
            generate_chunk_levels(
                &generator,
                black_box(pos),
                &heightmap,
                &mut voxels,
                ChunkGenLevel::None,
                ChunkGenLevel::Done,
            );
            voxels
        })
    });
}

criterion_group!(generator_benches, bench_noise_heightmap, bench_noise_chunk);
