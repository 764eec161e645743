//! Heightfield terrain from fractal Perlin noise.

use noise::{Fbm, MultiFractal, NoiseFn, Perlin};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro128StarStar;
use vx_schemas::coordinates::{AbsChunkPos, ColumnPos, InChunkPos, CHUNK_DIM};
use vx_schemas::voxel::chunk_storage::ChunkVoxels;
use vx_schemas::voxel::grid_data::Heightmap;
use vx_schemas::voxel::voxeltypes::BlockId;

use super::{fill_terrain_from_heightmap, ProceduralGenerator};
use crate::config::PlanetGenConfig;

/// Generates rolling hills: an fbm heightfield filled with stone and dirt, grass on dry land, sand and water below
/// the sea level, and randomly scattered flora on grass.
pub struct HeightNoiseGenerator {
    config: PlanetGenConfig,
    height_noise: Fbm<Perlin>,
}

impl HeightNoiseGenerator {
    /// Initializes the noise functions from the planet parameters.
    pub fn new(config: &PlanetGenConfig) -> Self {
        // The noise takes a 32-bit seed, fold the high half in so every seed bit matters.
        let noise_seed = (config.seed ^ (config.seed >> 32)) as u32;
        let height_noise = Fbm::<Perlin>::new(noise_seed)
            .set_octaves(config.octaves)
            .set_frequency(config.frequency);
        Self {
            config: config.clone(),
            height_noise,
        }
    }

    /// Surface height at an absolute block column.
    pub fn height_at(&self, x: i32, z: i32) -> i32 {
        let n = self.height_noise.get([x as f64, z as f64]);
        self.config.base_height + (n * self.config.height_amplitude).round() as i32
    }

    fn column_rng(&self, column: ColumnPos) -> Xoshiro128StarStar {
        let hash = (column.x() as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
            ^ (column.z() as u64).wrapping_mul(0xC2B2_AE3D_27D4_EB4F);
        Xoshiro128StarStar::seed_from_u64(self.config.seed ^ hash)
    }
}

impl ProceduralGenerator for HeightNoiseGenerator {
    fn generate_heightmap(&self, column: ColumnPos) -> Heightmap {
        Heightmap::from_fn(|x, z| {
            let (bx, bz) = column.block_xz(x, z);
            self.height_at(bx, bz)
        })
    }

    fn generate_terrain(&self, pos: AbsChunkPos, heightmap: &Heightmap, voxels: &mut ChunkVoxels) {
        fill_terrain_from_heightmap(pos, heightmap, voxels, self.config.sea_level, self.config.dirt_depth);
    }

    fn generate_flora(&self, pos: AbsChunkPos, heightmap: &Heightmap, voxels: &mut ChunkVoxels) {
        if self.config.flora_chance <= 0.0 {
            return;
        }
        let base_y = pos.min_block().y;
        // Seeded per column and consumed in a fixed order, so every chunk of the column agrees on placement.
        let mut rng = self.column_rng(pos.column());
        for z in 0..CHUNK_DIM {
            for x in 0..CHUNK_DIM {
                let planted = rng.gen_bool(self.config.flora_chance);
                let surface = heightmap.get(x, z);
                if !planted || surface <= self.config.sea_level {
                    continue;
                }
                if let Ok(above) = InChunkPos::try_new(x, surface + 1 - base_y, z) {
                    voxels.set(above, BlockId::FLORA);
                }
            }
        }
    }
}
