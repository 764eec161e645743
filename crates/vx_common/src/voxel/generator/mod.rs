//! Procedural world generators run by generation tasks on worker threads.

use vx_schemas::coordinates::{AbsChunkPos, ColumnPos, CHUNK_DIM};
use vx_schemas::voxel::chunk_storage::ChunkVoxels;
use vx_schemas::voxel::gen_level::ChunkGenLevel;
use vx_schemas::voxel::grid_data::Heightmap;
use vx_schemas::voxel::voxeltypes::BlockId;

pub mod flat;
pub mod height_noise;

/// A terrain generation algorithm. Called concurrently from worker threads, so it must not rely on interior
/// mutability without synchronization.
pub trait ProceduralGenerator: Send + Sync + 'static {
    /// Computes the surface heights of a chunk column, shared by all chunks stacked in it.
    fn generate_heightmap(&self, column: ColumnPos) -> Heightmap;

    /// Fills in base terrain blocks from the column's heightmap.
    fn generate_terrain(&self, pos: AbsChunkPos, heightmap: &Heightmap, voxels: &mut ChunkVoxels);

    /// Places surface plants on generated terrain.
    fn generate_flora(&self, _pos: AbsChunkPos, _heightmap: &Heightmap, _voxels: &mut ChunkVoxels) {}

    /// Runs scripted post-processing.
    fn run_scripts(&self, _pos: AbsChunkPos, _heightmap: &Heightmap, _voxels: &mut ChunkVoxels) {}

    /// Runs the pass producing the given level.
    fn generate_level(&self, level: ChunkGenLevel, pos: AbsChunkPos, heightmap: &Heightmap, voxels: &mut ChunkVoxels) {
        match level {
            ChunkGenLevel::None | ChunkGenLevel::Done => {}
            ChunkGenLevel::Terrain => self.generate_terrain(pos, heightmap, voxels),
            ChunkGenLevel::Flora => self.generate_flora(pos, heightmap, voxels),
            ChunkGenLevel::Script => self.run_scripts(pos, heightmap, voxels),
        }
    }
}

/// Runs every pass after `from` up to and including `to`, returns the level reached.
pub fn generate_chunk_levels(
    generator: &dyn ProceduralGenerator,
    pos: AbsChunkPos,
    heightmap: &Heightmap,
    voxels: &mut ChunkVoxels,
    from: ChunkGenLevel,
    to: ChunkGenLevel,
) -> ChunkGenLevel {
    let mut reached = from;
    for level in ChunkGenLevel::levels_between(from, to) {
        generator.generate_level(level, pos, heightmap, voxels);
        reached = level;
    }
    reached
}

/// Layered terrain fill shared by heightmap-based generators: stone, `dirt_depth` blocks of dirt, a grass or sand
/// surface block at the heightmap height, water up to `sea_level`.
pub fn fill_terrain_from_heightmap(
    pos: AbsChunkPos,
    heightmap: &Heightmap,
    voxels: &mut ChunkVoxels,
    sea_level: i32,
    dirt_depth: i32,
) {
    let base_y = pos.min_block().y;
    for z in 0..CHUNK_DIM {
        for x in 0..CHUNK_DIM {
            let surface = heightmap.get(x, z);
            let surface_block = if surface <= sea_level { BlockId::SAND } else { BlockId::GRASS };
            // Absolute y ranges converted to in-chunk ranges, fill_column clamps them.
            let rel = |abs: i32| abs - base_y;
            voxels.fill_column(x, z, i32::MIN..rel(surface - dirt_depth), BlockId::STONE);
            voxels.fill_column(x, z, rel(surface - dirt_depth)..rel(surface), BlockId::DIRT);
            voxels.fill_column(x, z, rel(surface)..rel(surface + 1), surface_block);
            voxels.fill_column(x, z, rel(surface + 1)..rel(sea_level + 1), BlockId::WATER);
        }
    }
}

#[cfg(test)]
mod test {
    use vx_schemas::coordinates::InChunkPos;

    use super::*;

    struct CountingGenerator;

    impl ProceduralGenerator for CountingGenerator {
        fn generate_heightmap(&self, _column: ColumnPos) -> Heightmap {
            Heightmap::flat(0)
        }

        fn generate_terrain(&self, _pos: AbsChunkPos, _heightmap: &Heightmap, voxels: &mut ChunkVoxels) {
            voxels.set(InChunkPos::ZERO, BlockId::STONE);
        }

        fn generate_flora(&self, _pos: AbsChunkPos, _heightmap: &Heightmap, voxels: &mut ChunkVoxels) {
            voxels.set(InChunkPos::MAX, BlockId::FLORA);
        }
    }

    #[test]
    fn runs_only_requested_passes() {
        let hm = Heightmap::flat(0);
        let mut voxels = ChunkVoxels::default();
        let reached = generate_chunk_levels(
            &CountingGenerator,
            AbsChunkPos::ZERO,
            &hm,
            &mut voxels,
            ChunkGenLevel::None,
            ChunkGenLevel::Terrain,
        );
        assert_eq!(reached, ChunkGenLevel::Terrain);
        assert_eq!(voxels.count(BlockId::STONE), 1);
        assert_eq!(voxels.count(BlockId::FLORA), 0);

        let reached = generate_chunk_levels(
            &CountingGenerator,
            AbsChunkPos::ZERO,
            &hm,
            &mut voxels,
            reached,
            ChunkGenLevel::Done,
        );
        assert_eq!(reached, ChunkGenLevel::Done);
        assert_eq!(voxels.count(BlockId::FLORA), 1);
    }

    #[test]
    fn terrain_layers() {
        let hm = Heightmap::flat(10);
        let mut voxels = ChunkVoxels::default();
        fill_terrain_from_heightmap(AbsChunkPos::ZERO, &hm, &mut voxels, 12, 3);
        let at = |y| voxels.get(InChunkPos::try_new(5, y, 5).unwrap());
        assert_eq!(at(0), BlockId::STONE);
        assert_eq!(at(6), BlockId::STONE);
        assert_eq!(at(7), BlockId::DIRT);
        assert_eq!(at(9), BlockId::DIRT);
        assert_eq!(at(10), BlockId::SAND);
        assert_eq!(at(11), BlockId::WATER);
        assert_eq!(at(12), BlockId::WATER);
        assert_eq!(at(13), BlockId::AIR);
    }

    #[test]
    fn terrain_above_and_below_chunk() {
        let hm = Heightmap::flat(10);
        let mut below = ChunkVoxels::default();
        fill_terrain_from_heightmap(AbsChunkPos::new(0, -1, 0), &hm, &mut below, 0, 3);
        assert_eq!(below.count(BlockId::STONE), below.as_slice().len());
        let mut above = ChunkVoxels::default();
        fill_terrain_from_heightmap(AbsChunkPos::new(0, 1, 0), &hm, &mut above, 0, 3);
        assert_eq!(above.count(BlockId::AIR), above.as_slice().len());
    }
}
