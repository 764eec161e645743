//! Flat block storage for a single chunk.

use std::ops::Range;

use crate::coordinates::{InChunkPos, CHUNK_DIM, CHUNK_DIM3Z};
use crate::voxel::voxeltypes::BlockId;

/// A dense 32x32x32 array of block ids, indexed in the XZY order of [`InChunkPos::as_index`].
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct ChunkVoxels {
    blocks: Box<[BlockId]>,
}

impl Default for ChunkVoxels {
    fn default() -> Self {
        Self::new(BlockId::AIR)
    }
}

impl std::fmt::Debug for ChunkVoxels {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChunkVoxels")
            .field("non_air", &(CHUNK_DIM3Z - self.count(BlockId::AIR)))
            .finish()
    }
}

impl ChunkVoxels {
    /// Creates storage filled with `fill`.
    pub fn new(fill: BlockId) -> Self {
        Self {
            blocks: vec![fill; CHUNK_DIM3Z].into_boxed_slice(),
        }
    }

    /// Reads the block at the given position.
    #[inline]
    pub fn get(&self, pos: InChunkPos) -> BlockId {
        self.blocks[pos.as_index()]
    }

    /// Writes the block at the given position, returning the previous value.
    #[inline]
    pub fn set(&mut self, pos: InChunkPos, block: BlockId) -> BlockId {
        std::mem::replace(&mut self.blocks[pos.as_index()], block)
    }

    /// Fills the in-chunk `y` range of the block column at `(x, z)`, clamping the range to the chunk bounds.
    /// Panics if `x` or `z` are outside of the chunk.
    pub fn fill_column(&mut self, x: i32, z: i32, y_range: Range<i32>, block: BlockId) {
        assert!(
            (0..CHUNK_DIM).contains(&x) && (0..CHUNK_DIM).contains(&z),
            "Column ({x}, {z}) outside of chunk bounds"
        );
        let start = y_range.start.clamp(0, CHUNK_DIM);
        let end = y_range.end.clamp(0, CHUNK_DIM);
        for y in start..end {
            let pos = InChunkPos::try_new(x, y, z).expect("clamped position is in bounds");
            self.blocks[pos.as_index()] = block;
        }
    }

    /// Counts the blocks of the given type.
    pub fn count(&self, block: BlockId) -> usize {
        self.blocks.iter().filter(|&&b| b == block).count()
    }

    /// Raw access to the block array.
    pub fn as_slice(&self) -> &[BlockId] {
        &self.blocks
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::coordinates::CHUNK_DIMZ;

    #[test]
    fn fill_column_clamps() {
        let mut voxels = ChunkVoxels::default();
        voxels.fill_column(3, 4, -10..5, BlockId::STONE);
        voxels.fill_column(3, 4, 30..100, BlockId::WATER);
        assert_eq!(voxels.count(BlockId::STONE), 5);
        assert_eq!(voxels.count(BlockId::WATER), 2);
        assert_eq!(voxels.get(InChunkPos::try_new(3, 0, 4).unwrap()), BlockId::STONE);
        assert_eq!(voxels.get(InChunkPos::try_new(3, 31, 4).unwrap()), BlockId::WATER);
        assert_eq!(voxels.get(InChunkPos::try_new(4, 0, 3).unwrap()), BlockId::AIR);
    }

    #[test]
    fn set_returns_previous() {
        let mut voxels = ChunkVoxels::new(BlockId::DIRT);
        let pos = InChunkPos::try_new(1, 2, 3).unwrap();
        assert_eq!(voxels.set(pos, BlockId::GRASS), BlockId::DIRT);
        assert_eq!(voxels.get(pos), BlockId::GRASS);
        assert_eq!(voxels.count(BlockId::DIRT), CHUNK_DIMZ * CHUNK_DIMZ * CHUNK_DIMZ - 1);
    }
}
