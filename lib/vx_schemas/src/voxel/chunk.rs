//! Per-chunk generation state.

use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use slotmap::new_key_type;
use smallvec::SmallVec;

use crate::coordinates::{AbsChunkPos, ColumnPos};
use crate::voxel::chunk_storage::ChunkVoxels;
use crate::voxel::gen_level::ChunkGenLevel;

new_key_type! {
    /// Identifier of an outstanding generation query, a key into the scheduler's query arena.
    pub struct QueryId;
}

/// The generation queries attached to a chunk.
#[derive(Clone, Default, Debug)]
pub struct GenQueryData {
    /// The single query whose generation task is in flight for this chunk.
    pub current: Option<QueryId>,
    /// Queries waiting for the current task to finish. Unordered, removal swaps with the last element.
    pub pending: SmallVec<[QueryId; 4]>,
}

impl GenQueryData {
    /// Checks if no query is in flight or waiting on this chunk.
    #[inline]
    pub fn is_idle(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }
}

struct ChunkHandleInner {
    pos: AbsChunkPos,
}

/// A counted reference to a chunk. Cloning acquires a reference, dropping releases it.
/// Chunks with outstanding external handles cannot be evicted from their [`ChunkGrid`](crate::voxel::chunk_grid::ChunkGrid).
#[derive(Clone)]
pub struct ChunkHandle(Arc<ChunkHandleInner>);

impl ChunkHandle {
    pub(crate) fn new(pos: AbsChunkPos) -> Self {
        Self(Arc::new(ChunkHandleInner { pos }))
    }

    /// Position of the referenced chunk.
    #[inline]
    pub fn pos(&self) -> AbsChunkPos {
        self.0.pos
    }

    /// Checks if both handles reference the same chunk instance.
    #[inline]
    pub fn same_chunk(&self, other: &ChunkHandle) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Total number of live handles, including the one kept by the grid.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }
}

impl Debug for ChunkHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ChunkHandle({}, refs={})", self.0.pos, self.ref_count())
    }
}

/// Mutable generation state of a chunk.
/// Levels only ever increase: the setters ignore values lower than the current ones.
pub struct Chunk {
    handle: ChunkHandle,
    gen_level: ChunkGenLevel,
    pending_gen_level: ChunkGenLevel,
    is_accessible: bool,
    gen_query_data: GenQueryData,
    voxels: Arc<ChunkVoxels>,
}

impl Chunk {
    pub(crate) fn new(pos: AbsChunkPos) -> Self {
        Self {
            handle: ChunkHandle::new(pos),
            gen_level: ChunkGenLevel::None,
            pending_gen_level: ChunkGenLevel::None,
            is_accessible: false,
            gen_query_data: GenQueryData::default(),
            voxels: Arc::new(ChunkVoxels::default()),
        }
    }

    /// The chunk's position.
    #[inline]
    pub fn pos(&self) -> AbsChunkPos {
        self.handle.pos()
    }

    /// The column whose grid data this chunk depends on.
    #[inline]
    pub fn column(&self) -> ColumnPos {
        self.handle.pos().column()
    }

    /// The handle owned by the grid, clone it to acquire a new reference.
    #[inline]
    pub fn handle(&self) -> &ChunkHandle {
        &self.handle
    }

    /// Number of handles held outside of the grid.
    #[inline]
    pub fn external_refs(&self) -> usize {
        self.handle.ref_count() - 1
    }

    /// Highest fully completed generation level.
    #[inline]
    pub fn gen_level(&self) -> ChunkGenLevel {
        self.gen_level
    }

    /// Raises the completed generation level, lower values are ignored.
    pub fn advance_gen_level(&mut self, level: ChunkGenLevel) {
        self.gen_level = self.gen_level.max(level);
    }

    /// Highest level requested by any query submitted for this chunk.
    #[inline]
    pub fn pending_gen_level(&self) -> ChunkGenLevel {
        self.pending_gen_level
    }

    /// Raises the requested level watermark, returns `true` if it changed.
    pub fn raise_pending_gen_level(&mut self, level: ChunkGenLevel) -> bool {
        if self.pending_gen_level < level {
            self.pending_gen_level = level;
            true
        } else {
            false
        }
    }

    /// Whether the chunk has satisfied at least one consumer and can be read.
    #[inline]
    pub fn is_accessible(&self) -> bool {
        self.is_accessible
    }

    /// Marks the chunk readable by external consumers.
    #[inline]
    pub fn mark_accessible(&mut self) {
        self.is_accessible = true;
    }

    /// The queries attached to this chunk.
    #[inline]
    pub fn gen_query_data(&self) -> &GenQueryData {
        &self.gen_query_data
    }

    /// Mutable access to the queries attached to this chunk.
    #[inline]
    pub fn gen_query_data_mut(&mut self) -> &mut GenQueryData {
        &mut self.gen_query_data
    }

    /// The latest generated block data snapshot.
    #[inline]
    pub fn voxels(&self) -> &Arc<ChunkVoxels> {
        &self.voxels
    }

    /// Replaces the block data with a newer snapshot.
    #[inline]
    pub fn set_voxels(&mut self, voxels: Arc<ChunkVoxels>) {
        self.voxels = voxels;
    }
}

impl Debug for Chunk {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Chunk")
            .field("pos", &self.pos())
            .field("gen_level", &self.gen_level)
            .field("pending_gen_level", &self.pending_gen_level)
            .field("is_accessible", &self.is_accessible)
            .field("gen_query_data", &self.gen_query_data)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn levels_never_decrease() {
        let mut chunk = Chunk::new(AbsChunkPos::ZERO);
        chunk.advance_gen_level(ChunkGenLevel::Flora);
        chunk.advance_gen_level(ChunkGenLevel::Terrain);
        assert_eq!(chunk.gen_level(), ChunkGenLevel::Flora);

        assert!(chunk.raise_pending_gen_level(ChunkGenLevel::Script));
        assert!(!chunk.raise_pending_gen_level(ChunkGenLevel::Terrain));
        assert!(!chunk.raise_pending_gen_level(ChunkGenLevel::Script));
        assert_eq!(chunk.pending_gen_level(), ChunkGenLevel::Script);
    }

    #[test]
    fn handle_counting() {
        let chunk = Chunk::new(AbsChunkPos::new(1, 2, 3));
        assert_eq!(chunk.external_refs(), 0);
        let a = chunk.handle().clone();
        let b = a.clone();
        assert_eq!(chunk.external_refs(), 2);
        assert!(a.same_chunk(&b));
        drop(a);
        assert_eq!(chunk.external_refs(), 1);
        drop(b);
        assert_eq!(chunk.external_refs(), 0);
        assert_eq!(chunk.column(), ColumnPos::new(1, 3));
    }
}
