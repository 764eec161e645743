//! In-memory registry of the chunks being generated and their columns' grid data.

use hashbrown::hash_map::Entry;
use hashbrown::HashMap;
use thiserror::Error;

use crate::coordinates::{AbsChunkPos, ColumnPos};
use crate::voxel::chunk::{Chunk, ChunkHandle};
use crate::voxel::grid_data::GridData;

/// Error returned by [`ChunkGrid::evict_chunk`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
pub enum EvictionError {
    /// No chunk is present at the given position.
    #[error("Chunk {0} is not loaded")]
    NotLoaded(AbsChunkPos),
    /// Handles to the chunk are still held, or generation queries are still attached to it.
    #[error("Chunk {0} is still referenced ({1} external handles)")]
    StillReferenced(AbsChunkPos, usize),
}

struct Column {
    grid_data: GridData,
    chunk_count: usize,
}

/// The world context of the generator: owns every chunk by position, and one [`GridData`] per column that has at
/// least one chunk.
#[derive(Default)]
pub struct ChunkGrid {
    chunks: HashMap<AbsChunkPos, Chunk>,
    columns: HashMap<ColumnPos, Column>,
}

impl ChunkGrid {
    /// Constructs an empty grid.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an acquired handle to the chunk at `pos`, creating the chunk (and its column's grid data) if needed.
    pub fn get_or_create_chunk(&mut self, pos: AbsChunkPos) -> ChunkHandle {
        match self.chunks.entry(pos) {
            Entry::Occupied(e) => e.get().handle().clone(),
            Entry::Vacant(e) => {
                let column = self.columns.entry(pos.column()).or_insert_with(|| Column {
                    grid_data: GridData::new(pos.column()),
                    chunk_count: 0,
                });
                column.chunk_count += 1;
                e.insert(Chunk::new(pos)).handle().clone()
            }
        }
    }

    /// Returns an acquired handle to an existing chunk.
    pub fn acquire(&self, pos: AbsChunkPos) -> Option<ChunkHandle> {
        self.chunks.get(&pos).map(|c| c.handle().clone())
    }

    /// Accesses the chunk at the given position if present.
    #[inline]
    pub fn chunk(&self, pos: AbsChunkPos) -> Option<&Chunk> {
        self.chunks.get(&pos)
    }

    /// Mutably accesses the chunk at the given position if present.
    #[inline]
    pub fn chunk_mut(&mut self, pos: AbsChunkPos) -> Option<&mut Chunk> {
        self.chunks.get_mut(&pos)
    }

    /// Accesses a column's grid data if any chunk of that column is present.
    #[inline]
    pub fn grid_data(&self, column: ColumnPos) -> Option<&GridData> {
        self.columns.get(&column).map(|c| &c.grid_data)
    }

    /// Mutably accesses a column's grid data if any chunk of that column is present.
    #[inline]
    pub fn grid_data_mut(&mut self, column: ColumnPos) -> Option<&mut GridData> {
        self.columns.get_mut(&column).map(|c| &mut c.grid_data)
    }

    /// Mutably accesses a chunk along with its column's grid data.
    pub fn chunk_and_grid_data_mut(&mut self, pos: AbsChunkPos) -> Option<(&mut Chunk, &mut GridData)> {
        let chunk = self.chunks.get_mut(&pos)?;
        let column = self.columns.get_mut(&pos.column())?;
        Some((chunk, &mut column.grid_data))
    }

    /// Removes a chunk that nothing references anymore, dropping its column's grid data along with the column's last
    /// chunk.
    pub fn evict_chunk(&mut self, pos: AbsChunkPos) -> Result<(), EvictionError> {
        let chunk = self.chunks.get(&pos).ok_or(EvictionError::NotLoaded(pos))?;
        if chunk.external_refs() > 0 || !chunk.gen_query_data().is_idle() {
            return Err(EvictionError::StillReferenced(pos, chunk.external_refs()));
        }
        self.chunks.remove(&pos);
        let column = pos.column();
        if let Entry::Occupied(mut e) = self.columns.entry(column) {
            e.get_mut().chunk_count -= 1;
            if e.get().chunk_count == 0 {
                e.remove();
            }
        }
        Ok(())
    }

    /// Number of chunks present.
    #[inline]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Number of columns with grid data.
    #[inline]
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Iterates over all present chunks in an arbitrary order.
    pub fn chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.chunks.values()
    }
}
