//! Voxel data model: chunks, their generation state and the per-column grid data they depend on.

pub mod chunk;
pub mod chunk_grid;
pub mod chunk_storage;
pub mod gen_level;
pub mod grid_data;
pub mod voxeltypes;
