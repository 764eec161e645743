//! Simple flat world generator

use vx_schemas::coordinates::{AbsChunkPos, ColumnPos, CHUNK_DIM};
use vx_schemas::voxel::chunk_storage::ChunkVoxels;
use vx_schemas::voxel::grid_data::Heightmap;
use vx_schemas::voxel::voxeltypes::BlockId;

use super::ProceduralGenerator;
use crate::prelude::*;

/// A layer of blocks to generate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlatLayer {
    /// The type of block to fill the layer with.
    pub block_type: BlockId,
    /// The thickness of the layer in blocks, must be positive.
    pub thickness: i32,
}

/// A simple generator that creates a world composed of many stacked flat layers.
/// The bottom layer is copied downwards, everything above the top layer is air.
pub struct FlatGenerator {
    start_y: i32,
    layers: Vec<FlatLayer>,
    surface_y: i32,
}

impl FlatGenerator {
    /// Constructs a generator from the given arguments, returning an error if invalid layers were given.
    pub fn new(start_y: i32, layers: Vec<FlatLayer>) -> Result<Self> {
        if layers.is_empty() {
            bail!("Empty layers given to the flat generator")
        }
        if layers.iter().any(|l| l.thickness <= 0) {
            bail!("Invalid non-positive thickness layer in {layers:?}");
        }
        let surface_y = start_y + layers.iter().map(|l| l.thickness).sum::<i32>() - 1;
        Ok(Self {
            start_y,
            layers,
            surface_y,
        })
    }

    /// Stone, dirt and a grass top ending at `surface_y`.
    pub fn grassland(surface_y: i32) -> Self {
        let layers = vec![
            FlatLayer {
                block_type: BlockId::STONE,
                thickness: 4,
            },
            FlatLayer {
                block_type: BlockId::DIRT,
                thickness: 3,
            },
            FlatLayer {
                block_type: BlockId::GRASS,
                thickness: 1,
            },
        ];
        Self::new(surface_y - 7, layers).expect("Builtin flat layers are valid")
    }

    /// The absolute height of the topmost generated block.
    pub fn surface_y(&self) -> i32 {
        self.surface_y
    }

    fn layer_for(&self, y: i32) -> Option<FlatLayer> {
        if y <= self.start_y {
            return Some(self.layers[0]);
        }
        let mut cur_y = self.start_y;
        for layer in self.layers.iter().copied() {
            let end_y = cur_y + layer.thickness;
            if (cur_y..end_y).contains(&y) {
                return Some(layer);
            }
            cur_y = end_y;
        }
        None
    }
}

impl ProceduralGenerator for FlatGenerator {
    fn generate_heightmap(&self, _column: ColumnPos) -> Heightmap {
        Heightmap::flat(self.surface_y)
    }

    fn generate_terrain(&self, pos: AbsChunkPos, _heightmap: &Heightmap, voxels: &mut ChunkVoxels) {
        let base_y = pos.min_block().y;
        for in_y in 0..CHUNK_DIM {
            let Some(layer) = self.layer_for(base_y + in_y) else {
                continue;
            };
            for z in 0..CHUNK_DIM {
                for x in 0..CHUNK_DIM {
                    voxels.fill_column(x, z, in_y..in_y + 1, layer.block_type);
                }
            }
        }
    }
}
