//! Block type identifiers stored in generated chunks.
use std::fmt::{Debug, Formatter};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

/// A block type reference stored in a chunk.
/// Block assets and their properties live outside the generator, only the numeric id is tracked here.
#[derive(Copy, Clone, Default, Ord, PartialOrd, Eq, PartialEq, Hash, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
pub struct BlockId(pub u16);

impl BlockId {
    /// Empty space, the default contents of a fresh chunk.
    pub const AIR: Self = Self(0);
    /// Bulk underground rock.
    pub const STONE: Self = Self(1);
    /// The layer between the surface and stone.
    pub const DIRT: Self = Self(2);
    /// Surface block above sea level.
    pub const GRASS: Self = Self(3);
    /// Surface block at or below sea level.
    pub const SAND: Self = Self(4);
    /// Liquid filling the space between the terrain and sea level.
    pub const WATER: Self = Self(5);
    /// A small plant placed on top of the surface during the flora pass.
    pub const FLORA: Self = Self(6);

    /// Checks if the block is empty space.
    #[inline]
    pub const fn is_air(self) -> bool {
        self.0 == Self::AIR.0
    }
}

impl Debug for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match *self {
            Self::AIR => "air",
            Self::STONE => "stone",
            Self::DIRT => "dirt",
            Self::GRASS => "grass",
            Self::SAND => "sand",
            Self::WATER => "water",
            Self::FLORA => "flora",
            _ => return write!(f, "BlockId({})", self.0),
        };
        write!(f, "BlockId({name})")
    }
}
