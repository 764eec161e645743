//! Strongly typed newtype wrappers for the coordinate formats used by the generator, and related constants.

use std::fmt::{Display, Formatter};
use std::ops::Deref;

use bevy_math::{IVec2, IVec3};
use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Length of a side of a chunk in blocks
pub const CHUNK_DIM: i32 = 32;
/// Length of a side of a chunk in blocks
pub const CHUNK_DIMZ: usize = CHUNK_DIM as usize;
/// Number of blocks on the face of a chunk
pub const CHUNK_DIM2: i32 = CHUNK_DIM * CHUNK_DIM;
/// Number of blocks on the face of a chunk
pub const CHUNK_DIM2Z: usize = (CHUNK_DIM * CHUNK_DIM) as usize;
/// Number of blocks in the volume of the chunk
pub const CHUNK_DIM3: i32 = CHUNK_DIM * CHUNK_DIM * CHUNK_DIM;
/// Number of blocks in the volume of the chunk
pub const CHUNK_DIM3Z: usize = (CHUNK_DIM * CHUNK_DIM * CHUNK_DIM) as usize;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Error)]
#[error("Given coordinates were outside of chunk boundaries: {0}")]
/// Error when the given coordinates are outside of the chunk boundary.
pub struct InChunkVecError(IVec3);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// A block position inside of a chunk, limited to 0..[CHUNK_DIM]
pub struct InChunkPos(pub(crate) IVec3);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// An absolute chunk position in a voxel world
pub struct AbsChunkPos(pub(crate) IVec3);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// An absolute block position in a voxel world
pub struct AbsBlockPos(pub(crate) IVec3);

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default, Pod, Zeroable, Serialize, Deserialize)]
#[repr(transparent)]
/// The (x, z) position of a vertical column of chunks, in chunk units.
/// All chunks stacked in one column share the column's heightmap grid data.
pub struct ColumnPos(pub(crate) IVec2);

// === Utils
macro_rules! impl_simple_ivec3_newtype {
    ($T:ident) => {
        impl $T {
            /// (0, 0, 0)
            pub const ZERO: Self = Self(IVec3::ZERO);
            /// (1, 1, 1)
            pub const ONE: Self = Self(IVec3::ONE);

            /// Const-friendly `from<IVec3>`
            #[inline]
            pub const fn from_ivec3(value: IVec3) -> Self {
                Self(value)
            }

            /// Const-friendly `into<IVec3>`
            #[inline]
            pub const fn into_ivec3(self) -> IVec3 {
                self.0
            }

            /// Constructs a new [`Self`] from the given coordinates.
            #[inline]
            pub const fn new(x: i32, y: i32, z: i32) -> Self {
                Self(IVec3::new(x, y, z))
            }
        }

        impl From<IVec3> for $T {
            #[inline]
            fn from(value: IVec3) -> Self {
                Self::from_ivec3(value)
            }
        }
        impl From<$T> for IVec3 {
            #[inline]
            fn from(value: $T) -> IVec3 {
                value.into_ivec3()
            }
        }
        impl Deref for $T {
            type Target = IVec3;

            #[inline]
            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
        impl Display for $T {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({}, {}, {})", stringify!($T), self.0.x, self.0.y, self.0.z)
            }
        }
    };
}

impl_simple_ivec3_newtype!(AbsChunkPos);
impl_simple_ivec3_newtype!(AbsBlockPos);

// === InChunkPos

impl TryFrom<IVec3> for InChunkPos {
    type Error = InChunkVecError;

    #[inline]
    fn try_from(value: IVec3) -> Result<Self, Self::Error> {
        Self::try_from_ivec3(value)
    }
}

impl From<InChunkPos> for IVec3 {
    #[inline]
    fn from(value: InChunkPos) -> IVec3 {
        value.0
    }
}

impl Deref for InChunkPos {
    type Target = IVec3;

    #[inline]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl InChunkPos {
    /// (0, 0, 0)
    pub const ZERO: Self = Self(IVec3::ZERO);
    /// (31, 31, 31)
    pub const MAX: Self = Self(IVec3::splat(CHUNK_DIM - 1));

    /// Const-friendly `try_from<IVec3>`
    #[inline]
    pub const fn try_from_ivec3(v: IVec3) -> Result<Self, InChunkVecError> {
        let IVec3 { x, y, z } = v;
        if (x < 0) || (x >= CHUNK_DIM) || (y < 0) || (y >= CHUNK_DIM) || (z < 0) || (z >= CHUNK_DIM) {
            Err(InChunkVecError(v))
        } else {
            Ok(Self(v))
        }
    }

    /// Constructs a new in-chunk position from the given coordinates, or returns an error if it's
    /// outside of chunk bounds.
    #[inline]
    pub const fn try_new(x: i32, y: i32, z: i32) -> Result<Self, InChunkVecError> {
        Self::try_from_ivec3(IVec3::new(x, y, z))
    }

    /// Converts the coordinates into an XZY-strided index into the chunk storage array
    #[inline]
    pub const fn as_index(self) -> usize {
        (self.0.x + (CHUNK_DIM * self.0.z) + (CHUNK_DIM2 * self.0.y)) as usize
    }
}

// === AbsChunkPos

impl AbsChunkPos {
    /// The column this chunk is stacked in.
    #[inline]
    pub const fn column(self) -> ColumnPos {
        ColumnPos(IVec2::new(self.0.x, self.0.z))
    }

    /// The absolute position of the block at the minimum corner of this chunk.
    #[inline]
    pub fn min_block(self) -> AbsBlockPos {
        AbsBlockPos(self.0 * CHUNK_DIM)
    }
}

impl From<AbsChunkPos> for AbsBlockPos {
    #[inline]
    fn from(value: AbsChunkPos) -> Self {
        value.min_block()
    }
}

// === ColumnPos

impl ColumnPos {
    /// (0, 0)
    pub const ZERO: Self = Self(IVec2::ZERO);

    /// Constructs a new column position from the given chunk x and z coordinates.
    #[inline]
    pub const fn new(x: i32, z: i32) -> Self {
        Self(IVec2::new(x, z))
    }

    /// The chunk x coordinate.
    #[inline]
    pub const fn x(self) -> i32 {
        self.0.x
    }

    /// The chunk z coordinate (stored in the vector's `y` component).
    #[inline]
    pub const fn z(self) -> i32 {
        self.0.y
    }

    /// The chunk at height `y` in this column.
    #[inline]
    pub const fn chunk_at(self, y: i32) -> AbsChunkPos {
        AbsChunkPos(IVec3::new(self.0.x, y, self.0.y))
    }

    /// The absolute (x, z) block coordinates of the block column `(in_x, in_z)` inside this chunk column.
    #[inline]
    pub const fn block_xz(self, in_x: i32, in_z: i32) -> (i32, i32) {
        (self.0.x * CHUNK_DIM + in_x, self.0.y * CHUNK_DIM + in_z)
    }
}

impl Display for ColumnPos {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "ColumnPos({}, {})", self.0.x, self.0.y)
    }
}

#[cfg(test)]
mod test {
    use itertools::iproduct;
    use quickcheck_macros::quickcheck;

    use super::*;

    #[test]
    fn in_chunk_bounds() {
        assert!(InChunkPos::try_new(0, 0, 0).is_ok());
        assert!(InChunkPos::try_new(31, 31, 31).is_ok());
        assert!(InChunkPos::try_new(32, 0, 0).is_err());
        assert!(InChunkPos::try_new(0, -1, 0).is_err());
        assert_eq!(InChunkPos::MAX.as_index(), CHUNK_DIM3Z - 1);
        assert_eq!(CHUNK_DIM3 as usize, CHUNK_DIM3Z);
    }

    #[test]
    fn in_chunk_indices_are_unique() {
        let mut seen = vec![false; CHUNK_DIM3Z];
        for (x, y, z) in iproduct!(0..CHUNK_DIM, 0..CHUNK_DIM, 0..CHUNK_DIM) {
            let idx = InChunkPos::try_new(x, y, z).unwrap().as_index();
            assert!(!seen[idx], "index {idx} of ({x}, {y}, {z}) already taken");
            seen[idx] = true;
        }
        assert!(seen.into_iter().all(|s| s));
    }

    #[quickcheck]
    fn column_ignores_height(x: i16, y: i16, z: i16) -> bool {
        let (x, y, z) = (i32::from(x), i32::from(y), i32::from(z));
        let pos = AbsChunkPos::new(x, y, z);
        pos.column() == ColumnPos::new(x, z) && pos.column().chunk_at(y) == pos
    }

    #[test]
    fn column_block_coordinates() {
        let column = ColumnPos::new(-1, 2);
        assert_eq!(column.block_xz(0, 0), (-32, 64));
        assert_eq!(column.block_xz(31, 1), (-1, 65));
        assert_eq!(AbsChunkPos::new(1, -1, 0).min_block(), AbsBlockPos::new(32, -32, 0));
    }
}
