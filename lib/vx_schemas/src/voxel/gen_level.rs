//! Ordered milestones of the chunk generation pipeline.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// A generation milestone reached by a chunk. Levels are cumulative: a chunk at [`ChunkGenLevel::Flora`] has also
/// completed [`ChunkGenLevel::Terrain`].
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChunkGenLevel {
    /// Nothing generated yet.
    #[default]
    None = 0,
    /// Base terrain filled in from the column heightmap.
    Terrain = 1,
    /// Surface plants placed.
    Flora = 2,
    /// Scripted post-processing passes done.
    Script = 3,
    /// Terminal level, nothing left to generate.
    Done = 4,
}

impl ChunkGenLevel {
    /// All levels in ascending order.
    pub const ALL: [Self; 5] = [Self::None, Self::Terrain, Self::Flora, Self::Script, Self::Done];

    /// The level following this one, or `None` for [`ChunkGenLevel::Done`].
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::None => Some(Self::Terrain),
            Self::Terrain => Some(Self::Flora),
            Self::Flora => Some(Self::Script),
            Self::Script => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Checks if this is the terminal level.
    #[inline]
    pub const fn is_done(self) -> bool {
        matches!(self, Self::Done)
    }

    /// Iterates over the levels a generator has to run to go from `from` to `to`, excluding `from` and including `to`.
    /// Empty if `to <= from`.
    pub fn levels_between(from: Self, to: Self) -> impl Iterator<Item = Self> + Clone {
        Self::ALL.into_iter().filter(move |&l| l > from && l <= to)
    }

    /// Parses a level from its lowercase name, as used on command lines.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|l| l.name() == name)
    }

    /// Lowercase name of the level.
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Terrain => "terrain",
            Self::Flora => "flora",
            Self::Script => "script",
            Self::Done => "done",
        }
    }
}

impl Display for ChunkGenLevel {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
