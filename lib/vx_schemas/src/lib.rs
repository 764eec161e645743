#![warn(missing_docs)]
#![deny(clippy::disallowed_types)]

//! A library crate of the in-memory representations of the generator's core data: chunks, columns and generation levels.

pub mod coordinates;
pub mod voxel;

/// Re-exported dependencies used in API types
pub mod dependencies {
    pub use anyhow;
    pub use bevy_math;
    pub use bytemuck;
    pub use hashbrown;
    pub use itertools;
    pub use serde;
    pub use slotmap;
    pub use smallvec;
    pub use thiserror;
}
