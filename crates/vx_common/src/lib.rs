#![warn(missing_docs)]
#![deny(clippy::disallowed_types)]
#![allow(clippy::type_complexity)]

//! The Voxgen chunk generation scheduler: query submission, dependency resolution, worker dispatch and completion
//! draining, plus the worker pools, reference generators and bevy integration around it.

pub mod config;
pub mod gen_bench;
pub mod prelude;
pub mod voxel;

use std::time::Duration;

use crate::voxel::scheduler::ChunkGenerator;

/// The name of the project
pub static BRAND_NAME: &str = "Voxgen";

/// Target (maximum) number of scheduler ticks in a second.
pub const TICKS_PER_SECOND: i32 = 32;
/// Target (minimum) number of microseconds in a scheduler tick, as a `i64`.
pub const MICROSECONDS_PER_TICK: i64 = 1_000_000i64 / TICKS_PER_SECOND as i64;
/// One scheduler tick as a [`Duration`]
pub const TICK: Duration = Duration::from_micros(MICROSECONDS_PER_TICK as u64);

// Ensure `MICROSECONDS_PER_TICK` is perfectly accurate.
static_assertions::const_assert_eq!(1_000_000i64 / MICROSECONDS_PER_TICK, TICKS_PER_SECOND as i64);
// The scheduler lives in a bevy resource.
static_assertions::assert_impl_all!(ChunkGenerator: Send, Sync);
