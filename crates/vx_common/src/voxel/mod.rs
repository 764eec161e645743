//! Voxel world generation: queries, worker pools, procedural generators and the scheduler tying them together.

pub mod generator;
pub mod plugin;
pub mod query;
pub mod scheduler;
pub mod worker_pool;
