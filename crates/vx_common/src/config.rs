//! Generator configuration handling

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use smart_default::SmartDefault;
use thiserror::Error;

use crate::prelude::{async_watch_channel, AsyncWatchReceiver, AsyncWatchSender};

/// Planet-wide parameters the procedural generators are initialized with.
#[derive(Clone, PartialEq, Debug, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanetGenConfig {
    /// World seed.
    #[default = 123456789]
    pub seed: u64,
    /// Absolute block height of the liquid surface.
    #[default = 0]
    pub sea_level: i32,
    /// Average terrain surface height, in blocks.
    #[default = 8]
    pub base_height: i32,
    /// Maximum deviation of the terrain surface from `base_height`, in blocks.
    #[default = 40.0]
    pub height_amplitude: f64,
    /// Horizontal frequency of the base terrain noise, per block.
    #[default = 0.008]
    pub frequency: f64,
    /// Number of noise octaves summed for the base terrain.
    #[default = 4]
    pub octaves: usize,
    /// Probability of a flora block on each dry surface block.
    #[default = 0.02]
    pub flora_chance: f64,
    /// Thickness of the dirt layer under the surface block.
    #[default = 3]
    pub dirt_depth: i32,
}

/// Scheduler configuration.
#[derive(Clone, PartialEq, Debug, SmartDefault, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    /// Maximum number of finished queries resolved by a single `update` call.
    #[default = 100]
    pub max_finished_per_update: usize,
    /// Parameters for the procedural generator.
    pub planet: PlanetGenConfig,
}

/// Invalid configuration values.
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GeneratorConfigError {
    /// The update batch size would never drain anything.
    #[error("max_finished_per_update must be positive")]
    ZeroBatchSize,
    /// The noise octave count is zero.
    #[error("planet.octaves must be positive")]
    ZeroOctaves,
    /// A probability was outside of `[0, 1]`.
    #[error("planet.flora_chance {0} is not a probability")]
    InvalidFloraChance(f64),
}

/// A GeneratorConfig handle that can listen to changes, used as the primary way of accessing the configuration.
pub type GeneratorConfigHandle = Arc<(AsyncWatchSender<GeneratorConfig>, AsyncWatchReceiver<GeneratorConfig>)>;

impl GeneratorConfig {
    /// Constructs a [`GeneratorConfigHandle`] from this [`GeneratorConfig`]
    pub fn new_handle(self) -> GeneratorConfigHandle {
        GeneratorConfigHandle::new(async_watch_channel(self))
    }

    /// Checks the configuration for values the generator cannot work with.
    pub fn validate(&self) -> Result<(), GeneratorConfigError> {
        if self.max_finished_per_update == 0 {
            return Err(GeneratorConfigError::ZeroBatchSize);
        }
        if self.planet.octaves == 0 {
            return Err(GeneratorConfigError::ZeroOctaves);
        }
        if !(0.0..=1.0).contains(&self.planet.flora_chance) {
            return Err(GeneratorConfigError::InvalidFloraChance(self.planet.flora_chance));
        }
        Ok(())
    }
}
