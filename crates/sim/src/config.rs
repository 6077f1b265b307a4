use std::path::Path;

use serde::{Deserialize, Serialize};

/// Errors from loading or validating a [`SimConfig`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("hash_size {0} is not a nonzero power of two")]
    HashSizeNotPowerOfTwo(usize),
    #[error("hash_size {hash_size} must exceed max_entity_count {max_entity_count}")]
    HashTooSmall {
        hash_size: usize,
        max_entity_count: usize,
    },
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

/// Sizing and solver constants for simulation regions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Entity slots reserved per region. Running out is fatal.
    pub max_entity_count: usize,
    /// Slots in the storage-index hash table. Power of two.
    pub hash_size: usize,
    /// Distance (meters) the load bounds extend past the update bounds.
    pub update_safety_margin: f32,
    /// Vertical acceleration applied to the height axis.
    pub gravity: f32,
    /// Upper bound on contact resolution passes per `move_entity` call.
    pub collision_iterations: u32,
    /// Travel fraction backed off from a wall on contact.
    pub wall_epsilon: f32,
    /// Travel budget used for entities without a distance limit.
    pub unlimited_distance: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            max_entity_count: 4096,
            hash_size: 8192,
            update_safety_margin: 1.0,
            gravity: -9.81,
            collision_iterations: 4,
            wall_epsilon: 0.01,
            unlimited_distance: 10_000.0,
        }
    }
}

impl SimConfig {
    /// Load a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(file)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.hash_size.is_power_of_two() {
            return Err(ConfigError::HashSizeNotPowerOfTwo(self.hash_size));
        }
        if self.hash_size <= self.max_entity_count {
            return Err(ConfigError::HashTooSmall {
                hash_size: self.hash_size,
                max_entity_count: self.max_entity_count,
            });
        }
        if self.max_entity_count == 0 {
            return Err(ConfigError::NotPositive("max_entity_count"));
        }
        if self.collision_iterations == 0 {
            return Err(ConfigError::NotPositive("collision_iterations"));
        }
        // Written as negated comparisons so NaN is rejected too.
        if !(self.update_safety_margin > 0.0) {
            return Err(ConfigError::NotPositive("update_safety_margin"));
        }
        if !(self.wall_epsilon > 0.0) {
            return Err(ConfigError::NotPositive("wall_epsilon"));
        }
        if !(self.unlimited_distance > 0.0) {
            return Err(ConfigError::NotPositive("unlimited_distance"));
        }
        Ok(())
    }
}
