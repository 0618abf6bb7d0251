//! Configuration for disk hash tables

use crate::{Result, StoreError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default load factor above which a table grows.
pub const DEFAULT_MAX_LOAD_FACTOR: f64 = 0.75;

/// Default capacity multiplier applied on growth.
pub const DEFAULT_GROWTH_FACTOR: u32 = 2;

/// Configuration for a disk hash table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableConfig {
    /// Backing file
    pub path: PathBuf,

    /// Slot count used when the file is created
    pub initial_capacity: u32,

    /// Growth is triggered once `entry_count / capacity` exceeds this
    pub max_load_factor: f64,

    /// New capacity is the old capacity times this factor
    pub growth_factor: u32,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./data/table.db"),
            initial_capacity: 16,
            max_load_factor: DEFAULT_MAX_LOAD_FACTOR,
            growth_factor: DEFAULT_GROWTH_FACTOR,
        }
    }
}

impl TableConfig {
    /// Create a configuration for `path` with the given initial capacity
    pub fn new<P: AsRef<Path>>(path: P, initial_capacity: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            initial_capacity,
            ..Default::default()
        }
    }

    /// Set the backing file
    #[must_use]
    pub fn with_path<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.path = path.as_ref().to_path_buf();
        self
    }

    /// Set the initial capacity
    #[must_use]
    pub const fn with_initial_capacity(mut self, capacity: u32) -> Self {
        self.initial_capacity = capacity;
        self
    }

    /// Set the maximum load factor
    #[must_use]
    pub const fn with_max_load_factor(mut self, load_factor: f64) -> Self {
        self.max_load_factor = load_factor;
        self
    }

    /// Set the growth factor
    #[must_use]
    pub const fn with_growth_factor(mut self, factor: u32) -> Self {
        self.growth_factor = factor;
        self
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Config`] if:
    /// - the initial capacity is zero
    /// - the load factor is not strictly between 0 and 1
    /// - the growth factor is below 2
    pub fn validate(&self) -> Result<()> {
        if self.initial_capacity < 1 {
            return Err(StoreError::Config(
                "capacity must be at least 1".to_string(),
            ));
        }
        if !(self.max_load_factor > 0.0 && self.max_load_factor < 1.0) {
            return Err(StoreError::Config(format!(
                "max load factor must be in (0, 1), got {}",
                self.max_load_factor
            )));
        }
        if self.growth_factor < 2 {
            return Err(StoreError::Config(format!(
                "growth factor must be at least 2, got {}",
                self.growth_factor
            )));
        }
        Ok(())
    }
}
