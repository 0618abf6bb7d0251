//! Configuration for the catalog repositories

use crate::{CatalogError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration for the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Directory holding the table files
    pub data_dir: PathBuf,

    /// Products table file name
    pub products_file: String,

    /// Initial bucket count for a new products table
    pub product_buckets: u32,

    /// Users table file name
    pub users_file: String,

    /// Initial bucket count for a new users table
    pub user_buckets: u32,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            products_file: "products.db".to_string(),
            product_buckets: 16,
            users_file: "users.db".to_string(),
            user_buckets: 4,
        }
    }
}

impl CatalogConfig {
    /// Create a configuration rooted at `data_dir`
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    /// Set the initial bucket count for the products table
    #[must_use]
    pub const fn with_product_buckets(mut self, buckets: u32) -> Self {
        self.product_buckets = buckets;
        self
    }

    /// Set the initial bucket count for the users table
    #[must_use]
    pub const fn with_user_buckets(mut self, buckets: u32) -> Self {
        self.user_buckets = buckets;
        self
    }

    /// Full path of the products table
    pub fn products_path(&self) -> PathBuf {
        self.data_dir.join(&self.products_file)
    }

    /// Full path of the users table
    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(&self.users_file)
    }

    /// Validate configuration.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidField`] if a bucket count is zero or a
    /// file name is empty.
    pub fn validate(&self) -> Result<()> {
        for (field, buckets) in [
            ("product_buckets", self.product_buckets),
            ("user_buckets", self.user_buckets),
        ] {
            if buckets < 1 {
                return Err(CatalogError::InvalidField {
                    field,
                    reason: "must be at least 1".to_string(),
                });
            }
        }
        for (field, name) in [
            ("products_file", &self.products_file),
            ("users_file", &self.users_file),
        ] {
            if name.trim().is_empty() {
                return Err(CatalogError::InvalidField {
                    field,
                    reason: "must not be empty".to_string(),
                });
            }
        }
        Ok(())
    }
}
