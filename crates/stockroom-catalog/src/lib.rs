//! Product catalog and user records stored in disk hash tables.
//!
//! Each repository owns the path of one table file and opens the table for
//! the duration of a single operation, so no file handle or mapping is held
//! between calls.
//!
//! - [`ProductsRepository`]: products keyed by an `i32` id minted from the
//!   table's serial counter
//! - [`UsersRepository`]: password hashes keyed by a 32-byte username
//! - [`ProductsService`]: catalog queries (category, name search) as linear
//!   scans over the repository, with storage failures reported as empty
//!   results
//!
//! # Example
//!
//! ```rust,no_run
//! use stockroom_catalog::{CatalogConfig, Product, ProductsRepository};
//!
//! # fn example() -> stockroom_catalog::Result<()> {
//! let config = CatalogConfig::new("./data");
//! let repo = ProductsRepository::from_config(&config);
//!
//! let mut product = Product::new("Clean Code", "Books", 38.0, "USD");
//! repo.insert_product(&mut product)?;
//! println!("assigned id {}", product.id);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use stockroom_storage::StoreError;
use thiserror::Error;

// Configuration
pub mod config;

// Entities
pub mod entities;

// Product table codec and repository
pub mod products;

// User table repository
pub mod users;

// Catalog queries
pub mod service;

pub use config::CatalogConfig;
pub use entities::{Product, User};
pub use products::{ProductCodec, ProductsRepository};
pub use service::ProductsService;
pub use users::UsersRepository;

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Underlying table failure.
    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    /// I/O error outside the table (e.g. creating the data directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The serial counter no longer fits an entity id.
    #[error("Identifier space exhausted at serial {0}")]
    IdsExhausted(u32),

    /// A field cannot be stored as given.
    #[error("Invalid {field}: {reason}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Why it was rejected
        reason: String,
    },
}
