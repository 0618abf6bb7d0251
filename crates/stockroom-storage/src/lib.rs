//! Persistent, memory-mapped, open-addressing hash table.
//!
//! The crate is built in three layers:
//!
//! - **Codecs** ([`codec`]): fixed-width encoders/decoders for one value type
//! - **Disk array** ([`disk_array`]): a growable, memory-mapped, fixed-stride
//!   array with an optional fixed-size header region
//! - **Hash table** ([`table`]): linear-probing hash table with tombstone
//!   deletion and load-factor-triggered growth, stored in a disk array
//!
//! # File Layout
//!
//! All integers are little-endian.
//!
//! ```text
//! [capacity: u32][header (optional, fixed width)][slot 0][slot 1]...[slot capacity-1]
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use stockroom_storage::codec::{FixedStringCodec, I32Codec};
//! use stockroom_storage::hash::PolyStringHash;
//! use stockroom_storage::DiskHashTable;
//!
//! # fn example() -> stockroom_storage::Result<()> {
//! let mut table = DiskHashTable::open(
//!     "users.db",
//!     8,
//!     FixedStringCodec::new(32),
//!     I32Codec,
//!     PolyStringHash,
//! )?;
//!
//! table.put("alice".to_string(), 42)?;
//! assert_eq!(table.get(&"alice".to_string())?, Some(42));
//! table.close()?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use thiserror::Error;

// Fixed-width codecs
pub mod codec;

// Memory-mapped fixed-stride array
pub mod disk_array;

// Open-addressing hash table
pub mod table;

// Hash functions for table keys
pub mod hash;

// Configuration
pub mod config;

pub use codec::FixedCodec;
pub use config::TableConfig;
pub use disk_array::{DiskArray, NoHeader};
pub use hash::HashFunction;
pub use table::{DiskHashTable, Slot, TableHeader};

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// I/O error occurred while opening, sizing, mapping or syncing a file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid construction parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Element index outside `[0, capacity)`.
    #[error("Index {index} out of bounds for capacity {capacity}")]
    IndexOutOfBounds {
        /// Requested index
        index: u64,
        /// Capacity at the time of the access
        capacity: u32,
    },

    /// Byte window outside the buffer it addresses.
    #[error("Byte range {offset}..{offset}+{len} outside buffer of {size} bytes")]
    OutOfRange {
        /// Start of the window
        offset: usize,
        /// Length of the window
        len: usize,
        /// Size of the addressed buffer
        size: usize,
    },

    /// Operation not valid for how the array was configured.
    #[error("Invalid state: {0}")]
    State(String),

    /// On-disk bytes that cannot be decoded.
    #[error("Data corruption detected: {0}")]
    Corruption(String),

    /// Backing file cannot be opened or mapped.
    #[error("Failed to open {path}: {source}")]
    OpenFailed {
        /// Backing file
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Version information for the storage crate.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
