//! Command-line arguments.
//!
//! Options can be provided via CLI arguments or environment variables
//! (`STOCKROOM_DATA_DIR`, `STOCKROOM_PRODUCT_BUCKETS`,
//! `STOCKROOM_USER_BUCKETS`).

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use stockroom_catalog::CatalogConfig;

/// Stockroom command-line tool.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "stockroom",
    about = "Inspect and edit stockroom table files",
    version
)]
pub struct Cli {
    /// Directory holding the catalog tables
    #[arg(long, global = true, env = "STOCKROOM_DATA_DIR", default_value = "./data")]
    pub data_dir: PathBuf,

    /// Initial bucket count for a new products table
    #[arg(
        long,
        global = true,
        env = "STOCKROOM_PRODUCT_BUCKETS",
        default_value_t = 16
    )]
    pub product_buckets: u32,

    /// Initial bucket count for a new users table
    #[arg(long, global = true, env = "STOCKROOM_USER_BUCKETS", default_value_t = 4)]
    pub user_buckets: u32,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Catalog configuration for the selected data directory.
    pub fn catalog_config(&self) -> CatalogConfig {
        CatalogConfig::new(&self.data_dir)
            .with_product_buckets(self.product_buckets)
            .with_user_buckets(self.user_buckets)
    }
}

/// Top-level commands.
#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Print the layout and slot states of a table file
    Inspect(InspectArgs),

    /// Query and edit products
    #[command(subcommand)]
    Products(ProductsCommand),

    /// Query and edit users
    #[command(subcommand)]
    Users(UsersCommand),
}

/// Arguments for `inspect`.
#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    /// Table file to inspect
    pub file: PathBuf,

    /// Record layout of the table
    #[arg(long, value_enum, default_value_t = TableKind::Products)]
    pub kind: TableKind,

    /// Dump every non-empty slot as hex
    #[arg(long)]
    pub slots: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

/// Known table layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TableKind {
    /// `i32` id → 112-byte product
    Products,
    /// 32-byte username → `i32` password hash
    Users,
}

/// `products` subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum ProductsCommand {
    /// List every product
    List,

    /// Show one product
    Get {
        /// Product id
        id: i32,
    },

    /// Add a product; its id is assigned by the table
    Add {
        /// Display name
        #[arg(long)]
        name: String,
        /// Category
        #[arg(long)]
        category: String,
        /// Unit price
        #[arg(long)]
        price: f32,
        /// Currency code
        #[arg(long, default_value = "USD")]
        currency: String,
    },

    /// Change fields of an existing product
    Update {
        /// Product id
        id: i32,
        /// New display name
        #[arg(long)]
        name: Option<String>,
        /// New category
        #[arg(long)]
        category: Option<String>,
        /// New unit price
        #[arg(long)]
        price: Option<f32>,
        /// New currency code
        #[arg(long)]
        currency: Option<String>,
    },

    /// Delete a product
    Delete {
        /// Product id
        id: i32,
    },

    /// List products in a category (exact match)
    Category {
        /// Category name
        category: String,
    },

    /// Search product names (case-insensitive substring)
    Search {
        /// Text to look for
        query: String,
    },
}

/// `users` subcommands.
#[derive(Debug, Clone, Subcommand)]
pub enum UsersCommand {
    /// Show one user
    Get {
        /// Username
        username: String,
    },

    /// Create a user
    Add {
        /// Username (at most 32 bytes)
        username: String,
        /// Password hash
        #[arg(long, allow_negative_numbers = true)]
        password_hash: i32,
    },

    /// Delete a user
    Delete {
        /// Username
        username: String,
    },

    /// Replace the password hash of an existing user
    SetPassword {
        /// Username
        username: String,
        /// New password hash
        #[arg(long, allow_negative_numbers = true)]
        password_hash: i32,
    },
}
