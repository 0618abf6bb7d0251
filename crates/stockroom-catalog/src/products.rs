//! Products table: fixed-width product codec and repository.
//!
//! Product record layout (112 bytes, little-endian):
//!
//! | Offset | Size | Field |
//! |--------|------|-------|
//! | 0x00 | 4  | Id (`i32`) |
//! | 0x04 | 32 | Category (UTF-8, zero-padded) |
//! | 0x24 | 4  | Price (`f32` bits through the `i32` path) |
//! | 0x28 | 64 | Name (UTF-8, zero-padded) |
//! | 0x68 | 8  | Currency (UTF-8, zero-padded) |
//!
//! The table key is the id, hashed with the identity hash.

use crate::config::CatalogConfig;
use crate::entities::Product;
use crate::{CatalogError, Result};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use stockroom_storage::codec::{F32Codec, FixedStringCodec, I32Codec, window, window_mut};
use stockroom_storage::hash::IdentityHash;
use stockroom_storage::{DiskHashTable, FixedCodec};
use tracing::debug;

/// Encoded product size in bytes.
pub const PRODUCT_SIZE: usize = 0x70;

const ID_OFFSET: usize = 0x00;
const CATEGORY_OFFSET: usize = 0x04;
const PRICE_OFFSET: usize = 0x24;
const NAME_OFFSET: usize = 0x28;
const CURRENCY_OFFSET: usize = 0x68;

/// Category width in bytes.
pub const CATEGORY_BYTES: usize = 32;
/// Name width in bytes.
pub const NAME_BYTES: usize = 64;
/// Currency width in bytes.
pub const CURRENCY_BYTES: usize = 8;

/// Fixed-width codec for [`Product`].
#[derive(Debug, Clone, Copy)]
pub struct ProductCodec {
    category: FixedStringCodec,
    name: FixedStringCodec,
    currency: FixedStringCodec,
}

impl Default for ProductCodec {
    fn default() -> Self {
        Self {
            category: FixedStringCodec::new(CATEGORY_BYTES),
            name: FixedStringCodec::new(NAME_BYTES),
            currency: FixedStringCodec::new(CURRENCY_BYTES),
        }
    }
}

impl FixedCodec for ProductCodec {
    type Value = Product;

    fn fixed_size(&self) -> usize {
        PRODUCT_SIZE
    }

    fn write(&self, buf: &mut [u8], offset: usize, p: &Product) -> stockroom_storage::Result<()> {
        let out = window_mut(buf, offset, PRODUCT_SIZE)?;
        I32Codec.write(out, ID_OFFSET, &p.id)?;
        self.category.write(out, CATEGORY_OFFSET, &p.category)?;
        F32Codec.write(out, PRICE_OFFSET, &p.price)?;
        self.name.write(out, NAME_OFFSET, &p.name)?;
        self.currency.write(out, CURRENCY_OFFSET, &p.currency)
    }

    fn read(&self, buf: &[u8], offset: usize) -> stockroom_storage::Result<Product> {
        let raw = window(buf, offset, PRODUCT_SIZE)?;
        Ok(Product {
            id: I32Codec.read(raw, ID_OFFSET)?,
            category: self.category.read(raw, CATEGORY_OFFSET)?,
            price: F32Codec.read(raw, PRICE_OFFSET)?,
            name: self.name.read(raw, NAME_OFFSET)?,
            currency: self.currency.read(raw, CURRENCY_OFFSET)?,
        })
    }
}

/// Products table type.
pub type ProductTable = DiskHashTable<I32Codec, ProductCodec, IdentityHash>;

/// Disk-backed product repository.
///
/// The table is opened per operation and closed before returning. Calls on
/// one repository are serialized so two of them never map the file at once.
#[derive(Debug)]
pub struct ProductsRepository {
    path: PathBuf,
    initial_buckets: u32,
    lock: Mutex<()>,
}

impl ProductsRepository {
    /// Repository over the table at `path`.
    pub fn new(path: impl AsRef<Path>, initial_buckets: u32) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            initial_buckets,
            lock: Mutex::new(()),
        }
    }

    /// Repository over the products table of `config`.
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self::new(config.products_path(), config.product_buckets)
    }

    /// Path of the products table.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open the products table, creating its directory if needed.
    pub fn open(&self) -> Result<ProductTable> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        Ok(DiskHashTable::open(
            &self.path,
            self.initial_buckets,
            I32Codec,
            ProductCodec::default(),
            IdentityHash,
        )?)
    }

    /// Product with `id`, if any.
    pub fn get_product(&self, id: i32) -> Result<Option<Product>> {
        let _guard = self.lock.lock();
        let table = self.open()?;
        let product = table.get(&id)?;
        table.close()?;
        Ok(product)
    }

    /// Every product, in slot order.
    pub fn products(&self) -> Result<Vec<Product>> {
        let _guard = self.lock.lock();
        let table = self.open()?;
        let products = table.values()?;
        table.close()?;
        Ok(products)
    }

    /// Insert `product` under a newly minted id.
    ///
    /// The id is the table's serial counter; on success it is written back
    /// into `product.id`. Returns `false` if that id is already taken.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidField`] if the product fails
    /// [`Product::validate`]; nothing is written in that case.
    pub fn insert_product(&self, product: &mut Product) -> Result<bool> {
        product.validate()?;

        let _guard = self.lock.lock();
        let mut table = self.open()?;

        let serial = table.header()?.serial_count;
        let id = i32::try_from(serial).map_err(|_| CatalogError::IdsExhausted(serial))?;
        let mut stored = product.clone();
        stored.id = id;

        let minted = table.insert_with_serial(|_| (id, stored))?;
        table.close()?;

        if minted.is_some() {
            product.id = id;
            debug!("Inserted product {} into {}", id, self.path.display());
        }
        Ok(minted.is_some())
    }

    /// Replace the stored product with the same id. Returns `false` if there
    /// is none.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidField`] if the product fails
    /// [`Product::validate`].
    pub fn update_product(&self, product: &Product) -> Result<bool> {
        product.validate()?;

        let _guard = self.lock.lock();
        let mut table = self.open()?;

        let updated = if table.contains_key(&product.id)? {
            table.put(product.id, product.clone())?;
            true
        } else {
            false
        };
        table.close()?;
        Ok(updated)
    }

    /// Delete the product with `id`. Returns whether one was removed.
    pub fn delete_product(&self, id: i32) -> Result<bool> {
        let _guard = self.lock.lock();
        let mut table = self.open()?;
        let removed = table.remove(&id)?;
        table.close()?;
        Ok(removed.is_some())
    }
}
