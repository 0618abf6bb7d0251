//! Catalog queries over the products repository.
//!
//! Storage failures are logged and reported as "nothing found" so callers
//! serving a catalog page never have to handle them.

use crate::entities::Product;
use crate::products::ProductsRepository;
use tracing::warn;

/// Product catalog operations.
#[derive(Debug)]
pub struct ProductsService {
    repository: ProductsRepository,
}

impl ProductsService {
    /// Service over `repository`.
    pub const fn new(repository: ProductsRepository) -> Self {
        Self { repository }
    }

    /// Underlying repository.
    pub const fn repository(&self) -> &ProductsRepository {
        &self.repository
    }

    /// Every product.
    pub fn all_products(&self) -> Vec<Product> {
        self.repository.products().unwrap_or_else(|e| {
            warn!("Failed to list products: {}", e);
            Vec::new()
        })
    }

    /// Product with `id`, if any.
    pub fn get(&self, id: i32) -> Option<Product> {
        self.repository.get_product(id).unwrap_or_else(|e| {
            warn!("Failed to load product {}: {}", id, e);
            None
        })
    }

    /// Products whose category equals `category` exactly.
    pub fn products_by_category(&self, category: &str) -> Vec<Product> {
        self.filter(|p| p.category == category)
    }

    /// Products whose name contains `query`, ignoring case.
    ///
    /// A blank query matches nothing.
    pub fn search_by_name(&self, query: &str) -> Vec<Product> {
        let query = query.trim();
        if query.is_empty() {
            return Vec::new();
        }
        let needle = query.to_lowercase();
        self.filter(|p| p.name.to_lowercase().contains(&needle))
    }

    /// Insert `product`, assigning its id. Returns whether it was stored.
    pub fn insert(&self, product: &mut Product) -> bool {
        self.repository.insert_product(product).unwrap_or_else(|e| {
            warn!("Failed to insert product {}: {}", product.name, e);
            false
        })
    }

    /// Replace an existing product. Returns `false` if it does not exist.
    pub fn update(&self, product: &Product) -> bool {
        self.repository.update_product(product).unwrap_or_else(|e| {
            warn!("Failed to update product {}: {}", product.id, e);
            false
        })
    }

    /// Delete the product with `id`. Returns whether it existed.
    pub fn delete(&self, id: i32) -> bool {
        self.repository.delete_product(id).unwrap_or_else(|e| {
            warn!("Failed to delete product {}: {}", id, e);
            false
        })
    }

    fn filter(&self, keep: impl Fn(&Product) -> bool) -> Vec<Product> {
        self.all_products().into_iter().filter(|p| keep(p)).collect()
    }
}
