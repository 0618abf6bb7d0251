//! Catalog entities.

use crate::{CatalogError, Result};
use serde::{Deserialize, Serialize};

/// A catalog product.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Product {
    /// Identifier, assigned by the repository on insert.
    pub id: i32,
    /// Unit price.
    pub price: f32,
    /// Display name (at most 64 bytes are stored).
    pub name: String,
    /// Category (at most 32 bytes are stored).
    pub category: String,
    /// Currency code such as `USD` or `EURO` (at most 8 bytes are stored).
    pub currency: String,
}

impl Product {
    /// Create a product without an id.
    pub fn new(
        name: impl Into<String>,
        category: impl Into<String>,
        price: f32,
        currency: impl Into<String>,
    ) -> Self {
        Self {
            id: 0,
            price,
            name: name.into(),
            category: category.into(),
            currency: currency.into(),
        }
    }

    /// Check the fields a stored product must have.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::InvalidField`] for a blank name or currency
    /// and for a negative or NaN price.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be blank"));
        }
        if self.price.is_nan() || self.price < 0.0 {
            return Err(invalid("price", "must be >= 0"));
        }
        if self.currency.trim().is_empty() {
            return Err(invalid("currency", "must not be blank"));
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: &str) -> CatalogError {
    CatalogError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

/// A registered user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Unique username (at most 32 bytes).
    pub username: String,
    /// Password hash computed by the caller.
    pub password_hash: i32,
}

impl User {
    /// Create a user record.
    pub fn new(username: impl Into<String>, password_hash: i32) -> Self {
        Self {
            username: username.into(),
            password_hash,
        }
    }
}
