//! Catalog entities: products and categories.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::id::ProductId;
use super::price::Price;

/// A product as returned by the remote service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: u64,
    pub available: bool,
    pub category: String,
    pub image_url: String,
}

impl Product {
    /// Whether the product can currently be ordered.
    #[must_use]
    pub const fn in_stock(&self) -> bool {
        self.available && self.stock > 0
    }
}

/// Fields sent to create or update a product. The id is never part of the
/// input; the remote service assigns it on creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    pub description: String,
    pub price: Price,
    pub stock: u64,
    pub available: bool,
    pub category: String,
    pub image_url: String,
}

impl From<&Product> for ProductInput {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price,
            stock: product.stock,
            available: product.available,
            category: product.category.clone(),
            image_url: product.image_url.clone(),
        }
    }
}

/// A product category. Categories have set semantics on the remote
/// service, compared by exact name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    /// Create a category from a trimmed name. Returns `None` when blank.
    #[must_use]
    pub fn new(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            None
        } else {
            Some(Self(name.to_owned()))
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Category {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
