//! Shopping cart as held by the remote service.

use serde::{Deserialize, Serialize};

use super::catalog::Product;
use super::id::ProductId;
use super::price::Price;

/// One line in a cart.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItem {
    pub product_id: ProductId,
    pub quantity: u64,
}

/// A caller's cart. `total_price` is whatever the service reported; use
/// [`Cart::total_for`] to recompute it against a product list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub items: Vec<CartItem>,
    pub total_price: Price,
}

/// Errors that can occur when recomputing a cart total.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartTotalError {
    #[error("cart references unknown product {0}")]
    UnknownProduct(ProductId),
    #[error("cart total overflows")]
    Overflow,
}

impl Cart {
    /// Total number of units across all lines, saturating at `u64::MAX`.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.items
            .iter()
            .fold(0, |count: u64, item| count.saturating_add(item.quantity))
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Recompute Σ quantity × price using the given product prices.
    ///
    /// # Errors
    ///
    /// Returns [`CartTotalError::UnknownProduct`] if a line references a
    /// product not in `products`, or [`CartTotalError::Overflow`] if the
    /// total does not fit in a `u64`.
    pub fn total_for(&self, products: &[Product]) -> Result<Price, CartTotalError> {
        self.items.iter().try_fold(Price::ZERO, |total, item| {
            let product = products
                .iter()
                .find(|p| p.id == item.product_id)
                .ok_or(CartTotalError::UnknownProduct(item.product_id))?;
            product
                .price
                .checked_mul(item.quantity)
                .and_then(|line| total.checked_add(line))
                .ok_or(CartTotalError::Overflow)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: u64, price: u64) -> Product {
        Product {
            id: ProductId::new(id),
            name: format!("p{id}"),
            description: String::new(),
            price: Price::from_minor(price),
            stock: 10,
            available: true,
            category: "Tools".into(),
            image_url: String::new(),
        }
    }

    fn item(id: u64, quantity: u64) -> CartItem {
        CartItem {
            product_id: ProductId::new(id),
            quantity,
        }
    }

    #[test]
    fn test_total_for_sums_lines() {
        let cart = Cart {
            items: vec![item(1, 2), item(2, 3)],
            total_price: Price::ZERO,
        };
        let total = cart.total_for(&[product(1, 1_050), product(2, 99)]);
        assert_eq!(total, Ok(Price::from_minor(2_397)));
        assert_eq!(cart.item_count(), 5);
    }

    #[test]
    fn test_item_count_saturates() {
        let cart = Cart {
            items: vec![item(1, u64::MAX), item(2, 7)],
            total_price: Price::ZERO,
        };
        assert_eq!(cart.item_count(), u64::MAX);
    }

    #[test]
    fn test_total_for_unknown_product() {
        let cart = Cart {
            items: vec![item(9, 1)],
            total_price: Price::ZERO,
        };
        assert_eq!(
            cart.total_for(&[product(1, 1)]),
            Err(CartTotalError::UnknownProduct(ProductId::new(9)))
        );
    }

    #[test]
    fn test_total_for_overflow() {
        let cart = Cart {
            items: vec![item(1, 2)],
            total_price: Price::ZERO,
        };
        assert_eq!(
            cart.total_for(&[product(1, u64::MAX)]),
            Err(CartTotalError::Overflow)
        );
    }

    #[test]
    fn test_empty_cart_totals_zero() {
        assert_eq!(Cart::default().total_for(&[]), Ok(Price::ZERO));
    }
}
