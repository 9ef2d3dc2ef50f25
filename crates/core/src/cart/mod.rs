//! Shopping cart domain.
//!
//! A [`Cart`] is a list of [`CartLine`]s keyed by [`LineKey`]. The same type
//! backs both guest carts (serialized into the visitor's session) and user
//! carts (rows in `cart_item`), so merging on login is plain cart
//! arithmetic.
//!
//! Every mutation takes the currently available stock for the line, which
//! keeps `0 < quantity <= stock` true for every line the cart accepts.
//! Stock can still move underneath a stored cart; [`Cart::reconcile`]
//! re-establishes the invariant against a fresh [`Catalog`].

mod catalog;
mod merge;
mod pricing;

use core::fmt;

use serde::{Deserialize, Serialize};

use crate::types::{ComboId, ProductId, VariantId};

pub use catalog::{Catalog, CatalogEntry, ComboComponent, combo_stock};
pub use merge::{CartAdjustment, RemovalReason};
pub use pricing::{CartSummary, PricedLine, ShippingPolicy, price_cart};

/// Upper bound on a single line's quantity.
pub const MAX_LINE_QUANTITY: u32 = 99;

/// Identity of a purchasable unit: a product (optionally a specific
/// variant of it) or a combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LineKey {
    Product {
        product_id: ProductId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        variant_id: Option<VariantId>,
    },
    Combo {
        combo_id: ComboId,
    },
}

impl LineKey {
    #[must_use]
    pub const fn product(product_id: ProductId) -> Self {
        Self::Product {
            product_id,
            variant_id: None,
        }
    }

    #[must_use]
    pub const fn variant(product_id: ProductId, variant_id: VariantId) -> Self {
        Self::Product {
            product_id,
            variant_id: Some(variant_id),
        }
    }

    #[must_use]
    pub const fn combo(combo_id: ComboId) -> Self {
        Self::Combo { combo_id }
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product {
                product_id,
                variant_id: None,
            } => write!(f, "product {product_id}"),
            Self::Product {
                product_id,
                variant_id: Some(variant_id),
            } => write!(f, "product {product_id} (variant {variant_id})"),
            Self::Combo { combo_id } => write!(f, "combo {combo_id}"),
        }
    }
}

/// Errors from cart mutations and pricing.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CartError {
    #[error("quantity must be greater than zero")]
    InvalidQuantity,
    #[error("only {available} left in stock (requested {requested})")]
    OutOfStock { requested: u32, available: u32 },
    #[error("at most {max} of a single item per order")]
    QuantityLimit { max: u32 },
    #[error("{0} is not available")]
    Unavailable(LineKey),
    #[error("{0} is not in the cart")]
    NotInCart(LineKey),
    #[error("the cart is empty")]
    Empty,
}

/// One line of a cart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub item: LineKey,
    pub quantity: u32,
}

/// A cart: at most one line per [`LineKey`], insertion ordered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Build a cart from raw lines, folding duplicate keys together and
    /// dropping zero quantities. Stock is not checked; call
    /// [`Cart::reconcile`] afterwards.
    #[must_use]
    pub fn from_lines(lines: impl IntoIterator<Item = CartLine>) -> Self {
        let mut cart = Self::new();
        for line in lines {
            if line.quantity == 0 {
                continue;
            }
            match cart.position(&line.item) {
                Some(idx) => {
                    if let Some(existing) = cart.lines.get_mut(idx) {
                        existing.quantity = existing.quantity.saturating_add(line.quantity);
                    }
                }
                None => cart.lines.push(line),
            }
        }
        cart
    }

    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Total number of units across all lines.
    #[must_use]
    pub fn total_quantity(&self) -> u32 {
        self.lines.iter().map(|l| l.quantity).sum()
    }

    /// Quantity currently held for `item` (0 when absent).
    #[must_use]
    pub fn quantity_of(&self, item: &LineKey) -> u32 {
        self.lines
            .iter()
            .find(|l| l.item == *item)
            .map_or(0, |l| l.quantity)
    }

    /// Add `quantity` units of `item`, given `available` units in stock.
    ///
    /// Returns the line's new quantity.
    ///
    /// # Errors
    ///
    /// - [`CartError::InvalidQuantity`] if `quantity` is zero
    /// - [`CartError::OutOfStock`] if the combined line would exceed `available`
    /// - [`CartError::QuantityLimit`] if it would exceed [`MAX_LINE_QUANTITY`]
    pub fn add(&mut self, item: LineKey, quantity: u32, available: u32) -> Result<u32, CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }
        let requested = self.quantity_of(&item).saturating_add(quantity);
        check_quantity(requested, available)?;

        match self.position(&item) {
            Some(idx) => {
                if let Some(line) = self.lines.get_mut(idx) {
                    line.quantity = requested;
                }
            }
            None => self.lines.push(CartLine {
                item,
                quantity: requested,
            }),
        }
        Ok(requested)
    }

    /// Set the quantity of an existing line. Zero removes it.
    ///
    /// # Errors
    ///
    /// - [`CartError::NotInCart`] if `item` has no line
    /// - [`CartError::OutOfStock`] / [`CartError::QuantityLimit`] as for [`Cart::add`]
    pub fn set_quantity(
        &mut self,
        item: LineKey,
        quantity: u32,
        available: u32,
    ) -> Result<(), CartError> {
        let idx = self.position(&item).ok_or(CartError::NotInCart(item))?;
        if quantity == 0 {
            self.lines.remove(idx);
            return Ok(());
        }
        check_quantity(quantity, available)?;
        if let Some(line) = self.lines.get_mut(idx) {
            line.quantity = quantity;
        }
        Ok(())
    }

    /// Remove a line. Returns whether it was present.
    pub fn remove(&mut self, item: &LineKey) -> bool {
        let before = self.lines.len();
        self.lines.retain(|l| l.item != *item);
        self.lines.len() != before
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn position(&self, item: &LineKey) -> Option<usize> {
        self.lines.iter().position(|l| l.item == *item)
    }
}

const fn check_quantity(requested: u32, available: u32) -> Result<(), CartError> {
    if requested > MAX_LINE_QUANTITY {
        return Err(CartError::QuantityLimit {
            max: MAX_LINE_QUANTITY,
        });
    }
    if requested > available {
        return Err(CartError::OutOfStock {
            requested,
            available,
        });
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const RAGI: LineKey = LineKey::product(ProductId::new(1));
    const FOXTAIL_1KG: LineKey = LineKey::variant(ProductId::new(2), VariantId::new(20));
    const BREAKFAST_COMBO: LineKey = LineKey::combo(ComboId::new(7));

    #[test]
    fn test_add_new_and_existing_line() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(RAGI, 2, 10).unwrap(), 2);
        assert_eq!(cart.add(RAGI, 3, 10).unwrap(), 5);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.total_quantity(), 5);
    }

    #[test]
    fn test_add_out_of_stock_is_rejected() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add(RAGI, 1, 0),
            Err(CartError::OutOfStock {
                requested: 1,
                available: 0
            })
        );
        assert!(cart.is_empty());
    }

    #[test]
    fn test_add_beyond_stock_keeps_previous_quantity() {
        let mut cart = Cart::new();
        cart.add(FOXTAIL_1KG, 4, 5).unwrap();
        assert!(matches!(
            cart.add(FOXTAIL_1KG, 2, 5),
            Err(CartError::OutOfStock {
                requested: 6,
                available: 5
            })
        ));
        assert_eq!(cart.quantity_of(&FOXTAIL_1KG), 4);
    }

    #[test]
    fn test_add_zero_quantity() {
        let mut cart = Cart::new();
        assert_eq!(cart.add(RAGI, 0, 10), Err(CartError::InvalidQuantity));
    }

    #[test]
    fn test_quantity_limit() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.add(RAGI, MAX_LINE_QUANTITY + 1, 1_000),
            Err(CartError::QuantityLimit {
                max: MAX_LINE_QUANTITY
            })
        );
    }

    #[test]
    fn test_set_quantity_and_remove_by_zero() {
        let mut cart = Cart::new();
        cart.add(BREAKFAST_COMBO, 1, 3).unwrap();
        cart.set_quantity(BREAKFAST_COMBO, 3, 3).unwrap();
        assert_eq!(cart.quantity_of(&BREAKFAST_COMBO), 3);
        cart.set_quantity(BREAKFAST_COMBO, 0, 3).unwrap();
        assert!(cart.is_empty());
    }

    #[test]
    fn test_set_quantity_missing_line() {
        let mut cart = Cart::new();
        assert_eq!(
            cart.set_quantity(RAGI, 1, 10),
            Err(CartError::NotInCart(RAGI))
        );
    }

    #[test]
    fn test_remove() {
        let mut cart = Cart::new();
        cart.add(RAGI, 1, 10).unwrap();
        assert!(cart.remove(&RAGI));
        assert!(!cart.remove(&RAGI));
    }

    #[test]
    fn test_from_lines_folds_duplicates() {
        let cart = Cart::from_lines([
            CartLine {
                item: RAGI,
                quantity: 1,
            },
            CartLine {
                item: BREAKFAST_COMBO,
                quantity: 0,
            },
            CartLine {
                item: RAGI,
                quantity: 2,
            },
        ]);
        assert_eq!(cart.lines().len(), 1);
        assert_eq!(cart.quantity_of(&RAGI), 3);
    }

    #[test]
    fn test_line_key_json_shape() {
        let json = serde_json::to_value(FOXTAIL_1KG).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"kind": "product", "product_id": 2, "variant_id": 20})
        );
        let combo: LineKey =
            serde_json::from_value(serde_json::json!({"kind": "combo", "combo_id": 7})).unwrap();
        assert_eq!(combo, BREAKFAST_COMBO);
        let plain: LineKey =
            serde_json::from_value(serde_json::json!({"kind": "product", "product_id": 1}))
                .unwrap();
        assert_eq!(plain, RAGI);
    }

    #[test]
    fn test_line_key_display() {
        assert_eq!(RAGI.to_string(), "product 1");
        assert_eq!(FOXTAIL_1KG.to_string(), "product 2 (variant 20)");
        assert_eq!(BREAKFAST_COMBO.to_string(), "combo 7");
    }
}
