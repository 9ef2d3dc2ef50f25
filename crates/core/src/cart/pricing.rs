//! Cart totals.

use serde::{Deserialize, Serialize};

use super::{Cart, CartAdjustment, CartError, Catalog, LineKey};
use crate::types::Money;

/// Flat-fee shipping, waived at or above a subtotal threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    pub flat_fee: Money,
    pub free_threshold: Money,
}

impl ShippingPolicy {
    #[must_use]
    pub const fn new(flat_fee: Money, free_threshold: Money) -> Self {
        Self {
            flat_fee,
            free_threshold,
        }
    }

    /// Shipping charged for a cart with the given subtotal.
    #[must_use]
    pub fn fee_for(&self, subtotal: Money) -> Money {
        if subtotal.is_zero() || subtotal >= self.free_threshold {
            Money::zero()
        } else {
            self.flat_fee
        }
    }
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self::new(Money::inr(50.into()), Money::inr(499.into()))
    }
}

/// A cart line with its prices resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PricedLine {
    pub item: LineKey,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    pub quantity: u32,
    pub unit_list_price: Money,
    pub unit_price: Money,
    pub line_total: Money,
    /// Units currently in stock, for quantity pickers.
    pub available: u32,
}

/// Priced cart as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartSummary {
    pub lines: Vec<PricedLine>,
    pub item_count: u32,
    pub subtotal: Money,
    pub savings: Money,
    pub shipping_fee: Money,
    pub total: Money,
    /// Changes made while reconciling; empty unless the caller fills it in.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub adjustments: Vec<CartAdjustment>,
}

impl CartSummary {
    #[must_use]
    pub fn with_adjustments(mut self, adjustments: Vec<CartAdjustment>) -> Self {
        self.adjustments = adjustments;
        self
    }
}

/// Price every line of `cart` from `catalog`.
///
/// The subtotal is the sum of discounted line totals; savings are the
/// difference from list prices.
///
/// # Errors
///
/// Returns [`CartError::Unavailable`] if a line's item is not in the catalog.
/// Reconcile first to turn such lines into adjustments instead.
pub fn price_cart(
    cart: &Cart,
    catalog: &Catalog,
    shipping: &ShippingPolicy,
) -> Result<CartSummary, CartError> {
    let lines = cart
        .lines()
        .iter()
        .map(|line| {
            let entry = catalog
                .get(&line.item)
                .ok_or(CartError::Unavailable(line.item))?;
            Ok(PricedLine {
                item: line.item,
                name: entry.name.clone(),
                slug: entry.slug.clone(),
                image_url: entry.image_url.clone(),
                quantity: line.quantity,
                unit_list_price: entry.list_price,
                unit_price: entry.unit_price,
                line_total: entry.unit_price.times(line.quantity),
                available: entry.available(),
            })
        })
        .collect::<Result<Vec<_>, CartError>>()?;

    let subtotal: Money = lines.iter().map(|l| l.line_total).sum();
    let list_total: Money = lines
        .iter()
        .map(|l| l.unit_list_price.times(l.quantity))
        .sum();
    let shipping_fee = shipping.fee_for(subtotal);

    Ok(CartSummary {
        item_count: cart.total_quantity(),
        savings: list_total.saturating_sub(subtotal),
        total: subtotal + shipping_fee,
        subtotal,
        shipping_fee,
        lines,
        adjustments: Vec::new(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::{CartLine, CatalogEntry};
    use crate::types::{ProductId, VariantId};

    const RAGI: LineKey = LineKey::product(ProductId::new(1));
    const FOXTAIL_1KG: LineKey = LineKey::variant(ProductId::new(2), VariantId::new(20));

    fn rupees(s: &str) -> Money {
        Money::inr(s.parse().unwrap())
    }

    fn catalog() -> Catalog {
        [
            CatalogEntry::discounted(RAGI, "Ragi Flour", "ragi-flour", None, rupees("120"), 10, 50, true)
                .unwrap(),
            CatalogEntry::discounted(
                FOXTAIL_1KG,
                "Foxtail Millet (1 kg)",
                "foxtail-millet",
                None,
                rupees("199.99"),
                0,
                5,
                true,
            )
            .unwrap(),
        ]
        .into_iter()
        .collect()
    }

    fn cart(lines: &[(LineKey, u32)]) -> Cart {
        Cart::from_lines(lines.iter().map(|&(item, quantity)| CartLine { item, quantity }))
    }

    #[test]
    fn test_subtotal_is_sum_of_discounted_lines() {
        let summary = price_cart(
            &cart(&[(RAGI, 2), (FOXTAIL_1KG, 1)]),
            &catalog(),
            &ShippingPolicy::default(),
        )
        .unwrap();

        // 2 x 108.00 + 199.99
        assert_eq!(summary.subtotal, rupees("415.99"));
        assert_eq!(summary.savings, rupees("24"));
        assert_eq!(summary.shipping_fee, rupees("50"));
        assert_eq!(summary.total, rupees("465.99"));
        assert_eq!(summary.item_count, 3);
        assert_eq!(
            summary.subtotal,
            summary.lines.iter().map(|l| l.line_total).sum::<Money>()
        );
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let policy = ShippingPolicy::default();
        assert_eq!(policy.fee_for(rupees("499")), Money::zero());
        assert_eq!(policy.fee_for(rupees("498.99")), rupees("50"));
    }

    #[test]
    fn test_empty_cart_has_no_shipping() {
        let summary =
            price_cart(&Cart::new(), &catalog(), &ShippingPolicy::default()).unwrap();
        assert!(summary.total.is_zero());
        assert!(summary.lines.is_empty());
    }

    #[test]
    fn test_unknown_item_is_unavailable() {
        let unknown = LineKey::product(ProductId::new(99));
        assert_eq!(
            price_cart(&cart(&[(unknown, 1)]), &catalog(), &ShippingPolicy::default()),
            Err(CartError::Unavailable(unknown))
        );
    }
}
