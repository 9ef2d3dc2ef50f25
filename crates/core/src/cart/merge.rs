//! Merging and reconciling carts against the current catalog.

use serde::Serialize;

use super::{Cart, CartLine, Catalog, LineKey, MAX_LINE_QUANTITY};

/// Why a line was dropped during reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    /// The item no longer exists or has been deactivated.
    Unavailable,
    /// The item exists but has no stock left.
    OutOfStock,
}

/// A change made to a cart so that it fits the catalog again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CartAdjustment {
    Removed {
        item: LineKey,
        reason: RemovalReason,
    },
    QuantityReduced {
        item: LineKey,
        requested: u32,
        granted: u32,
    },
}

impl Cart {
    /// Fold `guest` into this cart, summing quantities per item, then
    /// reconcile the result against `catalog`.
    ///
    /// Lines already in this cart keep their position; new guest lines are
    /// appended in guest order.
    pub fn merge(&mut self, guest: &Self, catalog: &Catalog) -> Vec<CartAdjustment> {
        let combined = self.lines.iter().chain(guest.lines.iter()).copied();
        *self = Self::from_lines(combined);
        self.reconcile(catalog)
    }

    /// Drop lines whose item is missing, inactive or sold out, and clamp the
    /// rest to current stock and [`MAX_LINE_QUANTITY`].
    pub fn reconcile(&mut self, catalog: &Catalog) -> Vec<CartAdjustment> {
        let mut adjustments = Vec::new();
        let mut kept = Vec::with_capacity(self.lines.len());

        for line in self.lines.drain(..) {
            let Some(entry) = catalog.get(&line.item).filter(|e| e.active) else {
                adjustments.push(CartAdjustment::Removed {
                    item: line.item,
                    reason: RemovalReason::Unavailable,
                });
                continue;
            };

            let granted = line.quantity.min(entry.stock).min(MAX_LINE_QUANTITY);
            if granted == 0 {
                adjustments.push(CartAdjustment::Removed {
                    item: line.item,
                    reason: RemovalReason::OutOfStock,
                });
                continue;
            }
            if granted < line.quantity {
                adjustments.push(CartAdjustment::QuantityReduced {
                    item: line.item,
                    requested: line.quantity,
                    granted,
                });
            }
            kept.push(CartLine {
                item: line.item,
                quantity: granted,
            });
        }

        self.lines = kept;
        adjustments
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::cart::CatalogEntry;
    use crate::types::{ComboId, Money, ProductId};

    const RAGI: LineKey = LineKey::product(ProductId::new(1));
    const JOWAR: LineKey = LineKey::product(ProductId::new(2));
    const KODO: LineKey = LineKey::product(ProductId::new(3));
    const COMBO: LineKey = LineKey::combo(ComboId::new(1));

    fn entry(item: LineKey, stock: u32, active: bool) -> CatalogEntry {
        CatalogEntry::discounted(
            item,
            item.to_string(),
            "slug",
            None,
            Money::inr(100.into()),
            0,
            stock,
            active,
        )
        .unwrap()
    }

    fn cart(lines: &[(LineKey, u32)]) -> Cart {
        Cart::from_lines(lines.iter().map(|&(item, quantity)| CartLine { item, quantity }))
    }

    #[test]
    fn test_merge_sums_quantities() {
        let catalog: Catalog = [entry(RAGI, 10, true), entry(JOWAR, 10, true)]
            .into_iter()
            .collect();
        let mut user = cart(&[(RAGI, 2)]);
        let guest = cart(&[(RAGI, 3), (JOWAR, 1)]);

        let adjustments = user.merge(&guest, &catalog);

        assert!(adjustments.is_empty());
        assert_eq!(user.quantity_of(&RAGI), 5);
        assert_eq!(user.quantity_of(&JOWAR), 1);
        assert_eq!(user.lines().first().map(|l| l.item), Some(RAGI));
    }

    #[test]
    fn test_merge_clamps_to_stock() {
        let catalog: Catalog = [entry(RAGI, 4, true)].into_iter().collect();
        let mut user = cart(&[(RAGI, 3)]);
        let guest = cart(&[(RAGI, 3)]);

        let adjustments = user.merge(&guest, &catalog);

        assert_eq!(user.quantity_of(&RAGI), 4);
        assert_eq!(
            adjustments,
            vec![CartAdjustment::QuantityReduced {
                item: RAGI,
                requested: 6,
                granted: 4
            }]
        );
    }

    #[test]
    fn test_merge_into_empty_cart_is_guest_cart() {
        let catalog: Catalog = [entry(RAGI, 10, true)].into_iter().collect();
        let mut user = Cart::new();
        let guest = cart(&[(RAGI, 2)]);
        user.merge(&guest, &catalog);
        assert_eq!(user, guest);
    }

    #[test]
    fn test_reconcile_drops_unavailable_items() {
        let catalog: Catalog = [entry(RAGI, 5, true), entry(JOWAR, 0, true), entry(KODO, 9, false)]
            .into_iter()
            .collect();
        let mut stored = cart(&[(RAGI, 1), (JOWAR, 2), (KODO, 1), (COMBO, 1)]);

        let adjustments = stored.reconcile(&catalog);

        assert_eq!(stored.lines().len(), 1);
        assert_eq!(stored.quantity_of(&RAGI), 1);
        assert_eq!(
            adjustments,
            vec![
                CartAdjustment::Removed {
                    item: JOWAR,
                    reason: RemovalReason::OutOfStock
                },
                CartAdjustment::Removed {
                    item: KODO,
                    reason: RemovalReason::Unavailable
                },
                CartAdjustment::Removed {
                    item: COMBO,
                    reason: RemovalReason::Unavailable
                },
            ]
        );
    }

    #[test]
    fn test_reconcile_caps_line_quantity() {
        let catalog: Catalog = [entry(RAGI, 500, true)].into_iter().collect();
        let mut stored = cart(&[(RAGI, 150)]);
        stored.reconcile(&catalog);
        assert_eq!(stored.quantity_of(&RAGI), MAX_LINE_QUANTITY);
    }

    #[test]
    fn test_adjustment_json_shape() {
        let json = serde_json::to_value(CartAdjustment::Removed {
            item: RAGI,
            reason: RemovalReason::OutOfStock,
        })
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "removed",
                "item": {"kind": "product", "product_id": 1},
                "reason": "out_of_stock"
            })
        );
    }
}
