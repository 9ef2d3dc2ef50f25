//! Point-in-time view of the catalog entries a cart refers to.

use std::collections::HashMap;

use serde::Serialize;

use super::LineKey;
use crate::types::{Money, MoneyError};

/// Price, stock and availability of one purchasable unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogEntry {
    pub item: LineKey,
    pub name: String,
    pub slug: String,
    pub image_url: Option<String>,
    /// Price before any discount.
    pub list_price: Money,
    /// Price the customer pays per unit.
    pub unit_price: Money,
    pub stock: u32,
    pub active: bool,
}

impl CatalogEntry {
    /// Entry for a product or product variant with a percentage discount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidDiscount`] if `discount_percent` is not
    /// within `0..=100`.
    #[allow(clippy::too_many_arguments)]
    pub fn discounted(
        item: LineKey,
        name: impl Into<String>,
        slug: impl Into<String>,
        image_url: Option<String>,
        list_price: Money,
        discount_percent: i32,
        stock: u32,
        active: bool,
    ) -> Result<Self, MoneyError> {
        Ok(Self {
            item,
            name: name.into(),
            slug: slug.into(),
            image_url,
            unit_price: list_price.discounted(discount_percent)?,
            list_price,
            stock,
            active,
        })
    }

    /// Entry for a combo sold at a fixed `price`.
    ///
    /// The list price is the sum of the components' list prices; a fixed
    /// price above it is capped so that savings are never negative.
    #[must_use]
    pub fn combo(
        item: LineKey,
        name: impl Into<String>,
        slug: impl Into<String>,
        image_url: Option<String>,
        price: Money,
        components: &[ComboComponent],
        active: bool,
    ) -> Self {
        let list_price: Money = components
            .iter()
            .map(|c| c.list_price.times(c.quantity))
            .sum();
        let list_price = if list_price < price { price } else { list_price };
        Self {
            item,
            name: name.into(),
            slug: slug.into(),
            image_url,
            list_price,
            unit_price: price,
            stock: combo_stock(components),
            active: active && !components.is_empty(),
        }
    }

    /// Units that may currently be placed in a cart.
    #[must_use]
    pub const fn available(&self) -> u32 {
        if self.active { self.stock } else { 0 }
    }
}

/// One product inside a combo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComboComponent {
    pub list_price: Money,
    pub stock: u32,
    /// Units of this product per combo.
    pub quantity: u32,
    pub active: bool,
}

/// Number of whole combos that can be assembled from component stock.
///
/// An inactive component, or an empty combo, yields zero.
#[must_use]
pub fn combo_stock(components: &[ComboComponent]) -> u32 {
    components
        .iter()
        .map(|c| {
            if c.active && c.quantity > 0 {
                c.stock / c.quantity
            } else {
                0
            }
        })
        .min()
        .unwrap_or(0)
}

/// Catalog entries indexed by line key.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    entries: HashMap<LineKey, CatalogEntry>,
}

impl Catalog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.item, entry);
    }

    #[must_use]
    pub fn get(&self, item: &LineKey) -> Option<&CatalogEntry> {
        self.entries.get(item)
    }

    /// Units available for `item`; zero when unknown or inactive.
    #[must_use]
    pub fn available(&self, item: &LineKey) -> u32 {
        self.get(item).map_or(0, CatalogEntry::available)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<CatalogEntry> for Catalog {
    fn from_iter<I: IntoIterator<Item = CatalogEntry>>(iter: I) -> Self {
        let mut catalog = Self::new();
        for entry in iter {
            catalog.insert(entry);
        }
        catalog
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::{ComboId, ProductId};

    fn rupees(s: &str) -> Money {
        Money::inr(s.parse().unwrap())
    }

    fn component(price: &str, stock: u32, quantity: u32) -> ComboComponent {
        ComboComponent {
            list_price: rupees(price),
            stock,
            quantity,
            active: true,
        }
    }

    #[test]
    fn test_combo_stock_is_limited_by_scarcest_component() {
        let components = [component("100", 10, 1), component("80", 7, 2)];
        assert_eq!(combo_stock(&components), 3);
    }

    #[test]
    fn test_combo_stock_inactive_or_empty() {
        assert_eq!(combo_stock(&[]), 0);
        let mut inactive = component("100", 10, 1);
        inactive.active = false;
        assert_eq!(combo_stock(&[inactive, component("50", 10, 1)]), 0);
    }

    #[test]
    fn test_combo_entry_prices() {
        let entry = CatalogEntry::combo(
            LineKey::combo(ComboId::new(1)),
            "Breakfast Box",
            "breakfast-box",
            None,
            rupees("399"),
            &[component("150", 9, 1), component("125", 9, 2)],
            true,
        );
        assert_eq!(entry.list_price, rupees("400"));
        assert_eq!(entry.unit_price, rupees("399"));
        assert_eq!(entry.stock, 4);
        assert_eq!(entry.available(), 4);
    }

    #[test]
    fn test_combo_price_above_components_is_capped() {
        let entry = CatalogEntry::combo(
            LineKey::combo(ComboId::new(1)),
            "Overpriced",
            "overpriced",
            None,
            rupees("500"),
            &[component("100", 5, 1)],
            true,
        );
        assert_eq!(entry.list_price, rupees("500"));
    }

    #[test]
    fn test_inactive_entry_has_no_availability() {
        let key = LineKey::product(ProductId::new(1));
        let entry = CatalogEntry::discounted(
            key,
            "Ragi Flour",
            "ragi-flour",
            None,
            rupees("120"),
            10,
            50,
            false,
        )
        .unwrap();
        let catalog: Catalog = [entry].into_iter().collect();
        assert_eq!(catalog.available(&key), 0);
        assert_eq!(catalog.available(&LineKey::product(ProductId::new(2))), 0);
    }
}
