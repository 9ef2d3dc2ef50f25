//! Catalog domain types: products, variants and combos.

use chrono::{DateTime, Utc};
use serde::Serialize;

use milletmart_core::cart::{CatalogEntry, ComboComponent, LineKey};
use milletmart_core::{ComboId, Money, MoneyError, ProductId, VariantId};

/// A product as listed in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub category: String,
    /// List price.
    pub price: Money,
    pub discount_percent: i32,
    /// Price after the discount.
    pub effective_price: Money,
    pub stock: u32,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub variants: Vec<Variant>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A pack size of a product with its own price and stock.
#[derive(Debug, Clone, Serialize)]
pub struct Variant {
    pub id: VariantId,
    pub product_id: ProductId,
    pub label: String,
    pub price: Money,
    /// Price after the parent product's discount.
    pub effective_price: Money,
    pub stock: u32,
}

impl Product {
    /// Catalog entry for the product itself (no variant).
    #[must_use]
    pub fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            item: LineKey::product(self.id),
            name: self.name.clone(),
            slug: self.slug.clone(),
            image_url: self.image_url.clone(),
            list_price: self.price,
            unit_price: self.effective_price,
            stock: self.stock,
            active: self.is_active,
        }
    }

    /// Catalog entry for one of this product's variants.
    #[must_use]
    pub fn variant_entry(&self, variant: &Variant) -> CatalogEntry {
        CatalogEntry {
            item: LineKey::variant(self.id, variant.id),
            name: format!("{} ({})", self.name, variant.label),
            slug: self.slug.clone(),
            image_url: self.image_url.clone(),
            list_price: variant.price,
            unit_price: variant.effective_price,
            stock: variant.stock,
            active: self.is_active,
        }
    }

    /// Every purchasable entry of this product.
    pub fn catalog_entries(&self) -> impl Iterator<Item = CatalogEntry> + '_ {
        std::iter::once(self.catalog_entry())
            .chain(self.variants.iter().map(|v| self.variant_entry(v)))
    }

    /// Whether any pack size can be bought right now.
    #[must_use]
    pub fn in_stock(&self) -> bool {
        self.is_active && (self.stock > 0 || self.variants.iter().any(|v| v.stock > 0))
    }
}

impl Variant {
    /// Build a variant, applying the parent product's discount.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::InvalidDiscount`] if `discount_percent` is out of range.
    pub fn new(
        id: VariantId,
        product_id: ProductId,
        label: String,
        price: Money,
        stock: u32,
        discount_percent: i32,
    ) -> Result<Self, MoneyError> {
        Ok(Self {
            id,
            product_id,
            label,
            effective_price: price.discounted(discount_percent)?,
            price,
            stock,
        })
    }
}

/// A fixed bundle of products sold as one unit.
#[derive(Debug, Clone, Serialize)]
pub struct Combo {
    pub id: ComboId,
    pub slug: String,
    pub name: String,
    pub description: String,
    /// Fixed bundle price.
    pub price: Money,
    /// Sum of the components' list prices.
    pub list_price: Money,
    pub savings: Money,
    pub image_url: Option<String>,
    pub is_active: bool,
    /// Whole bundles that component stock allows.
    pub available: u32,
    pub items: Vec<ComboItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// One product inside a combo.
#[derive(Debug, Clone, Serialize)]
pub struct ComboItem {
    pub product_id: ProductId,
    pub name: String,
    pub slug: String,
    pub quantity: u32,
    #[serde(skip)]
    pub list_price: Money,
    #[serde(skip)]
    pub stock: u32,
    #[serde(skip)]
    pub product_active: bool,
}

impl ComboItem {
    #[must_use]
    pub const fn component(&self) -> ComboComponent {
        ComboComponent {
            list_price: self.list_price,
            stock: self.stock,
            quantity: self.quantity,
            active: self.product_active,
        }
    }
}

/// Fields of a combo row before its components are attached.
#[derive(Debug, Clone)]
pub struct ComboHeader {
    pub id: ComboId,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub price: Money,
    pub image_url: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Combo {
    /// Attach components and derive list price and availability.
    #[must_use]
    pub fn assemble(header: ComboHeader, items: Vec<ComboItem>) -> Self {
        let components: Vec<ComboComponent> = items.iter().map(ComboItem::component).collect();
        let entry = CatalogEntry::combo(
            LineKey::combo(header.id),
            header.name.clone(),
            header.slug.clone(),
            header.image_url.clone(),
            header.price,
            &components,
            header.is_active,
        );
        Self {
            id: header.id,
            slug: header.slug,
            name: header.name,
            description: header.description,
            price: header.price,
            list_price: entry.list_price,
            savings: entry.list_price.saturating_sub(header.price),
            image_url: header.image_url,
            is_active: header.is_active,
            available: entry.available(),
            items,
            created_at: header.created_at,
            updated_at: header.updated_at,
        }
    }

    #[must_use]
    pub fn catalog_entry(&self) -> CatalogEntry {
        CatalogEntry {
            item: LineKey::combo(self.id),
            name: self.name.clone(),
            slug: self.slug.clone(),
            image_url: self.image_url.clone(),
            list_price: self.list_price,
            unit_price: self.price,
            stock: self.available,
            active: self.is_active && !self.items.is_empty(),
        }
    }
}

/// Number of active products in a category.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CategoryCount {
    pub category: String,
    pub product_count: i64,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rupees(s: &str) -> Money {
        Money::inr(s.parse().unwrap())
    }

    fn product() -> Product {
        let id = ProductId::new(3);
        Product {
            id,
            slug: "little-millet".to_string(),
            name: "Little Millet".to_string(),
            description: String::new(),
            category: "grains".to_string(),
            price: rupees("90"),
            discount_percent: 10,
            effective_price: rupees("81"),
            stock: 0,
            image_url: None,
            is_active: true,
            variants: vec![
                Variant::new(VariantId::new(31), id, "1 kg".to_string(), rupees("170"), 4, 10)
                    .unwrap(),
            ],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_variant_uses_product_discount() {
        let p = product();
        let entry = p.variant_entry(&p.variants[0]);
        assert_eq!(entry.unit_price, rupees("153"));
        assert_eq!(entry.list_price, rupees("170"));
        assert_eq!(entry.name, "Little Millet (1 kg)");
        assert_eq!(entry.stock, 4);
    }

    #[test]
    fn test_in_stock_counts_variants() {
        let mut p = product();
        assert!(p.in_stock());
        p.variants[0].stock = 0;
        assert!(!p.in_stock());
        assert_eq!(p.catalog_entries().count(), 2);
    }

    #[test]
    fn test_combo_assembly() {
        let header = ComboHeader {
            id: ComboId::new(5),
            slug: "millet-starter".to_string(),
            name: "Millet Starter Kit".to_string(),
            description: String::new(),
            price: rupees("250"),
            image_url: None,
            is_active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let item = |id, price, stock, quantity| ComboItem {
            product_id: ProductId::new(id),
            name: format!("p{id}"),
            slug: format!("p{id}"),
            quantity,
            list_price: rupees(price),
            stock,
            product_active: true,
        };
        let combo = Combo::assemble(header, vec![item(1, "120", 6, 1), item(2, "90", 6, 2)]);
        assert_eq!(combo.list_price, rupees("300"));
        assert_eq!(combo.savings, rupees("50"));
        assert_eq!(combo.available, 3);
        assert_eq!(combo.catalog_entry().available(), 3);
    }
}
