//! A customer's journey through the domain layer: guest cart, sign-in
//! merge, pricing, and the order lifecycle with its stock effects.

#![allow(clippy::unwrap_used)]

use milletmart_core::cart::{
    Cart, CartAdjustment, CartError, Catalog, CatalogEntry, ComboComponent, LineKey,
    RemovalReason, ShippingPolicy, price_cart,
};
use milletmart_core::{ComboId, Money, OrderStatus, ProductId, Transition};
use milletmart_storefront::db::orders::StockEffect;

const RAGI: LineKey = LineKey::product(ProductId::new(1));
const FOXTAIL: LineKey = LineKey::product(ProductId::new(2));
const KIT: LineKey = LineKey::combo(ComboId::new(1));

fn rupees(amount: i64) -> Money {
    Money::inr(amount.into())
}

fn product(item: LineKey, name: &str, price: i64, discount: i32, stock: u32) -> CatalogEntry {
    CatalogEntry::discounted(item, name, name.to_lowercase(), None, rupees(price), discount, stock, true)
        .unwrap()
}

fn starter_kit(little_millet_stock: u32) -> CatalogEntry {
    let components = [
        ComboComponent {
            list_price: rupees(95),
            stock: 10,
            quantity: 1,
            active: true,
        },
        ComboComponent {
            list_price: rupees(110),
            stock: little_millet_stock,
            quantity: 1,
            active: true,
        },
    ];
    CatalogEntry::combo(KIT, "Starter Pack", "starter-pack", None, rupees(189), &components, true)
}

fn catalog() -> Catalog {
    [
        product(RAGI, "Ragi", 120, 10, 5),
        product(FOXTAIL, "Foxtail", 95, 0, 10),
        starter_kit(3),
    ]
    .into_iter()
    .collect()
}

#[test]
fn test_guest_cart_respects_stock() {
    let catalog = catalog();
    let mut cart = Cart::new();

    assert_eq!(cart.add(RAGI, 2, catalog.available(&RAGI)), Ok(2));
    assert_eq!(
        cart.add(RAGI, 4, catalog.available(&RAGI)),
        Err(CartError::OutOfStock {
            requested: 6,
            available: 5
        })
    );
    assert_eq!(cart.quantity_of(&RAGI), 2);

    // Combo stock is bounded by its scarcest component
    assert_eq!(catalog.available(&KIT), 3);
    assert!(cart.add(KIT, 4, catalog.available(&KIT)).is_err());
    assert_eq!(cart.add(KIT, 1, catalog.available(&KIT)), Ok(1));
}

#[test]
fn test_sign_in_merges_and_prices_cart() {
    let catalog = catalog();
    let mut guest = Cart::new();
    guest.add(RAGI, 2, 5).unwrap();
    guest.add(KIT, 1, 3).unwrap();

    let mut user = Cart::new();
    user.add(RAGI, 4, 5).unwrap();
    user.add(FOXTAIL, 1, 10).unwrap();

    let adjustments = user.merge(&guest, &catalog);
    assert_eq!(
        adjustments,
        [CartAdjustment::QuantityReduced {
            item: RAGI,
            requested: 6,
            granted: 5
        }]
    );
    let order: Vec<LineKey> = user.lines().iter().map(|l| l.item).collect();
    assert_eq!(order, [RAGI, FOXTAIL, KIT]);

    let summary = price_cart(&user, &catalog, &ShippingPolicy::default())
        .unwrap()
        .with_adjustments(adjustments);

    // 5 x 108 + 95 + 189
    assert_eq!(summary.subtotal, rupees(824));
    // (600 + 95 + 205) - 824
    assert_eq!(summary.savings, rupees(76));
    assert!(summary.shipping_fee.is_zero());
    assert_eq!(summary.total, rupees(824));
    assert_eq!(summary.item_count, 7);
    assert_eq!(summary.adjustments.len(), 1);
}

#[test]
fn test_small_cart_pays_shipping() {
    let catalog = catalog();
    let mut cart = Cart::new();
    cart.add(FOXTAIL, 1, catalog.available(&FOXTAIL)).unwrap();

    let summary = price_cart(&cart, &catalog, &ShippingPolicy::default()).unwrap();
    assert_eq!(summary.subtotal, rupees(95));
    assert_eq!(summary.shipping_fee, rupees(50));
    assert_eq!(summary.total, rupees(145));
}

#[test]
fn test_reconcile_after_catalog_changes() {
    let mut cart = Cart::new();
    cart.add(RAGI, 2, 5).unwrap();
    cart.add(FOXTAIL, 1, 10).unwrap();
    cart.add(KIT, 1, 3).unwrap();

    let mut ragi = product(RAGI, "Ragi", 120, 10, 5);
    ragi.active = false;
    let changed: Catalog = [ragi, product(FOXTAIL, "Foxtail", 95, 0, 10), starter_kit(0)]
        .into_iter()
        .collect();

    let adjustments = cart.reconcile(&changed);
    assert_eq!(
        adjustments,
        [
            CartAdjustment::Removed {
                item: RAGI,
                reason: RemovalReason::Unavailable
            },
            CartAdjustment::Removed {
                item: KIT,
                reason: RemovalReason::OutOfStock
            },
        ]
    );
    assert_eq!(cart.lines().len(), 1);
    assert!(price_cart(&cart, &changed, &ShippingPolicy::default()).is_ok());
}

/// Walk `path`, tracking the committed flag the way the order service does.
fn walk(path: &[OrderStatus]) -> Vec<StockEffect> {
    let mut effects = Vec::new();
    let mut committed = false;
    for pair in path.windows(2) {
        let [from, to] = pair else { unreachable!() };
        let transition = from.transition(*to).unwrap();
        assert_eq!(transition, Transition::Changed { from: *from, to: *to });

        let effect = StockEffect::for_transition(*to, committed);
        match effect {
            StockEffect::Commit => committed = true,
            StockEffect::Release => committed = false,
            StockEffect::None => {}
        }
        effects.push(effect);
    }
    effects
}

#[test]
fn test_retry_then_deliver_then_refund() {
    use OrderStatus::*;

    let effects = walk(&[
        Created,
        PaymentPending,
        PaymentFailed,
        PaymentPending,
        PaymentSuccess,
        Confirmed,
        Shipped,
        Delivered,
        Refunded,
    ]);
    let commits = effects.iter().filter(|e| **e == StockEffect::Commit).count();
    let releases = effects.iter().filter(|e| **e == StockEffect::Release).count();
    assert_eq!((commits, releases), (1, 1));
    assert_eq!(effects.last(), Some(&StockEffect::Release));
}

#[test]
fn test_unpaid_cancellation_touches_no_stock() {
    use OrderStatus::*;

    let effects = walk(&[Created, PaymentPending, Cancelled]);
    assert!(effects.iter().all(|e| *e == StockEffect::None));
}

#[test]
fn test_paid_cancellation_then_refund_releases_once() {
    use OrderStatus::*;

    let effects = walk(&[Created, PaymentPending, PaymentSuccess, Confirmed, Cancelled, Refunded]);
    assert_eq!(
        effects,
        [
            StockEffect::None,
            StockEffect::Commit,
            StockEffect::None,
            StockEffect::Release,
            StockEffect::None,
        ]
    );
}

#[test]
fn test_repeated_callbacks_are_harmless() {
    assert_eq!(
        OrderStatus::PaymentSuccess.transition(OrderStatus::PaymentSuccess),
        Ok(Transition::Unchanged(OrderStatus::PaymentSuccess))
    );
    // A late failure after capture is refused
    assert!(
        OrderStatus::Confirmed
            .transition(OrderStatus::PaymentFailed)
            .is_err()
    );
    assert!(!OrderStatus::Shipped.is_customer_cancellable());
    assert!(OrderStatus::Refunded.successors().is_empty());
}
