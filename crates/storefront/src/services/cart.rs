//! Cart reconciliation service.
//!
//! Guest carts are serialized into the session; signed-in users' carts live
//! in `cart_item`. Every operation reloads the cart, revalidates it against
//! the current catalog, applies the change, persists it and returns the
//! freshly priced result, so the client always renders server truth.

use sqlx::PgPool;
use tower_sessions::Session;
use tracing::{debug, instrument};

use milletmart_core::UserId;
use milletmart_core::cart::{
    Cart, CartAdjustment, CartError, CartLine, CartSummary, Catalog, LineKey, ShippingPolicy,
    price_cart,
};

use crate::db::carts::CartRepository;
use crate::db::catalog::load_catalog;
use crate::error::Result;
use crate::models::session_keys;

/// Whose cart an operation works on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartOwner {
    /// The visitor's session.
    Guest,
    User(UserId),
}

/// A cart checked against the catalog it was priced from.
#[derive(Debug, Clone)]
pub struct ReconciledCart {
    pub cart: Cart,
    pub catalog: Catalog,
    pub adjustments: Vec<CartAdjustment>,
}

/// Cart operations for one request.
pub struct CartService<'a> {
    pool: &'a PgPool,
    session: &'a Session,
    shipping: &'a ShippingPolicy,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, session: &'a Session, shipping: &'a ShippingPolicy) -> Self {
        Self {
            pool,
            session,
            shipping,
        }
    }

    /// The current cart, reconciled and priced.
    ///
    /// Lines that no longer fit the catalog are fixed up and saved; the
    /// summary lists what changed.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or saving the cart fails.
    #[instrument(skip(self))]
    pub async fn view(&self, owner: CartOwner) -> Result<CartSummary> {
        let reconciled = self.reconciled(owner).await?;
        if !reconciled.adjustments.is_empty() {
            self.save(owner, &reconciled.cart).await?;
        }
        self.summary(&reconciled.cart, &reconciled.catalog, reconciled.adjustments)
    }

    /// Add `quantity` units of `item`.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unavailable` for unknown or inactive items and
    /// `CartError::OutOfStock` when the resulting line would exceed stock.
    #[instrument(skip(self))]
    pub async fn add(&self, owner: CartOwner, item: LineKey, quantity: u32) -> Result<CartSummary> {
        let mut cart = self.load(owner).await?;
        let catalog = load_catalog(
            self.pool,
            cart.lines().iter().map(|l| l.item).chain([item]),
        )
        .await?;
        let adjustments = cart.reconcile(&catalog);

        if catalog.get(&item).is_none_or(|e| !e.active) {
            return Err(CartError::Unavailable(item).into());
        }
        let line_quantity = cart.add(item, quantity, catalog.available(&item))?;
        debug!(%item, line_quantity, "Added to cart");

        self.save(owner, &cart).await?;
        self.summary(&cart, &catalog, adjustments)
    }

    /// Set a line's quantity; zero removes it.
    ///
    /// # Errors
    ///
    /// Returns `CartError::NotInCart` if there is no such line and
    /// `CartError::OutOfStock` if `quantity` exceeds stock.
    #[instrument(skip(self))]
    pub async fn set_quantity(
        &self,
        owner: CartOwner,
        item: LineKey,
        quantity: u32,
    ) -> Result<CartSummary> {
        let ReconciledCart {
            mut cart,
            catalog,
            adjustments,
        } = self.reconciled(owner).await?;

        cart.set_quantity(item, quantity, catalog.available(&item))?;

        self.save(owner, &cart).await?;
        self.summary(&cart, &catalog, adjustments)
    }

    /// Remove a line. Removing an absent line is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if loading or saving the cart fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, owner: CartOwner, item: LineKey) -> Result<CartSummary> {
        let ReconciledCart {
            mut cart,
            catalog,
            adjustments,
        } = self.reconciled(owner).await?;

        if cart.remove(&item) || !adjustments.is_empty() {
            self.save(owner, &cart).await?;
        }
        self.summary(&cart, &catalog, adjustments)
    }

    /// Empty the cart.
    ///
    /// # Errors
    ///
    /// Returns an error if saving the cart fails.
    #[instrument(skip(self))]
    pub async fn clear(&self, owner: CartOwner) -> Result<CartSummary> {
        match owner {
            CartOwner::Guest => {
                self.session
                    .remove::<Cart>(session_keys::GUEST_CART)
                    .await?;
            }
            CartOwner::User(user_id) => CartRepository::new(self.pool).clear(user_id).await?,
        }
        self.summary(&Cart::new(), &Catalog::new(), Vec::new())
    }

    /// Fold this session's guest cart, plus any lines the browser kept in
    /// local storage, into the user's cart.
    ///
    /// Runs once per login: later calls for the same user return the user's
    /// cart unchanged until the visitor shops as a guest again or signs out.
    /// The guest cart is emptied afterwards.
    ///
    /// # Errors
    ///
    /// Returns an error if the session or database fails.
    #[instrument(skip(self, local_lines), fields(local_lines = local_lines.len()))]
    pub async fn merge_on_login(
        &self,
        user_id: UserId,
        local_lines: Vec<CartLine>,
    ) -> Result<CartSummary> {
        let Some(guest) = self.pending_guest_cart(user_id, local_lines).await? else {
            debug!(%user_id, "Cart already merged for this login");
            return self.view(CartOwner::User(user_id)).await;
        };

        let repo = CartRepository::new(self.pool);
        let mut cart = repo.load(user_id).await?;
        let catalog = load_catalog(
            self.pool,
            cart.lines().iter().chain(guest.lines()).map(|l| l.item),
        )
        .await?;
        let adjustments = cart.merge(&guest, &catalog);
        repo.replace(user_id, &cart).await?;
        self.mark_merged(user_id).await?;

        debug!(
            %user_id,
            guest_lines = guest.lines().len(),
            adjustments = adjustments.len(),
            "Merged guest cart"
        );
        self.summary(&cart, &catalog, adjustments)
    }

    /// Forget that this session's guest cart was merged, so the next
    /// sign-in merges again.
    ///
    /// # Errors
    ///
    /// Returns an error if the session store fails.
    pub async fn end_login(&self) -> Result<()> {
        self.session
            .remove::<UserId>(session_keys::CART_MERGED_FOR)
            .await?;
        Ok(())
    }

    /// The guest cart waiting to be merged into `user_id`'s cart, or `None`
    /// if this login already merged it.
    async fn pending_guest_cart(
        &self,
        user_id: UserId,
        local_lines: Vec<CartLine>,
    ) -> Result<Option<Cart>> {
        let merged_for: Option<UserId> = self
            .session
            .get(session_keys::CART_MERGED_FOR)
            .await?;
        if merged_for == Some(user_id) {
            return Ok(None);
        }
        let session_cart = self.load(CartOwner::Guest).await?;
        Ok(Some(guest_union(
            &session_cart,
            &Cart::from_lines(local_lines),
        )))
    }

    async fn mark_merged(&self, user_id: UserId) -> Result<()> {
        self.session
            .remove::<Cart>(session_keys::GUEST_CART)
            .await?;
        self.session
            .insert(session_keys::CART_MERGED_FOR, user_id)
            .await?;
        Ok(())
    }

    /// Load the cart and reconcile it against a fresh catalog, without saving.
    ///
    /// # Errors
    ///
    /// Returns an error if loading the cart or catalog fails.
    pub async fn reconciled(&self, owner: CartOwner) -> Result<ReconciledCart> {
        let mut cart = self.load(owner).await?;
        let catalog = load_catalog(self.pool, cart.lines().iter().map(|l| l.item)).await?;
        let adjustments = cart.reconcile(&catalog);
        Ok(ReconciledCart {
            cart,
            catalog,
            adjustments,
        })
    }

    /// Persist `cart` for `owner`.
    ///
    /// # Errors
    ///
    /// Returns an error if the session or database write fails.
    pub async fn save(&self, owner: CartOwner, cart: &Cart) -> Result<()> {
        match owner {
            CartOwner::Guest if cart.is_empty() => {
                self.session
                    .remove::<Cart>(session_keys::GUEST_CART)
                    .await?;
            }
            CartOwner::Guest => {
                self.session.insert(session_keys::GUEST_CART, cart).await?;
                // New guest lines belong to whoever signs in next
                self.end_login().await?;
            }
            CartOwner::User(user_id) => CartRepository::new(self.pool).replace(user_id, cart).await?,
        }
        Ok(())
    }

    async fn load(&self, owner: CartOwner) -> Result<Cart> {
        Ok(match owner {
            CartOwner::Guest => self
                .session
                .get::<Cart>(session_keys::GUEST_CART)
                .await?
                .unwrap_or_default(),
            CartOwner::User(user_id) => CartRepository::new(self.pool).load(user_id).await?,
        })
    }

    fn summary(
        &self,
        cart: &Cart,
        catalog: &Catalog,
        adjustments: Vec<CartAdjustment>,
    ) -> Result<CartSummary> {
        Ok(price_cart(cart, catalog, self.shipping)?.with_adjustments(adjustments))
    }
}

/// Combine two copies of a guest cart.
///
/// The browser's local storage usually mirrors the session cart, so lines
/// present in both take the larger quantity instead of the sum.
#[must_use]
pub fn guest_union(session: &Cart, local: &Cart) -> Cart {
    let mut lines: Vec<CartLine> = session.lines().to_vec();
    for line in local.lines() {
        match lines.iter_mut().find(|l| l.item == line.item) {
            Some(existing) => existing.quantity = existing.quantity.max(line.quantity),
            None => lines.push(*line),
        }
    }
    Cart::from_lines(lines)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use milletmart_core::{ComboId, ProductId};
    use tower_sessions::MemoryStore;

    const RAGI: LineKey = LineKey::product(ProductId::new(1));
    const KIT: LineKey = LineKey::combo(ComboId::new(2));

    fn line(item: LineKey, quantity: u32) -> CartLine {
        CartLine { item, quantity }
    }

    #[test]
    fn test_guest_union_takes_larger_quantity() {
        let session = Cart::from_lines([line(RAGI, 2)]);
        let local = Cart::from_lines([line(RAGI, 3), line(KIT, 1)]);
        let union = guest_union(&session, &local);
        assert_eq!(union.quantity_of(&RAGI), 3);
        assert_eq!(union.quantity_of(&KIT), 1);
        assert_eq!(union.lines().first().map(|l| l.item), Some(RAGI));
    }

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    fn pool() -> PgPool {
        PgPool::connect_lazy("postgres://localhost/unused").unwrap()
    }

    #[tokio::test]
    async fn test_empty_guest_cart_needs_no_database() {
        let (pool, session, shipping) = (pool(), session(), ShippingPolicy::default());
        let service = CartService::new(&pool, &session, &shipping);

        let summary = service.view(CartOwner::Guest).await.unwrap();
        assert!(summary.lines.is_empty());
        assert!(summary.total.is_zero());
        assert!(summary.shipping_fee.is_zero());
    }

    #[tokio::test]
    async fn test_guest_cart_round_trips_through_session() {
        let (pool, session, shipping) = (pool(), session(), ShippingPolicy::default());
        let service = CartService::new(&pool, &session, &shipping);

        let cart = Cart::from_lines([line(RAGI, 2)]);
        service.save(CartOwner::Guest, &cart).await.unwrap();
        assert_eq!(service.load(CartOwner::Guest).await.unwrap(), cart);

        service.save(CartOwner::Guest, &Cart::new()).await.unwrap();
        assert!(service.load(CartOwner::Guest).await.unwrap().is_empty());
    }

    fn user(n: u128) -> UserId {
        UserId::new(uuid::Uuid::from_u128(n))
    }

    #[tokio::test]
    async fn test_merge_runs_once_per_login() {
        let (pool, session, shipping) = (pool(), session(), ShippingPolicy::default());
        let service = CartService::new(&pool, &session, &shipping);
        let asha = user(1);

        service
            .save(CartOwner::Guest, &Cart::from_lines([line(RAGI, 2)]))
            .await
            .unwrap();
        let pending = service
            .pending_guest_cart(asha, vec![line(KIT, 1)])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.quantity_of(&RAGI), 2);
        assert_eq!(pending.quantity_of(&KIT), 1);

        service.mark_merged(asha).await.unwrap();
        assert!(service.load(CartOwner::Guest).await.unwrap().is_empty());

        // Same login, browser resends its local cart
        assert!(
            service
                .pending_guest_cart(asha, vec![line(KIT, 1)])
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_guest_shopping_after_merge_merges_on_next_login() {
        let (pool, session, shipping) = (pool(), session(), ShippingPolicy::default());
        let service = CartService::new(&pool, &session, &shipping);
        let asha = user(1);

        service.mark_merged(asha).await.unwrap();
        service
            .save(CartOwner::Guest, &Cart::from_lines([line(KIT, 2)]))
            .await
            .unwrap();

        let pending = service
            .pending_guest_cart(asha, Vec::new())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(pending.quantity_of(&KIT), 2);
    }

    #[tokio::test]
    async fn test_sign_out_or_another_user_merges_again() {
        let (pool, session, shipping) = (pool(), session(), ShippingPolicy::default());
        let service = CartService::new(&pool, &session, &shipping);
        let (asha, ravi) = (user(1), user(2));

        service.mark_merged(asha).await.unwrap();
        assert!(
            service
                .pending_guest_cart(ravi, Vec::new())
                .await
                .unwrap()
                .is_some()
        );

        service.end_login().await.unwrap();
        assert!(
            service
                .pending_guest_cart(asha, Vec::new())
                .await
                .unwrap()
                .is_some()
        );
    }
}
