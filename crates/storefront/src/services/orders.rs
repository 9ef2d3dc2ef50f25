//! Order status changes.
//!
//! Every status write goes through [`OrderService::transition`]: the status
//! machine decides whether the move is legal, [`StockEffect`] decides what
//! happens to stock, and the repository applies both atomically.

use sqlx::PgPool;
use tracing::{info, instrument};

use milletmart_core::{OrderId, OrderStatus, Transition, UserId};

use crate::db::orders::{OrderRepository, StatusUpdate, StockEffect};
use crate::error::Result;
use crate::models::Order;

/// Extra data recorded with a status change.
#[derive(Debug, Clone, Copy, Default)]
pub struct TransitionContext<'a> {
    pub note: Option<&'a str>,
    /// `None` for gateway webhooks.
    pub changed_by: Option<UserId>,
    pub gateway_payment_id: Option<&'a str>,
    pub failure_reason: Option<&'a str>,
}

impl<'a> TransitionContext<'a> {
    #[must_use]
    pub const fn by(user_id: UserId) -> Self {
        Self {
            note: None,
            changed_by: Some(user_id),
            gateway_payment_id: None,
            failure_reason: None,
        }
    }

    #[must_use]
    pub const fn with_note(mut self, note: &'a str) -> Self {
        self.note = Some(note);
        self
    }
}

pub struct OrderService<'a> {
    orders: OrderRepository<'a>,
}

impl<'a> OrderService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self {
            orders: OrderRepository::new(pool),
        }
    }

    /// Move `order` to `to`.
    ///
    /// Requesting the status the order already has returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns `StatusTransitionError` for an illegal move and
    /// `RepositoryError::Conflict` if the order changed since it was read.
    #[instrument(skip(self, order, ctx), fields(order_id = %order.id, from = %order.status))]
    pub async fn transition(
        &self,
        order: Order,
        to: OrderStatus,
        ctx: TransitionContext<'_>,
    ) -> Result<Order> {
        let (from, to) = match order.status.transition(to)? {
            Transition::Unchanged(_) => return Ok(order),
            Transition::Changed { from, to } => (from, to),
        };

        let stock = StockEffect::for_transition(to, order.stock_committed);
        let updated = self
            .orders
            .apply_transition(&StatusUpdate {
                order_id: order.id,
                from,
                to,
                stock,
                note: ctx.note,
                changed_by: ctx.changed_by,
                gateway_payment_id: ctx.gateway_payment_id,
                failure_reason: ctx.failure_reason,
            })
            .await?;

        info!(%from, %to, ?stock, "Order status changed");
        Ok(updated)
    }

    /// Load an order and move it to `to`.
    ///
    /// # Errors
    ///
    /// As for [`OrderService::transition`], plus `RepositoryError::NotFound`.
    pub async fn transition_by_id(
        &self,
        id: OrderId,
        to: OrderStatus,
        ctx: TransitionContext<'_>,
    ) -> Result<Order> {
        let order = self.orders.get(id).await?;
        self.transition(order, to, ctx).await
    }
}
