//! Order repository.
//!
//! Orders are written once at checkout and afterwards only move through
//! [`OrderRepository::apply_transition`], which compare-and-sets the status,
//! applies any stock effect and appends a history row in one transaction.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use sqlx::types::Json;
use tracing::warn;

use milletmart_core::cart::CartSummary;
use milletmart_core::{
    ComboId, Currency, Money, MoneyError, OrderId, OrderStatus, ProductId, ShippingAddress,
    UserId, VariantId,
};

use super::carts::{line_columns, line_key};
use super::{Paged, Pagination, RepositoryError, to_i32, to_u32};
use crate::models::{Order, OrderItem, StatusChange};

const ORDER_COLUMNS: &str = "id, user_id, status, shipping_address, subtotal, savings, \
                             shipping_fee, total, currency, gateway_order_id, \
                             gateway_payment_id, failure_reason, stock_committed, \
                             created_at, updated_at";

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: OrderId,
    user_id: UserId,
    status: OrderStatus,
    shipping_address: Json<ShippingAddress>,
    subtotal: Decimal,
    savings: Decimal,
    shipping_fee: Decimal,
    total: Decimal,
    currency: String,
    gateway_order_id: Option<String>,
    gateway_payment_id: Option<String>,
    failure_reason: Option<String>,
    stock_committed: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    order_id: OrderId,
    product_id: Option<ProductId>,
    variant_id: Option<VariantId>,
    combo_id: Option<ComboId>,
    name: String,
    unit_list_price: Decimal,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

#[derive(sqlx::FromRow)]
struct StatusChangeRow {
    from_status: Option<OrderStatus>,
    to_status: OrderStatus,
    note: Option<String>,
    changed_by: Option<UserId>,
    created_at: DateTime<Utc>,
}

impl From<StatusChangeRow> for StatusChange {
    fn from(row: StatusChangeRow) -> Self {
        Self {
            from: row.from_status,
            to: row.to_status,
            note: row.note,
            changed_by: row.changed_by,
            created_at: row.created_at,
        }
    }
}

/// What a status change does to catalog stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StockEffect {
    None,
    /// Deduct the order's units, as far as stock allows, and mark the order
    /// as committed. A shortfall is noted in the status history.
    Commit,
    /// Return the units the commit took and clear the committed flag.
    Release,
}

impl StockEffect {
    /// Stock effect of moving to `to` given whether stock is already committed.
    ///
    /// Stock is deducted when payment succeeds and returned when a
    /// committed order is cancelled or refunded, each at most once.
    #[must_use]
    pub const fn for_transition(to: OrderStatus, stock_committed: bool) -> Self {
        match to {
            OrderStatus::PaymentSuccess if !stock_committed => Self::Commit,
            OrderStatus::Cancelled | OrderStatus::Refunded if stock_committed => Self::Release,
            _ => Self::None,
        }
    }
}

/// A validated status change ready to be written.
#[derive(Debug, Clone)]
pub struct StatusUpdate<'a> {
    pub order_id: OrderId,
    /// Status the order must still have for the write to apply.
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub stock: StockEffect,
    pub note: Option<&'a str>,
    pub changed_by: Option<UserId>,
    /// Recorded when set; existing values are kept otherwise.
    pub gateway_payment_id: Option<&'a str>,
    pub failure_reason: Option<&'a str>,
}

/// Order counts and revenue for the admin dashboard.
#[derive(Debug, Clone, Serialize)]
pub struct OrderStats {
    pub by_status: Vec<StatusCount>,
    pub total_orders: i64,
    /// Sum of totals over orders that have been paid and not refunded.
    pub paid_revenue: Money,
    pub orders_today: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: OrderStatus,
    pub count: i64,
}

/// Repository for order database operations.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Create an order in `CREATED` from a priced cart.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a statement fails; nothing is
    /// written in that case.
    pub async fn create(
        &self,
        user_id: UserId,
        shipping_address: &ShippingAddress,
        summary: &CartSummary,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: OrderId = sqlx::query_scalar(
            r"
            INSERT INTO orders
                (user_id, status, shipping_address, subtotal, savings, shipping_fee, total, currency)
            VALUES ($1, 'CREATED', $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(user_id)
        .bind(Json(shipping_address))
        .bind(summary.subtotal.amount)
        .bind(summary.savings.amount)
        .bind(summary.shipping_fee.amount)
        .bind(summary.total.amount)
        .bind(summary.total.currency.code())
        .fetch_one(&mut *tx)
        .await?;

        for line in &summary.lines {
            let (product_id, variant_id, combo_id) = line_columns(line.item);
            sqlx::query(
                r"
                INSERT INTO order_item
                    (order_id, product_id, variant_id, combo_id, name,
                     unit_list_price, unit_price, quantity, line_total)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                ",
            )
            .bind(id)
            .bind(product_id)
            .bind(variant_id)
            .bind(combo_id)
            .bind(&line.name)
            .bind(line.unit_list_price.amount)
            .bind(line.unit_price.amount)
            .bind(to_i32(line.quantity)?)
            .bind(line.line_total.amount)
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query(
            r"
            INSERT INTO order_status_history (order_id, from_status, to_status, changed_by)
            VALUES ($1, NULL, 'CREATED', $2)
            ",
        )
        .bind(id)
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(id).await
    }

    /// Get any order by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist.
    pub async fn get(&self, id: OrderId) -> Result<Order, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(self.pool)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        self.with_items(vec![row])
            .await?
            .pop()
            .ok_or(RepositoryError::NotFound)
    }

    /// Get an order only if it belongs to `user_id`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if it does not exist or belongs
    /// to someone else.
    pub async fn get_for_user(
        &self,
        user_id: UserId,
        id: OrderId,
    ) -> Result<Order, RepositoryError> {
        let order = self.get(id).await?;
        if order.user_id != user_id {
            return Err(RepositoryError::NotFound);
        }
        Ok(order)
    }

    /// Find the order a gateway order id was issued for, including ids from
    /// earlier payment attempts.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn get_by_gateway_order_id(
        &self,
        gateway_order_id: &str,
    ) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders \
             WHERE id = (SELECT order_id FROM payment_attempt WHERE gateway_order_id = $1)"
        ))
        .bind(gateway_order_id)
        .fetch_optional(self.pool)
        .await?;

        Ok(self.with_items(row.into_iter().collect()).await?.pop())
    }

    /// A user's orders, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_for_user(
        &self,
        user_id: UserId,
        page: Pagination,
    ) -> Result<Paged<Order>, RepositoryError> {
        self.list_where(Some(user_id), None, page).await
    }

    /// All orders, newest first, optionally with one status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list(
        &self,
        status: Option<OrderStatus>,
        page: Pagination,
    ) -> Result<Paged<Order>, RepositoryError> {
        self.list_where(None, status, page).await
    }

    /// Status history of an order, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn history(&self, id: OrderId) -> Result<Vec<StatusChange>, RepositoryError> {
        Ok(sqlx::query_as::<_, StatusChangeRow>(
            r"
            SELECT from_status, to_status, note, changed_by, created_at
            FROM order_status_history
            WHERE order_id = $1
            ORDER BY id
            ",
        )
        .bind(id)
        .fetch_all(self.pool)
        .await?
        .into_iter()
        .map(StatusChange::from)
        .collect())
    }

    /// Record the gateway order issued for a payment attempt and make it
    /// the order's current one.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Conflict` if the gateway order id is already used.
    pub async fn set_gateway_order(
        &self,
        id: OrderId,
        gateway_order_id: &str,
    ) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            "UPDATE orders SET gateway_order_id = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(gateway_order_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| RepositoryError::unique(e, "gateway order id already in use"))?
        .rows_affected();

        if updated == 0 {
            return Err(RepositoryError::NotFound);
        }

        sqlx::query("INSERT INTO payment_attempt (gateway_order_id, order_id) VALUES ($1, $2)")
            .bind(gateway_order_id)
            .bind(id)
            .execute(&mut *tx)
            .await
            .map_err(|e| RepositoryError::unique(e, "gateway order id already in use"))?;

        tx.commit().await?;
        Ok(())
    }

    /// Write a status change if the order still has `update.from`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the status changed since it was
    /// read, `RepositoryError::Database` if a statement fails. Nothing is
    /// written in either case.
    pub async fn apply_transition(
        &self,
        update: &StatusUpdate<'_>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let stock_committed = match update.stock {
            StockEffect::Commit => Some(true),
            StockEffect::Release => Some(false),
            StockEffect::None => None,
        };

        let updated: Option<OrderId> = sqlx::query_scalar(
            r"
            UPDATE orders SET
                status = $3,
                gateway_payment_id = COALESCE($4, gateway_payment_id),
                failure_reason = COALESCE($5, failure_reason),
                stock_committed = COALESCE($6, stock_committed),
                updated_at = now()
            WHERE id = $1 AND status = $2
            RETURNING id
            ",
        )
        .bind(update.order_id)
        .bind(update.from)
        .bind(update.to)
        .bind(update.gateway_payment_id)
        .bind(update.failure_reason)
        .bind(stock_committed)
        .fetch_optional(&mut *tx)
        .await?;

        if updated.is_none() {
            return Err(RepositoryError::Conflict(
                "order status changed concurrently".to_owned(),
            ));
        }

        let shortfall = match update.stock {
            StockEffect::Commit => commit_stock(&mut tx, update.order_id).await?,
            StockEffect::Release => {
                release_stock(&mut tx, update.order_id).await?;
                0
            }
            StockEffect::None => 0,
        };
        let note = match (update.note, shortfall) {
            (note, 0) => note.map(str::to_owned),
            (Some(note), units) => Some(format!("{note}; {units} units short of stock")),
            (None, units) => Some(format!("{units} units short of stock")),
        };

        sqlx::query(
            r"
            INSERT INTO order_status_history (order_id, from_status, to_status, note, changed_by)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(update.order_id)
        .bind(update.from)
        .bind(update.to)
        .bind(note)
        .bind(update.changed_by)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        self.get(update.order_id).await
    }

    /// Order counts by status and revenue from paid orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn stats(&self) -> Result<OrderStats, RepositoryError> {
        let by_status = sqlx::query_as::<_, StatusCount>(
            "SELECT status, COUNT(*) AS count FROM orders GROUP BY status ORDER BY status",
        )
        .fetch_all(self.pool)
        .await?;

        let (revenue, orders_today): (Decimal, i64) = sqlx::query_as(
            r"
            SELECT
                COALESCE(SUM(total) FILTER (
                    WHERE status IN ('PAYMENT_SUCCESS', 'CONFIRMED', 'SHIPPED', 'DELIVERED')
                ), 0),
                COUNT(*) FILTER (WHERE created_at >= date_trunc('day', now()))
            FROM orders
            ",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(OrderStats {
            total_orders: by_status.iter().map(|s| s.count).sum(),
            by_status,
            paid_revenue: Money::inr(revenue),
            orders_today,
        })
    }

    async fn list_where(
        &self,
        user_id: Option<UserId>,
        status: Option<OrderStatus>,
        page: Pagination,
    ) -> Result<Paged<Order>, RepositoryError> {
        const WHERE: &str = "WHERE ($1::uuid IS NULL OR user_id = $1) \
                             AND ($2::order_status IS NULL OR status = $2)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM orders {WHERE}"))
            .bind(user_id)
            .bind(status)
            .fetch_one(self.pool)
            .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders {WHERE} \
             ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4"
        ))
        .bind(user_id)
        .bind(status)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool)
        .await?;

        Ok(Paged {
            items: self.with_items(rows).await?,
            page: page.page,
            per_page: page.per_page,
            total,
        })
    }

    async fn with_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>, RepositoryError> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i32> = rows.iter().map(|r| r.id.as_i32()).collect();
        let item_rows = sqlx::query_as::<_, OrderItemRow>(
            r"
            SELECT order_id, product_id, variant_id, combo_id, name,
                   unit_list_price, unit_price, quantity, line_total
            FROM order_item
            WHERE order_id = ANY($1)
            ORDER BY order_id, id
            ",
        )
        .bind(ids)
        .fetch_all(self.pool)
        .await?;

        let mut by_order: HashMap<OrderId, Vec<OrderItem>> = HashMap::new();
        for row in item_rows {
            let order_id = row.order_id;
            by_order.entry(order_id).or_default().push(into_item(row)?);
        }

        rows.into_iter()
            .map(|row| {
                let items = by_order.remove(&row.id).unwrap_or_default();
                into_order(row, items)
            })
            .collect()
    }
}

#[derive(sqlx::FromRow)]
struct StockDemand {
    id: i32,
    stock: i32,
    wanted: i32,
}

/// Units that can be taken from `stock` toward `wanted`, and how many
/// units are missing.
const fn deduction(stock: i32, wanted: i32) -> (i32, i32) {
    let taken = if stock <= 0 {
        0
    } else if stock < wanted {
        stock
    } else {
        wanted
    };
    (taken, wanted - taken)
}

/// Deduct stock for every unit in an order and record what was taken.
/// Combo lines draw on their components' product stock.
///
/// Stock never goes negative; units that were not there are recorded as a
/// shortfall and returned as the total.
async fn commit_stock(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: OrderId,
) -> Result<i32, RepositoryError> {
    let products = sqlx::query_as::<_, StockDemand>(
        r"
        SELECT p.id, p.stock, demand.quantity::integer AS wanted
        FROM product p
        JOIN (
            SELECT product_id, SUM(quantity) AS quantity
            FROM (
                SELECT oi.product_id, oi.quantity
                FROM order_item oi
                WHERE oi.order_id = $1 AND oi.product_id IS NOT NULL AND oi.variant_id IS NULL
                UNION ALL
                SELECT ci.product_id, ci.quantity * oi.quantity
                FROM order_item oi
                JOIN combo_item ci ON ci.combo_id = oi.combo_id
                WHERE oi.order_id = $1
            ) lines
            GROUP BY product_id
        ) demand ON demand.product_id = p.id
        ORDER BY p.id
        FOR UPDATE OF p
        ",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    let variants = sqlx::query_as::<_, StockDemand>(
        r"
        SELECT v.id, v.stock, demand.quantity::integer AS wanted
        FROM product_variant v
        JOIN (
            SELECT variant_id, SUM(quantity) AS quantity
            FROM order_item
            WHERE order_id = $1 AND variant_id IS NOT NULL
            GROUP BY variant_id
        ) demand ON demand.variant_id = v.id
        ORDER BY v.id
        FOR UPDATE OF v
        ",
    )
    .bind(order_id)
    .fetch_all(&mut **tx)
    .await?;

    let mut missing = 0;
    for (demand, is_variant) in products
        .iter()
        .map(|d| (d, false))
        .chain(variants.iter().map(|d| (d, true)))
    {
        let (taken, shortfall) = deduction(demand.stock, demand.wanted);
        let update = if is_variant {
            "UPDATE product_variant SET stock = stock - $2 WHERE id = $1"
        } else {
            "UPDATE product SET stock = stock - $2, updated_at = now() WHERE id = $1"
        };
        sqlx::query(update)
            .bind(demand.id)
            .bind(taken)
            .execute(&mut **tx)
            .await?;

        let (product_id, variant_id) = if is_variant {
            (None, Some(demand.id))
        } else {
            (Some(demand.id), None)
        };
        sqlx::query(
            r"
            INSERT INTO order_stock (order_id, product_id, variant_id, quantity, shortfall)
            VALUES ($1, $2, $3, $4, $5)
            ",
        )
        .bind(order_id)
        .bind(product_id)
        .bind(variant_id)
        .bind(taken)
        .bind(shortfall)
        .execute(&mut **tx)
        .await?;

        if shortfall > 0 {
            warn!(
                %order_id,
                product_id,
                variant_id,
                wanted = demand.wanted,
                shortfall,
                "Paid order exceeds stock"
            );
        }
        missing += shortfall;
    }
    Ok(missing)
}

/// Return the units [`commit_stock`] recorded for an order.
async fn release_stock(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order_id: OrderId,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        UPDATE product p
        SET stock = p.stock + s.quantity, updated_at = now()
        FROM order_stock s
        WHERE s.order_id = $1 AND s.product_id = p.id
        ",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query(
        r"
        UPDATE product_variant v
        SET stock = v.stock + s.quantity
        FROM order_stock s
        WHERE s.order_id = $1 AND s.variant_id = v.id
        ",
    )
    .bind(order_id)
    .execute(&mut **tx)
    .await?;

    sqlx::query("DELETE FROM order_stock WHERE order_id = $1")
        .bind(order_id)
        .execute(&mut **tx)
        .await?;

    Ok(())
}

fn money(amount: Decimal, what: &str) -> Result<Money, RepositoryError> {
    Money::non_negative(amount)
        .map_err(|e: MoneyError| RepositoryError::DataCorruption(format!("{what}: {e}")))
}

fn into_item(row: OrderItemRow) -> Result<OrderItem, RepositoryError> {
    Ok(OrderItem {
        item: line_key(row.product_id, row.variant_id, row.combo_id)?,
        name: row.name,
        unit_list_price: money(row.unit_list_price, "unit list price")?,
        unit_price: money(row.unit_price, "unit price")?,
        quantity: to_u32(row.quantity, "order quantity")?,
        line_total: money(row.line_total, "line total")?,
    })
}

fn into_order(row: OrderRow, items: Vec<OrderItem>) -> Result<Order, RepositoryError> {
    let currency = match row.currency.as_str() {
        "INR" => Currency::INR,
        other => {
            return Err(RepositoryError::DataCorruption(format!(
                "order {}: unsupported currency {other}",
                row.id
            )));
        }
    };
    Ok(Order {
        id: row.id,
        user_id: row.user_id,
        status: row.status,
        items,
        shipping_address: row.shipping_address.0,
        subtotal: money(row.subtotal, "subtotal")?,
        savings: money(row.savings, "savings")?,
        shipping_fee: money(row.shipping_fee, "shipping fee")?,
        total: money(row.total, "total")?,
        currency,
        gateway_order_id: row.gateway_order_id,
        gateway_payment_id: row.gateway_payment_id,
        failure_reason: row.failure_reason,
        stock_committed: row.stock_committed,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_committed_on_payment_success_once() {
        assert_eq!(
            StockEffect::for_transition(OrderStatus::PaymentSuccess, false),
            StockEffect::Commit
        );
        assert_eq!(
            StockEffect::for_transition(OrderStatus::PaymentSuccess, true),
            StockEffect::None
        );
    }

    #[test]
    fn test_deduction_never_takes_more_than_stock() {
        assert_eq!(deduction(5, 2), (2, 0));
        assert_eq!(deduction(2, 2), (2, 0));
        assert_eq!(deduction(1, 3), (1, 2));
        assert_eq!(deduction(0, 1), (0, 1));
    }

    #[test]
    fn test_oversold_release_returns_only_what_was_taken() {
        // Two paid orders compete for the last unit
        let mut stock = 1;
        let (first, _) = deduction(stock, 1);
        stock -= first;
        let (second, short) = deduction(stock, 1);
        stock -= second;
        assert_eq!((stock, second, short), (0, 0, 1));

        // Cancelling the order that got nothing gives nothing back
        stock += second;
        assert_eq!(stock, 0);
        stock += first;
        assert_eq!(stock, 1);
    }

    #[test]
    fn test_stock_released_only_when_committed() {
        for to in [OrderStatus::Cancelled, OrderStatus::Refunded] {
            assert_eq!(StockEffect::for_transition(to, true), StockEffect::Release);
            assert_eq!(StockEffect::for_transition(to, false), StockEffect::None);
        }
        assert_eq!(
            StockEffect::for_transition(OrderStatus::Shipped, true),
            StockEffect::None
        );
    }
}
