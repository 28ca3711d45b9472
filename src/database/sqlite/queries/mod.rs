
use super::models::*;
use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

const MENU_COLUMNS: &str = "id, name, description, CAST(price AS REAL) AS price, category, \
     image_url, available, created_at";

const ORDER_SELECT: &str = "SELECT o.id, o.order_id AS order_ref, u.username AS customer, o.status, \
     CAST(o.total_amount AS REAL) AS total_amount, CAST(o.delivery_fee AS REAL) AS delivery_fee, \
     o.delivery_address, o.delivery_phone, o.created_at \
     FROM bakery_order o JOIN auth_user u ON u.id = o.user_id";

const LINE_SELECT: &str = "SELECT oi.order_id AS order_pk, m.name AS item_name, oi.quantity, \
     CAST(oi.price AS REAL) AS price \
     FROM bakery_orderitem oi JOIN bakery_menuitem m ON m.id = oi.menu_item_id";

const PAYMENT_SELECT: &str = "SELECT p.id, p.transaction_id, o.order_id AS order_ref, p.payment_method, \
     p.payment_status, CAST(p.amount AS REAL) AS amount, p.upi_id, p.created_at, p.paid_at \
     FROM bakery_payment p JOIN bakery_order o ON o.id = p.order_id";

pub struct MenuQueries;

impl MenuQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, item: &NewMenuItem) -> Result<MenuItem> {
        let id = sqlx::query(
            "INSERT INTO bakery_menuitem (name, description, price, category, image_url, available) \
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(&item.name)
        .bind(&item.description)
        .bind(item.price)
        .bind(&item.category)
        .bind(&item.image_url)
        .bind(item.available)
        .execute(pool)
        .await
        .context("Failed to create menu item")?
        .last_insert_rowid();

        Self::get_by_id(pool, id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created menu item"))
    }

    #[inline]
    pub async fn get_by_id(pool: &SqlitePool, id: i64) -> Result<Option<MenuItem>> {
        let sql = format!("SELECT {MENU_COLUMNS} FROM bakery_menuitem WHERE id = ?");
        sqlx::query_as::<_, MenuItem>(&sql)
            .bind(id)
            .fetch_optional(pool)
            .await
            .context("Failed to get menu item by id")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<MenuItem>> {
        let sql = format!("SELECT {MENU_COLUMNS} FROM bakery_menuitem ORDER BY id");
        let items = sqlx::query_as::<_, MenuItem>(&sql)
            .fetch_all(pool)
            .await
            .context("Failed to list menu items")?;

        debug!("Loaded {} menu items", items.len());
        Ok(items)
    }

    #[inline]
    pub async fn list_available(pool: &SqlitePool) -> Result<Vec<MenuItem>> {
        let sql = format!("SELECT {MENU_COLUMNS} FROM bakery_menuitem WHERE available = 1 ORDER BY id");
        sqlx::query_as::<_, MenuItem>(&sql)
            .fetch_all(pool)
            .await
            .context("Failed to list available menu items")
    }
}

pub struct OrderQueries;

impl OrderQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, order: &NewOrder) -> Result<Order> {
        sqlx::query(
            "INSERT INTO bakery_order \
             (order_id, user_id, status, total_amount, delivery_fee, delivery_address, delivery_phone) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&order.order_ref)
        .bind(order.user_id)
        .bind(&order.status)
        .bind(order.total_amount)
        .bind(order.delivery_fee)
        .bind(&order.delivery_address)
        .bind(&order.delivery_phone)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create order {}", order.order_ref))?;

        Self::get_by_ref(pool, &order.order_ref)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to retrieve created order"))
    }

    #[inline]
    pub async fn get_by_ref(pool: &SqlitePool, order_ref: &str) -> Result<Option<Order>> {
        let sql = format!("{ORDER_SELECT} WHERE o.order_id = ?");
        sqlx::query_as::<_, Order>(&sql)
            .bind(order_ref)
            .fetch_optional(pool)
            .await
            .context("Failed to get order by reference")
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Order>> {
        let sql = format!("{ORDER_SELECT} ORDER BY o.id");
        let orders = sqlx::query_as::<_, Order>(&sql)
            .fetch_all(pool)
            .await
            .context("Failed to list orders")?;

        debug!("Loaded {} orders", orders.len());
        Ok(orders)
    }
}

pub struct OrderLineQueries;

impl OrderLineQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, line: &NewOrderLine) -> Result<()> {
        sqlx::query(
            "INSERT INTO bakery_orderitem (order_id, menu_item_id, quantity, price) VALUES (?, ?, ?, ?)",
        )
        .bind(line.order_pk)
        .bind(line.menu_item_id)
        .bind(line.quantity)
        .bind(line.price)
        .execute(pool)
        .await
        .context("Failed to create order line")?;

        Ok(())
    }

    #[inline]
    pub async fn list_for_order(pool: &SqlitePool, order_pk: i64) -> Result<Vec<OrderLine>> {
        let sql = format!("{LINE_SELECT} WHERE oi.order_id = ? ORDER BY oi.id");
        sqlx::query_as::<_, OrderLine>(&sql)
            .bind(order_pk)
            .fetch_all(pool)
            .await
            .context("Failed to list order lines")
    }

    /// Every order line, grouped by order and in insertion order within an order
    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<OrderLine>> {
        let sql = format!("{LINE_SELECT} ORDER BY oi.order_id, oi.id");
        sqlx::query_as::<_, OrderLine>(&sql)
            .fetch_all(pool)
            .await
            .context("Failed to list order lines")
    }
}

pub struct PaymentQueries;

impl PaymentQueries {
    #[inline]
    pub async fn create(pool: &SqlitePool, payment: &NewPayment) -> Result<()> {
        sqlx::query(
            "INSERT INTO bakery_payment \
             (order_id, transaction_id, payment_method, payment_status, amount, upi_id, paid_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(payment.order_pk)
        .bind(&payment.transaction_id)
        .bind(&payment.payment_method)
        .bind(&payment.payment_status)
        .bind(payment.amount)
        .bind(&payment.upi_id)
        .bind(payment.paid_at)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to create payment {}", payment.transaction_id))?;

        Ok(())
    }

    #[inline]
    pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Payment>> {
        let sql = format!("{PAYMENT_SELECT} ORDER BY p.id");
        let payments = sqlx::query_as::<_, Payment>(&sql)
            .fetch_all(pool)
            .await
            .context("Failed to list payments")?;

        debug!("Loaded {} payments", payments.len());
        Ok(payments)
    }
}

pub struct UserQueries;

impl UserQueries {
    /// Id of the user with this username, creating the account if needed
    #[inline]
    pub async fn get_or_create(pool: &SqlitePool, username: &str, email: &str) -> Result<i64> {
        sqlx::query("INSERT OR IGNORE INTO auth_user (username, email) VALUES (?, ?)")
            .bind(username)
            .bind(email)
            .execute(pool)
            .await
            .context("Failed to create user")?;

        sqlx::query_scalar::<_, i64>("SELECT id FROM auth_user WHERE username = ?")
            .bind(username)
            .fetch_one(pool)
            .await
            .context("Failed to look up user")
    }
}
