use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::path::Path;
use tracing::{debug, info};

use crate::config::Config;
use crate::database::sqlite::models::{
    MenuItem, NewMenuItem, NewOrder, NewOrderLine, NewPayment, Order, OrderLine, Payment,
};
use crate::database::sqlite::queries::{
    MenuQueries, OrderLineQueries, OrderQueries, PaymentQueries, UserQueries,
};

#[cfg(test)]
mod tests;

pub mod models;
pub mod queries;

pub type DbPool = Pool<Sqlite>;

/// Read access to the storefront database
#[derive(Debug, Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open (creating if missing) the SQLite file at `path` without touching its schema
    #[inline]
    pub async fn new<P: AsRef<Path>>(path: P, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::new()
            .filename(path.as_ref())
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .with_context(|| {
                format!(
                    "Failed to create database connection pool for {}",
                    path.as_ref().display()
                )
            })?;

        Ok(Self { pool })
    }

    /// Connect using the `[database]` section, running migrations when configured to
    #[inline]
    pub async fn connect(config: &Config) -> Result<Self> {
        let path = config.database_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory: {}", parent.display())
            })?;
        }

        let database = Self::new(&path, config.database.max_connections).await?;
        if config.database.run_migrations {
            database.run_migrations().await?;
        }

        info!("Connected to storefront database at {}", path.display());
        Ok(database)
    }

    #[inline]
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    #[inline]
    pub async fn run_migrations(&self) -> Result<()> {
        info!("Running database migrations");

        sqlx::migrate!("src/database/sqlite/migrations")
            .run(&self.pool)
            .await
            .context("Failed to run schema migration")?;

        debug!("Database migrations completed successfully");
        Ok(())
    }

    /// Cheap round trip used to report reachability
    #[inline]
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .context("Database did not answer")?;
        Ok(())
    }

    // Menu operations
    #[inline]
    pub async fn list_menu_items(&self) -> Result<Vec<MenuItem>> {
        MenuQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn list_available_menu_items(&self) -> Result<Vec<MenuItem>> {
        MenuQueries::list_available(&self.pool).await
    }

    // Order operations
    #[inline]
    pub async fn list_orders(&self) -> Result<Vec<Order>> {
        OrderQueries::list_all(&self.pool).await
    }

    #[inline]
    pub async fn get_order(&self, order_ref: &str) -> Result<Option<(Order, Vec<OrderLine>)>> {
        let Some(order) = OrderQueries::get_by_ref(&self.pool, order_ref).await? else {
            return Ok(None);
        };
        let lines = OrderLineQueries::list_for_order(&self.pool, order.id).await?;
        Ok(Some((order, lines)))
    }

    #[inline]
    pub async fn list_order_lines(&self) -> Result<Vec<OrderLine>> {
        OrderLineQueries::list_all(&self.pool).await
    }

    // Payment operations
    #[inline]
    pub async fn list_payments(&self) -> Result<Vec<Payment>> {
        PaymentQueries::list_all(&self.pool).await
    }

    /// Insert a small demo catalogue with one customer, two orders and a payment.
    /// Returns the number of menu items created; does nothing if the menu is not empty.
    #[inline]
    pub async fn seed_sample_data(&self) -> Result<usize> {
        let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bakery_menuitem")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count menu items")?;
        if existing > 0 {
            info!("Menu already has {} items, skipping sample data", existing);
            return Ok(0);
        }

        let menu = [
            ("Chocolate Cake", "Rich dark chocolate sponge with ganache frosting", 450.0, "cakes"),
            ("Red Velvet Cake", "Classic red velvet layered with cream cheese frosting", 520.0, "cakes"),
            ("Butter Croissant", "Flaky, all-butter French croissant baked fresh every morning", 90.0, "pastries"),
            ("Sourdough Loaf", "Slow-fermented country sourdough with a crisp crust", 180.0, "breads"),
            ("Choco Chip Cookies", "Box of six chewy cookies loaded with chocolate chips", 160.0, "cookies"),
        ];

        let mut created = Vec::with_capacity(menu.len());
        for (name, description, price, category) in menu {
            let item = MenuQueries::create(
                &self.pool,
                &NewMenuItem {
                    name: name.to_string(),
                    description: description.to_string(),
                    price,
                    category: category.to_string(),
                    image_url: None,
                    available: true,
                },
            )
            .await?;
            created.push(item);
        }

        let user_id = UserQueries::get_or_create(&self.pool, "demo", "demo@example.com").await?;

        let delivered = OrderQueries::create(
            &self.pool,
            &NewOrder {
                order_ref: "ORD1001".to_string(),
                user_id,
                status: "delivered".to_string(),
                total_amount: 540.0,
                delivery_fee: 40.0,
                delivery_address: "12 Market Road".to_string(),
                delivery_phone: "9000000001".to_string(),
            },
        )
        .await?;
        OrderLineQueries::create(
            &self.pool,
            &NewOrderLine {
                order_pk: delivered.id,
                menu_item_id: created[0].id,
                quantity: 1,
                price: created[0].price,
            },
        )
        .await?;
        OrderLineQueries::create(
            &self.pool,
            &NewOrderLine {
                order_pk: delivered.id,
                menu_item_id: created[2].id,
                quantity: 1,
                price: created[2].price,
            },
        )
        .await?;
        PaymentQueries::create(
            &self.pool,
            &NewPayment {
                order_pk: delivered.id,
                transaction_id: "pay_demo1001".to_string(),
                payment_method: "upi".to_string(),
                payment_status: "completed".to_string(),
                amount: delivered.grand_total(),
                upi_id: Some("demo@upi".to_string()),
                paid_at: Some(Utc::now().naive_utc()),
            },
        )
        .await?;

        let pending = OrderQueries::create(
            &self.pool,
            &NewOrder {
                order_ref: "ORD1002".to_string(),
                user_id,
                status: "preparing".to_string(),
                total_amount: 320.0,
                delivery_fee: 40.0,
                delivery_address: "12 Market Road".to_string(),
                delivery_phone: "9000000001".to_string(),
            },
        )
        .await?;
        OrderLineQueries::create(
            &self.pool,
            &NewOrderLine {
                order_pk: pending.id,
                menu_item_id: created[4].id,
                quantity: 2,
                price: created[4].price,
            },
        )
        .await?;

        info!("Seeded {} sample menu items", created.len());
        Ok(created.len())
    }
}
