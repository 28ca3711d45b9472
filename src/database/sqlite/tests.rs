use super::*;
use anyhow::Result;
use std::collections::HashSet;
use tempfile::TempDir;

async fn create_test_database() -> Result<(TempDir, Database)> {
    let temp_dir = TempDir::new()?;
    let database = Database::new(temp_dir.path().join("db.sqlite3"), 1).await?;
    database.run_migrations().await?;
    Ok((temp_dir, database))
}

#[tokio::test]
async fn integration_schema_migration() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    let tables: Vec<String> = sqlx::query_scalar(
        "SELECT name FROM sqlite_master WHERE type='table' AND name NOT LIKE 'sqlite_%' AND name NOT LIKE '_sqlx%'",
    )
    .fetch_all(database.pool())
    .await?;

    let expected_tables: HashSet<&'static str> = [
        "auth_user",
        "bakery_menuitem",
        "bakery_order",
        "bakery_orderitem",
        "bakery_payment",
    ]
    .into_iter()
    .collect();

    let actual_tables: HashSet<&str> = tables.iter().map(|t| t.as_str()).collect();
    assert_eq!(actual_tables, expected_tables);

    Ok(())
}

#[tokio::test]
async fn connect_without_migrations_leaves_schema_alone() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let config = Config::load(temp_dir.path())?;
    assert!(!config.database.run_migrations);

    let database = Database::connect(&config).await?;
    database.ping().await?;

    let tables: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name LIKE 'bakery_%'",
    )
    .fetch_one(database.pool())
    .await?;
    assert_eq!(tables, 0);
    assert!(database.list_menu_items().await.is_err());

    Ok(())
}

#[tokio::test]
async fn seed_sample_data_is_idempotent() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;

    assert_eq!(database.seed_sample_data().await?, 5);
    assert_eq!(database.seed_sample_data().await?, 0);

    let items = database.list_menu_items().await?;
    assert_eq!(items.len(), 5);
    assert_eq!(items[0].name, "Chocolate Cake");
    assert!(items.iter().all(|item| item.available));

    let orders = database.list_orders().await?;
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].customer, "demo");

    let payments = database.list_payments().await?;
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].order_ref, "ORD1001");
    assert!((payments[0].amount - 580.0).abs() < f64::EPSILON);

    Ok(())
}

#[tokio::test]
async fn get_order_with_lines() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    database.seed_sample_data().await?;

    let (order, lines) = database
        .get_order("ORD1001")
        .await?
        .expect("seeded order should exist");
    assert_eq!(order.status_label(), "Delivered");
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0].item_name, "Chocolate Cake");

    assert!(database.get_order("ORD9999").await?.is_none());

    Ok(())
}

#[tokio::test]
async fn cascade_delete_removes_lines() -> Result<()> {
    let (_temp_dir, database) = create_test_database().await?;
    database.seed_sample_data().await?;

    sqlx::query("DELETE FROM bakery_order WHERE order_id = 'ORD1002'")
        .execute(database.pool())
        .await?;

    let lines = database.list_order_lines().await?;
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|line| line.item_name != "Choco Chip Cookies"));

    Ok(())
}
