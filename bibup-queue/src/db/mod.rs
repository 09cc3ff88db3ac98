//! Database access for bibup-queue
//!
//! SQLite storage of bibliographic records (items, their fields and creators).

pub mod items;

pub use items::SqliteRecordStore;

use anyhow::Result;
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool, creating the file and tables if missing
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // mode=rwc: read, write, create
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// Single-connection in-memory database (each connection would otherwise get
/// its own empty database)
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create the record tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS items (
            item_id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_type TEXT NOT NULL,
            version INTEGER NOT NULL DEFAULT 0,
            date_modified TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_fields (
            item_id INTEGER NOT NULL REFERENCES items(item_id) ON DELETE CASCADE,
            field_name TEXT NOT NULL,
            value TEXT NOT NULL,
            PRIMARY KEY (item_id, field_name)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS item_creators (
            item_id INTEGER NOT NULL REFERENCES items(item_id) ON DELETE CASCADE,
            order_index INTEGER NOT NULL,
            creator_type TEXT NOT NULL,
            first_name TEXT NOT NULL DEFAULT '',
            last_name TEXT NOT NULL DEFAULT '',
            PRIMARY KEY (item_id, order_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (items, item_fields, item_creators)");

    Ok(())
}
