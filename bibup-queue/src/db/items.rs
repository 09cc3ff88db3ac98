//! Item record persistence

use async_trait::async_trait;
use bibup_common::{Creator, Error, ItemId, Record, Result};
use chrono::Utc;
use sqlx::{Row, SqlitePool};

use crate::services::RecordStore;
use crate::utils::db_retry::{retry_on_lock, DEFAULT_MAX_LOCK_WAIT_MS};

/// Record store backed by the SQLite item tables
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            max_lock_wait_ms: DEFAULT_MAX_LOCK_WAIT_MS,
        }
    }

    pub fn with_max_lock_wait(mut self, max_lock_wait_ms: u64) -> Self {
        self.max_lock_wait_ms = max_lock_wait_ms;
        self
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a new item and return its id
    pub async fn insert_record(&self, record: &Record) -> Result<ItemId> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query("INSERT INTO items (item_type, version, date_modified) VALUES (?, 0, ?)")
            .bind(&record.item_type)
            .bind(Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        let item_id = result.last_insert_rowid();

        write_fields(&mut tx, item_id, record).await?;
        write_creators(&mut tx, item_id, &record.creators).await?;

        tx.commit().await?;
        tracing::debug!(item_id, item_type = %record.item_type, "Inserted item");
        Ok(item_id)
    }

    /// Current version counter of an item (bumped on every save)
    pub async fn version(&self, item_id: ItemId) -> Result<Option<i64>> {
        let version = sqlx::query_scalar::<_, i64>("SELECT version FROM items WHERE item_id = ?")
            .bind(item_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(version)
    }

    async fn load(&self, item_id: ItemId) -> Result<Option<Record>> {
        let Some(item_type) =
            sqlx::query_scalar::<_, String>("SELECT item_type FROM items WHERE item_id = ?")
                .bind(item_id)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let mut record = Record::new(item_type);

        let field_rows = sqlx::query("SELECT field_name, value FROM item_fields WHERE item_id = ?")
            .bind(item_id)
            .fetch_all(&self.pool)
            .await?;
        for row in field_rows {
            record.set_field(row.get::<String, _>("field_name"), row.get::<String, _>("value"));
        }

        let creator_rows = sqlx::query(
            r#"
            SELECT creator_type, first_name, last_name
            FROM item_creators
            WHERE item_id = ?
            ORDER BY order_index
            "#,
        )
        .bind(item_id)
        .fetch_all(&self.pool)
        .await?;
        record.creators = creator_rows
            .into_iter()
            .map(|row| {
                Creator::new(
                    row.get::<String, _>("creator_type"),
                    row.get::<String, _>("first_name"),
                    row.get::<String, _>("last_name"),
                )
            })
            .collect();

        Ok(Some(record))
    }

    async fn save_once(&self, item_id: ItemId, record: &Record) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query(
            r#"
            UPDATE items
            SET item_type = ?, version = version + 1, date_modified = ?
            WHERE item_id = ?
            "#,
        )
        .bind(&record.item_type)
        .bind(Utc::now().to_rfc3339())
        .bind(item_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(Error::NotFound(format!("item {}", item_id)));
        }

        sqlx::query("DELETE FROM item_fields WHERE item_id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        write_fields(&mut tx, item_id, record).await?;

        // Creators are cleared then re-set inside the same transaction
        sqlx::query("DELETE FROM item_creators WHERE item_id = ?")
            .bind(item_id)
            .execute(&mut *tx)
            .await?;
        write_creators(&mut tx, item_id, &record.creators).await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn write_fields(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    item_id: ItemId,
    record: &Record,
) -> Result<()> {
    for (name, value) in &record.fields {
        sqlx::query("INSERT INTO item_fields (item_id, field_name, value) VALUES (?, ?, ?)")
            .bind(item_id)
            .bind(name)
            .bind(value)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

async fn write_creators(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    item_id: ItemId,
    creators: &[Creator],
) -> Result<()> {
    for (index, creator) in creators.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO item_creators (item_id, order_index, creator_type, first_name, last_name)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(item_id)
        .bind(index as i64)
        .bind(&creator.creator_type)
        .bind(&creator.first_name)
        .bind(&creator.last_name)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn get_record(&self, item_id: ItemId) -> Result<Option<Record>> {
        self.load(item_id).await
    }

    async fn save_record(&self, item_id: ItemId, record: &Record) -> Result<()> {
        retry_on_lock("save item", self.max_lock_wait_ms, || self.save_once(item_id, record)).await?;
        tracing::debug!(
            item_id,
            item_type = %record.item_type,
            fields = record.fields.len(),
            creators = record.creators.len(),
            "Saved item"
        );
        Ok(())
    }
}
