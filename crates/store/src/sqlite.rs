use async_trait::async_trait;
use sqlx::Row;

use chatrelay_core::StoreError;

use crate::object::ObjectStore;
use crate::DbPool;

/// Durable `ObjectStore` backed by the `config_object` table.
///
/// Writes go through `INSERT OR REPLACE`, so a record is swapped atomically
/// and a concurrent read sees either the old or the new body, never a mix.
#[derive(Clone)]
pub struct SqliteObjectStore {
    pool: DbPool,
}

impl SqliteObjectStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn transient(error: sqlx::Error) -> StoreError {
    StoreError::Transient(error.to_string())
}

#[async_trait]
impl ObjectStore for SqliteObjectStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        let row = sqlx::query("SELECT body FROM config_object WHERE object_key = ?1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;

        match row {
            Some(row) => Ok(row.get::<Vec<u8>, _>("body")),
            None => Err(StoreError::NotFound(key.to_owned())),
        }
    }

    async fn put(&self, key: &str, body: Vec<u8>) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT OR REPLACE INTO config_object (object_key, body, updated_at) \
             VALUES (?1, ?2, strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))",
        )
        .bind(key)
        .bind(body)
        .execute(&self.pool)
        .await
        .map_err(transient)?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        // DELETE of an absent key affects zero rows and is still success.
        sqlx::query("DELETE FROM config_object WHERE object_key = ?1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(transient)?;

        Ok(())
    }
}
