use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{Result, StoreError};
use crate::schema::{TableHandle, MIGRATIONS_TABLE};

/// Tracks one physical table per dataset name. Deliberately stateless:
/// every query goes to the database catalog, so the registry reflects
/// ground truth across restarts and external schema changes.
#[derive(Clone)]
pub struct SchemaRegistry {
    pool: SqlitePool,
}

impl SchemaRegistry {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns a handle for `name`, creating the physical table if it does
    /// not exist yet. The boolean reports whether this call created it.
    ///
    /// Creation is a single strict `CREATE TABLE`; when two callers race
    /// on the same new name, the engine lets exactly one statement through
    /// and the loser observes the existing table. No check-then-create
    /// window.
    pub async fn get_or_create(&self, name: &str) -> Result<(TableHandle, bool)> {
        let handle = TableHandle::parse(name)?;
        match sqlx::query(&handle.create_sql()).execute(&self.pool).await {
            Ok(_) => {
                debug!(table = %handle, "created dataset table");
                Ok((handle, true))
            }
            Err(e) if is_already_exists(&e) => Ok((handle, false)),
            Err(e) => Err(StoreError::storage_in(handle.name(), e)),
        }
    }

    pub async fn exists(&self, name: &str) -> Result<bool> {
        let handle = TableHandle::parse(name)?;
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?",
        )
        .bind(handle.name())
        .fetch_one(&self.pool)
        .await?;
        Ok(count > 0)
    }

    /// Handle for an existing table; `NotFound` if the catalog has no such
    /// table. Used by read and drop paths, which must never create. A
    /// syntactically invalid name cannot name an existing table, so it is
    /// reported as `NotFound` here rather than `InvalidName`.
    pub async fn handle(&self, name: &str) -> Result<TableHandle> {
        let handle = TableHandle::parse(name)
            .map_err(|_| StoreError::NotFound(name.trim().to_string()))?;
        if !self.exists(handle.name()).await? {
            return Err(StoreError::NotFound(handle.name().to_string()));
        }
        Ok(handle)
    }

    /// All dataset table names, ascending. Internal `sqlite_*` tables and
    /// the migration bookkeeping table are never surfaced.
    pub async fn list_all(&self) -> Result<Vec<String>> {
        let names: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM sqlite_master \
             WHERE type = 'table' \
               AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
               AND name <> ? \
             ORDER BY name ASC",
        )
        .bind(MIGRATIONS_TABLE)
        .fetch_all(&self.pool)
        .await?;
        Ok(names)
    }

    /// Drops the physical table and with it the registry entry. `NotFound`
    /// when the catalog has no such table. Works for tables created in a
    /// previous process lifetime: only the catalog is consulted.
    pub async fn drop(&self, name: &str) -> Result<()> {
        let handle = self.handle(name).await?;
        sqlx::query(&format!("DROP TABLE {}", handle.ident()))
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::storage_in(handle.name(), e))?;
        debug!(table = %handle, "dropped dataset table");
        Ok(())
    }
}

fn is_already_exists(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::Database(db) => db.message().contains("already exists"),
        _ => false,
    }
}
