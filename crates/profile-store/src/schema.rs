use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Maximum length of the `core` / `task` labels, enforced at ingestion.
pub const LABEL_MAX_LEN: usize = 20;

/// Maximum byte length of a dataset table name.
pub const NAME_MAX_LEN: usize = 63;

/// Names that must never be surfaced or targeted: sqlx's migration
/// bookkeeping table and SQLite's internal `sqlite_*` namespace.
pub const MIGRATIONS_TABLE: &str = "_sqlx_migrations";

/// One measurement: which core ran which task at what utilization.
/// The wire spelling `usaged` matches the persisted column name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Record {
    pub core: String,
    pub task: String,
    pub usaged: u32,
}

/// A validated reference to one dataset table. Holding a handle does not
/// guarantee the table still exists; the catalog is the source of truth
/// and a concurrent drop invalidates the handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TableHandle {
    name: String,
}

impl TableHandle {
    /// Normalizes and validates `name` into a handle. Input is lowercased;
    /// the result must be a plain identifier: `[a-z][a-z0-9_]*`, at most
    /// [`NAME_MAX_LEN`] bytes, and not a reserved name.
    pub fn parse(name: &str) -> Result<Self> {
        let normalized = name.trim().to_ascii_lowercase();
        if normalized.is_empty() || normalized.len() > NAME_MAX_LEN {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        let mut chars = normalized.chars();
        let first = chars.next().expect("non-empty");
        if !first.is_ascii_lowercase() {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        if !chars.all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_') {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        if is_reserved(&normalized) {
            return Err(StoreError::InvalidName(name.to_string()));
        }
        Ok(TableHandle { name: normalized })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// The name as a quoted SQL identifier. Safe to interpolate into DDL
    /// and queries because [`parse`](Self::parse) restricts the charset.
    pub fn ident(&self) -> String {
        format!("\"{}\"", self.name)
    }

    /// `CREATE TABLE` statement for this dataset: the fixed record shape,
    /// no primary key, no timestamps.
    pub(crate) fn create_sql(&self) -> String {
        format!(
            "CREATE TABLE {} (\
             core VARCHAR(20) NOT NULL, \
             task VARCHAR(20) NOT NULL, \
             usaged INT UNSIGNED NOT NULL)",
            self.ident()
        )
    }
}

pub(crate) fn is_reserved(name: &str) -> bool {
    name == MIGRATIONS_TABLE || name.starts_with("sqlite_")
}

impl std::fmt::Display for TableHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}
