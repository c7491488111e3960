use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The caller supplied an empty or malformed table name.
    #[error("invalid table name: {0:?}")]
    InvalidName(String),

    /// No table with this name exists in the catalog.
    #[error("table not found: {0:?}")]
    NotFound(String),

    /// The underlying database failed (connection loss, constraint
    /// violation). Carries the unit that was being processed when the
    /// ingestion loop aborted, when known.
    #[error("storage failure{}: {source}", unit_suffix(.unit))]
    Storage {
        #[source]
        source: sqlx::Error,
        unit: Option<String>,
    },
}

fn unit_suffix(unit: &Option<String>) -> String {
    match unit {
        Some(name) => format!(" while processing {name:?}"),
        None => String::new(),
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(source: sqlx::Error) -> Self {
        StoreError::Storage { source, unit: None }
    }
}

impl StoreError {
    pub(crate) fn storage_in(unit: &str, source: sqlx::Error) -> Self {
        StoreError::Storage {
            source,
            unit: Some(unit.to_string()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, StoreError>;
