use serde::Serialize;
use sqlx::FromRow;

use crate::error::{Result, StoreError};
use crate::registry::SchemaRegistry;
use crate::schema::Record;

/// Read side of the store: raw rows and SQL-side aggregate statistics.
#[derive(Clone)]
pub struct ProfileQueries {
    registry: SchemaRegistry,
}

/// Aggregates over the whole `usaged` column. `stddev` is the population
/// standard deviation and is `None` below 2 rows, where it is undefined.
#[derive(Clone, Debug, Serialize)]
pub struct OverallStats {
    #[serde(rename = "totalCount")]
    pub total_count: i64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub stddev: Option<f64>,
}

/// Aggregates for one distinct `core` (or `task`) value.
#[derive(Clone, Debug, Serialize)]
pub struct GroupStats {
    pub label: String,
    pub count: i64,
    pub min: f64,
    pub max: f64,
    pub avg: f64,
    pub stddev: Option<f64>,
}

/// min/max are cast to REAL so every statistic comes back floating point
/// regardless of the column's integer storage. Variance is computed as
/// E[u^2] - E[u]^2; the square root is applied here, not in SQL.
const AGG_COLUMNS: &str = "COUNT(*) AS cnt, \
     CAST(MIN(usaged) AS REAL) AS min_u, \
     CAST(MAX(usaged) AS REAL) AS max_u, \
     AVG(usaged) AS avg_u, \
     AVG(1.0 * usaged * usaged) - AVG(usaged) * AVG(usaged) AS var_u";

#[derive(FromRow)]
struct AggRow {
    cnt: i64,
    min_u: Option<f64>,
    max_u: Option<f64>,
    avg_u: Option<f64>,
    var_u: Option<f64>,
}

#[derive(FromRow)]
struct GroupAggRow {
    label: String,
    cnt: i64,
    min_u: Option<f64>,
    max_u: Option<f64>,
    avg_u: Option<f64>,
    var_u: Option<f64>,
}

fn stddev_from(count: i64, variance: Option<f64>) -> Option<f64> {
    if count < 2 {
        return None;
    }
    variance.map(|v| v.max(0.0).sqrt())
}

impl ProfileQueries {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self { registry }
    }

    pub async fn list_datasets(&self) -> Result<Vec<String>> {
        self.registry.list_all().await
    }

    /// All rows of `name`, ordered by (core, task) ascending.
    pub async fn fetch_rows(&self, name: &str) -> Result<Vec<Record>> {
        let handle = self.registry.handle(name).await?;
        let rows: Vec<Record> = sqlx::query_as(&format!(
            "SELECT core, task, usaged FROM {} ORDER BY core ASC, task ASC",
            handle.ident()
        ))
        .fetch_all(self.registry.pool())
        .await
        .map_err(|e| StoreError::storage_in(handle.name(), e))?;
        Ok(rows)
    }

    /// Statistics over every row of `name`. An empty table reports
    /// `NotFound`, same as an unknown one.
    pub async fn overall_stats(&self, name: &str) -> Result<OverallStats> {
        let handle = self.registry.handle(name).await?;
        let row: AggRow =
            sqlx::query_as(&format!("SELECT {AGG_COLUMNS} FROM {}", handle.ident()))
                .fetch_one(self.registry.pool())
                .await
                .map_err(|e| StoreError::storage_in(handle.name(), e))?;

        if row.cnt == 0 {
            return Err(StoreError::NotFound(handle.name().to_string()));
        }
        Ok(OverallStats {
            total_count: row.cnt,
            min: row.min_u.unwrap_or_default(),
            max: row.max_u.unwrap_or_default(),
            avg: row.avg_u.unwrap_or_default(),
            stddev: stddev_from(row.cnt, row.var_u),
        })
    }

    /// One [`GroupStats`] per distinct core value, ascending by core.
    pub async fn stats_by_core(&self, name: &str) -> Result<Vec<GroupStats>> {
        self.grouped_stats(name, "core").await
    }

    /// One [`GroupStats`] per distinct task value, ascending by task.
    pub async fn stats_by_task(&self, name: &str) -> Result<Vec<GroupStats>> {
        self.grouped_stats(name, "task").await
    }

    async fn grouped_stats(&self, name: &str, column: &str) -> Result<Vec<GroupStats>> {
        let handle = self.registry.handle(name).await?;
        let rows: Vec<GroupAggRow> = sqlx::query_as(&format!(
            "SELECT {column} AS label, {AGG_COLUMNS} FROM {table} GROUP BY {column} ORDER BY {column} ASC",
            table = handle.ident(),
        ))
        .fetch_all(self.registry.pool())
        .await
        .map_err(|e| StoreError::storage_in(handle.name(), e))?;

        Ok(rows
            .into_iter()
            .map(|r| GroupStats {
                label: r.label,
                count: r.cnt,
                min: r.min_u.unwrap_or_default(),
                max: r.max_u.unwrap_or_default(),
                avg: r.avg_u.unwrap_or_default(),
                stddev: stddev_from(r.cnt, r.var_u),
            })
            .collect())
    }
}
