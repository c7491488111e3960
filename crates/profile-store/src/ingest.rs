use serde::Deserialize;
use sqlx::QueryBuilder;
use tracing::{info, warn};

use crate::error::{Result, StoreError};
use crate::registry::SchemaRegistry;
use crate::schema::{Record, LABEL_MAX_LEN};

/// SQLite caps bound variables per statement; 3 binds per record.
const INSERT_CHUNK: usize = 300;

/// One uploaded file: a target table name plus its parsed records.
#[derive(Clone, Debug, Deserialize)]
pub struct UploadUnit {
    #[serde(rename = "tableName")]
    pub table_name: String,
    pub data: Vec<Record>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IngestOutcome {
    /// At least one new table was created and populated.
    Success,
    /// Nothing to do: every unit was a duplicate, invalid or empty.
    NoOp,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Tables created and populated by this batch.
    pub created: usize,
    /// Units skipped (duplicate name, invalid name, no records).
    pub skipped: usize,
}

impl IngestReport {
    pub fn outcome(&self) -> IngestOutcome {
        if self.created > 0 {
            IngestOutcome::Success
        } else {
            IngestOutcome::NoOp
        }
    }
}

/// Processes `units` strictly in order. Per-unit skip conditions are not
/// errors; a genuine storage failure aborts the remaining batch and the
/// returned error names the failing unit. Uploads never append to or
/// overwrite an existing dataset.
pub async fn ingest_batch(registry: &SchemaRegistry, units: &[UploadUnit]) -> Result<IngestReport> {
    let mut report = IngestReport::default();

    for unit in units {
        let records = usable_records(&unit.table_name, &unit.data);
        if records.is_empty() {
            warn!(table = %unit.table_name, "skipping upload unit with no usable records");
            report.skipped += 1;
            continue;
        }

        let (handle, created) = match registry.get_or_create(&unit.table_name).await {
            Ok(pair) => pair,
            Err(StoreError::InvalidName(name)) => {
                warn!(table = %name, "skipping upload unit with invalid table name");
                report.skipped += 1;
                continue;
            }
            Err(e) => return Err(e),
        };
        if !created {
            info!(table = %handle, "dataset already exists, skipping");
            report.skipped += 1;
            continue;
        }

        bulk_insert(registry, &handle.ident(), handle.name(), &records).await?;
        info!(table = %handle, rows = records.len(), "dataset created");
        report.created += 1;
    }

    Ok(report)
}

/// Drops records that violate the fixed column constraints, mirroring how
/// the text parser drops unparseable lines: warn and move on.
fn usable_records<'a>(table_name: &str, data: &'a [Record]) -> Vec<&'a Record> {
    data.iter()
        .filter(|r| {
            let ok = !r.core.is_empty()
                && r.core.len() <= LABEL_MAX_LEN
                && !r.task.is_empty()
                && r.task.len() <= LABEL_MAX_LEN;
            if !ok {
                warn!(
                    table = %table_name,
                    core = %r.core,
                    task = %r.task,
                    "dropping record with invalid labels"
                );
            }
            ok
        })
        .collect()
}

/// Inserts all records inside one transaction so the table is populated
/// all-or-nothing, chunked to stay under the bind variable limit.
async fn bulk_insert(
    registry: &SchemaRegistry,
    ident: &str,
    table_name: &str,
    records: &[&Record],
) -> Result<()> {
    let mut tx = registry
        .pool()
        .begin()
        .await
        .map_err(|e| StoreError::storage_in(table_name, e))?;

    for chunk in records.chunks(INSERT_CHUNK) {
        let mut qb: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new(format!("INSERT INTO {ident} (core, task, usaged) "));
        qb.push_values(chunk.iter().copied(), |mut b, r| {
            b.push_bind(&r.core)
                .push_bind(&r.task)
                .push_bind(r.usaged as i64);
        });
        qb.build()
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::storage_in(table_name, e))?;
    }

    tx.commit()
        .await
        .map_err(|e| StoreError::storage_in(table_name, e))?;
    Ok(())
}
