//! Storage core for the profiler service: dynamic per-dataset tables,
//! batch ingestion and SQL-side aggregate statistics.
//!
//! Every uploaded profile becomes its own physical table with the fixed
//! three-column record shape (`core`, `task`, `usaged`). The database
//! catalog, not process memory, is the registry's source of truth, so
//! state survives restarts and external schema changes.

pub mod error;
pub mod ingest;
pub mod parse;
pub mod registry;
pub mod schema;
pub mod stats;

pub use error::{Result, StoreError};
pub use ingest::{ingest_batch, IngestOutcome, IngestReport, UploadUnit};
pub use parse::{parse_profile_text, table_name_from_filename};
pub use registry::SchemaRegistry;
pub use schema::{Record, TableHandle};
pub use stats::{GroupStats, OverallStats, ProfileQueries};
