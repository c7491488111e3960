use std::sync::Arc;

use profile_store::{ProfileQueries, SchemaRegistry};
use sqlx::SqlitePool;

pub type SharedState = Arc<AppState>;

/// Store components constructed once at startup and injected into every
/// handler. No module-level database state.
pub struct AppState {
    pub registry: SchemaRegistry,
    pub queries: ProfileQueries,
}

impl AppState {
    pub fn new(pool: SqlitePool) -> Self {
        let registry = SchemaRegistry::new(pool);
        let queries = ProfileQueries::new(registry.clone());
        Self { registry, queries }
    }
}
