use jobs_board::config::DatabaseConfig;
use jobs_board::workflows::allocation::{SqliteAllocationStore, StoreError};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

pub(crate) fn open_store(database: &DatabaseConfig) -> Result<SqliteAllocationStore, StoreError> {
    match database {
        DatabaseConfig::InMemory => {
            info!("opening in-memory allocation store");
            SqliteAllocationStore::open_in_memory()
        }
        DatabaseConfig::File(path) => {
            info!(path = %path.display(), "opening allocation store");
            SqliteAllocationStore::open(path)
        }
    }
}
