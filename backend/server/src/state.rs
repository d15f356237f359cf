use std::sync::Arc;

use protocol::ExecutionError;
use tracing::info;

use super::{config::Config, database::Database};

pub struct AppState {
    pub config: Config,
    pub database: Database,
}

impl AppState {
    pub async fn new(config: Config) -> Result<Arc<Self>, ExecutionError> {
        info!("Opening database at {}", config.database_path);
        let database = Database::open(&config.database_path, config.query_timeout)?;

        Self::with_database(config, database).await
    }

    /// Migrates `database` and wraps it with `config`.
    pub async fn with_database(config: Config, database: Database) -> Result<Arc<Self>, ExecutionError> {
        database.migrate().await?;

        Ok(Arc::new(Self { config, database }))
    }
}
