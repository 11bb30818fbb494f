use common::{error::AppError, storage::db::SurrealDbClient};
use tracing::error;

use super::{config::IngestionConfig, services::PipelineServices};

/// Run-scoped statistics, owned by the driver and returned at the end of
/// a run. Nothing here is shared or global; a future concurrent driver
/// would replace this with atomics.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    pub processed: u64,
    pub succeeded: u64,
    pub duplicates: u64,
    pub errors: u64,
}

impl RunReport {
    pub fn summary(&self) -> String {
        format!(
            "processed: {}, succeeded: {}, duplicates: {}, errors: {}",
            self.processed, self.succeeded, self.duplicates, self.errors
        )
    }
}

/// Per-record working set handed through the pipeline stages.
pub struct RecordContext<'a> {
    pub rol: String,
    pub db: &'a SurrealDbClient,
    pub pipeline_config: &'a IngestionConfig,
    pub services: &'a dyn PipelineServices,
}

impl<'a> RecordContext<'a> {
    pub fn new(
        rol: &str,
        db: &'a SurrealDbClient,
        pipeline_config: &'a IngestionConfig,
        services: &'a dyn PipelineServices,
    ) -> Self {
        Self {
            rol: rol.to_string(),
            db,
            pipeline_config,
            services,
        }
    }

    pub fn abort(&self, err: AppError) -> AppError {
        error!(
            rol = %self.rol,
            error = %err,
            "record ingestion aborted"
        );
        err
    }
}
