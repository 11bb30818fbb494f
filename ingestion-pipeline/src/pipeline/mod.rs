mod config;
mod context;
mod services;
mod state;

pub use config::{IngestionConfig, IngestionTuning};
pub use context::RunReport;
#[allow(clippy::module_name_repetitions)]
pub use services::{DefaultPipelineServices, PipelineServices};

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};

use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::decision::Decision},
    utils::embedding::EmbeddingProvider,
};
use state_machines::core::GuardError;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

use self::{context::RecordContext, state::ready};
use crate::{
    committer::{commit, CommitOutcome},
    enricher::attach_embeddings,
    fetcher::{DecisionFetcher, ListingEntry},
    normalizer::normalize,
};

/// Terminal state of one record's pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
enum RecordOutcome {
    Committed,
    /// Caught by the dedup gate before any fetch or embedding spend.
    SkippedDuplicate,
    /// Caught by the store's unique constraint at insert time.
    RejectedDuplicate,
    Invalid(String),
}

#[allow(clippy::module_name_repetitions)]
pub struct IngestionPipeline {
    db: Arc<SurrealDbClient>,
    pipeline_config: IngestionConfig,
    services: Arc<dyn PipelineServices>,
}

impl IngestionPipeline {
    pub fn new(
        db: Arc<SurrealDbClient>,
        pipeline_config: IngestionConfig,
        fetcher: Arc<dyn DecisionFetcher>,
        embedding_provider: Arc<EmbeddingProvider>,
    ) -> Self {
        let services = DefaultPipelineServices::new(
            fetcher,
            embedding_provider,
            &pipeline_config.tuning,
        );

        Self::with_services(db, pipeline_config, Arc::new(services))
    }

    pub fn with_services(
        db: Arc<SurrealDbClient>,
        pipeline_config: IngestionConfig,
        services: Arc<dyn PipelineServices>,
    ) -> Self {
        Self {
            db,
            pipeline_config,
            services,
        }
    }

    pub async fn run(&self, entries: Vec<ListingEntry>) -> RunReport {
        self.run_with_shutdown(entries, &AtomicBool::new(false))
            .await
    }

    /// Processes entries sequentially: each record is fully handled before
    /// the next begins, with a minimum delay after every external fetch.
    /// Per-record failures are counted and never abort the run; the report
    /// is produced even when every record fails. A raised shutdown flag is
    /// honored between records, so an in-flight record always finishes.
    pub async fn run_with_shutdown(
        &self,
        entries: Vec<ListingEntry>,
        shutdown: &AtomicBool,
    ) -> RunReport {
        let mut report = RunReport::default();
        let run_started = Instant::now();
        let fetch_delay = Duration::from_millis(self.pipeline_config.tuning.fetch_delay_ms);

        for entry in entries {
            if shutdown.load(Ordering::Relaxed) {
                warn!(
                    processed = report.processed,
                    "shutdown requested; stopping run before next record"
                );
                break;
            }

            report.processed = report.processed.saturating_add(1);

            let fetched = match self.process_entry(&entry).await {
                Ok(RecordOutcome::Committed) => {
                    report.succeeded = report.succeeded.saturating_add(1);
                    true
                }
                Ok(RecordOutcome::SkippedDuplicate) => {
                    report.duplicates = report.duplicates.saturating_add(1);
                    false
                }
                Ok(RecordOutcome::RejectedDuplicate) => {
                    report.duplicates = report.duplicates.saturating_add(1);
                    true
                }
                Ok(RecordOutcome::Invalid(reason)) => {
                    warn!(rol = %entry.rol, reason = %reason, "record rejected as invalid");
                    report.errors = report.errors.saturating_add(1);
                    true
                }
                Err(err) => {
                    // Already logged by the record context; keep going.
                    if err.is_transient() {
                        debug!(rol = %entry.rol, "transient failure; record can be retried on a later run");
                    }
                    report.errors = report.errors.saturating_add(1);
                    true
                }
            };

            if fetched && !fetch_delay.is_zero() {
                sleep(fetch_delay).await;
            }
        }

        info!(
            processed = report.processed,
            succeeded = report.succeeded,
            duplicates = report.duplicates,
            errors = report.errors,
            total_ms = u64::try_from(run_started.elapsed().as_millis()).unwrap_or(u64::MAX),
            "ingestion run finished"
        );

        report
    }

    #[tracing::instrument(skip_all, fields(rol = %entry.rol))]
    async fn process_entry(&self, entry: &ListingEntry) -> Result<RecordOutcome, AppError> {
        let ctx = RecordContext::new(
            &entry.rol,
            self.db.as_ref(),
            &self.pipeline_config,
            self.services.as_ref(),
        );

        let machine = ready();

        // Dedup gate: cheapest check first, before the detail fetch and
        // before any embedding spend.
        if Decision::exists(&entry.rol, ctx.db)
            .await
            .map_err(|err| ctx.abort(err))?
        {
            debug!(rol = %entry.rol, "rol already ingested; skipping downstream stages");
            machine
                .reject()
                .map_err(|(_, guard)| map_guard_error("reject", &guard))?;
            return Ok(RecordOutcome::SkippedDuplicate);
        }

        let raw = ctx
            .services
            .fetch_detail(entry)
            .await
            .map_err(|err| ctx.abort(err))?;
        let machine = machine
            .fetch()
            .map_err(|(_, guard)| map_guard_error("fetch", &guard))?;

        let mut decision = normalize(raw).map_err(|err| ctx.abort(err))?;
        debug!(
            rol = %decision.rol,
            quality_score = decision.quality_score,
            text_chars = decision.full_text.chars().count(),
            "decision normalized"
        );
        let machine = machine
            .normalize()
            .map_err(|(_, guard)| map_guard_error("normalize", &guard))?;

        if ctx.pipeline_config.skip_embeddings {
            debug!(rol = %decision.rol, "embedding stage disabled for this run");
        } else {
            attach_embeddings(&mut decision, ctx.services).await;
        }
        let machine = machine
            .enrich()
            .map_err(|(_, guard)| map_guard_error("enrich", &guard))?;

        match commit(decision, ctx.db)
            .await
            .map_err(|err| ctx.abort(err))?
        {
            CommitOutcome::Inserted => {
                machine
                    .commit()
                    .map_err(|(_, guard)| map_guard_error("commit", &guard))?;
                info!(rol = %entry.rol, "decision ingested");
                Ok(RecordOutcome::Committed)
            }
            CommitOutcome::DuplicateRejected => {
                machine
                    .reject()
                    .map_err(|(_, guard)| map_guard_error("reject", &guard))?;
                info!(
                    rol = %entry.rol,
                    "concurrent insert detected; store constraint closed the race"
                );
                Ok(RecordOutcome::RejectedDuplicate)
            }
            CommitOutcome::Invalid(reason) => {
                machine
                    .reject()
                    .map_err(|(_, guard)| map_guard_error("reject", &guard))?;
                Ok(RecordOutcome::Invalid(reason))
            }
        }
    }
}

fn map_guard_error(event: &str, guard: &GuardError) -> AppError {
    AppError::InternalError(format!(
        "invalid record pipeline transition during {event}: {guard:?}"
    ))
}
