use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use common::{
    error::AppError, storage::types::decision::EmbeddingView, utils::embedding::EmbeddingProvider,
};
use tokio::time::timeout;

use super::config::IngestionTuning;
use crate::fetcher::{DecisionFetcher, ListingEntry, RawDecision};

/// The pipeline's two external collaborators behind one seam, so tests
/// can drive the driver without a browser or an embedding API.
#[async_trait]
pub trait PipelineServices: Send + Sync {
    async fn fetch_detail(&self, entry: &ListingEntry) -> Result<RawDecision, AppError>;

    async fn embed_view(&self, view: EmbeddingView, text: &str) -> Result<Vec<f32>, AppError>;
}

#[allow(clippy::module_name_repetitions)]
pub struct DefaultPipelineServices {
    fetcher: Arc<dyn DecisionFetcher>,
    embedding_provider: Arc<EmbeddingProvider>,
    fetch_timeout: Duration,
    embed_timeout: Duration,
}

impl DefaultPipelineServices {
    pub fn new(
        fetcher: Arc<dyn DecisionFetcher>,
        embedding_provider: Arc<EmbeddingProvider>,
        tuning: &IngestionTuning,
    ) -> Self {
        Self {
            fetcher,
            embedding_provider,
            fetch_timeout: Duration::from_secs(tuning.fetch_timeout_secs),
            embed_timeout: Duration::from_secs(tuning.embed_timeout_secs),
        }
    }
}

#[async_trait]
impl PipelineServices for DefaultPipelineServices {
    async fn fetch_detail(&self, entry: &ListingEntry) -> Result<RawDecision, AppError> {
        timeout(self.fetch_timeout, self.fetcher.fetch_detail(entry))
            .await
            .map_err(|_| {
                AppError::Fetch(format!(
                    "detail fetch for {} timed out after {:?}",
                    entry.rol, self.fetch_timeout
                ))
            })?
    }

    async fn embed_view(&self, view: EmbeddingView, text: &str) -> Result<Vec<f32>, AppError> {
        timeout(self.embed_timeout, self.embedding_provider.embed(text))
            .await
            .map_err(|_| {
                AppError::Fetch(format!(
                    "embedding call for view '{}' timed out after {:?}",
                    view.label(),
                    self.embed_timeout
                ))
            })?
            .map_err(AppError::Anyhow)
    }
}
