use common::utils::config::AppConfig;

#[derive(Debug, Clone)]
pub struct IngestionTuning {
    /// Minimum pause between consecutive external fetches, to respect the
    /// court site's rate limits.
    pub fetch_delay_ms: u64,
    pub fetch_timeout_secs: u64,
    pub embed_timeout_secs: u64,
}

impl Default for IngestionTuning {
    fn default() -> Self {
        Self {
            fetch_delay_ms: 1500,
            fetch_timeout_secs: 30,
            embed_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct IngestionConfig {
    pub tuning: IngestionTuning,
    /// Runs the pipeline without embedding calls; records are committed
    /// with all vector columns absent.
    pub skip_embeddings: bool,
}

impl IngestionConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            tuning: IngestionTuning {
                fetch_delay_ms: config.fetch_delay_ms,
                fetch_timeout_secs: config.fetch_timeout_secs,
                embed_timeout_secs: config.embed_timeout_secs,
            },
            skip_embeddings: config.skip_embeddings,
        }
    }
}
