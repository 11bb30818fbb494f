use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use common::{
    storage::{db::SurrealDbClient, indexes::ensure_runtime_indexes},
    utils::{config::get_config, embedding::EmbeddingProvider},
};
use ingestion_pipeline::{
    fetcher::{probe_source, ChromeFetcher, DecisionFetcher},
    IngestionConfig, IngestionPipeline,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Set up tracing
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .try_init()
        .ok();

    // Configuration problems are fatal here, before any record work.
    let config = get_config()?;

    let db = Arc::new(
        SurrealDbClient::new(
            &config.surrealdb_address,
            &config.surrealdb_username,
            &config.surrealdb_password,
            &config.surrealdb_namespace,
            &config.surrealdb_database,
        )
        .await?,
    );
    db.ensure_initialized().await?;

    let openai_client = Arc::new(async_openai::Client::with_config(
        async_openai::config::OpenAIConfig::new()
            .with_api_key(&config.openai_api_key)
            .with_api_base(&config.openai_base_url),
    ));

    let embedding_provider =
        Arc::new(EmbeddingProvider::from_config(&config, Some(openai_client)).await?);
    info!(
        embedding_backend = embedding_provider.backend_label(),
        embedding_dimension = embedding_provider.dimension(),
        "Embedding provider initialized"
    );

    ensure_runtime_indexes(&db, embedding_provider.dimension()).await?;

    probe_source(&config.search_url).await?;

    let fetcher = Arc::new(ChromeFetcher::new(Duration::from_secs(
        config.fetch_timeout_secs,
    )));
    let entries = fetcher.fetch_listing(&config.search_url).await?;
    info!(result_count = entries.len(), "search listing fetched");

    let pipeline = IngestionPipeline::new(
        db,
        IngestionConfig::from_app_config(&config),
        fetcher,
        embedding_provider,
    );

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("ctrl-c received; the current record will finish before the run stops");
                shutdown.store(true, Ordering::Relaxed);
            }
        });
    }

    let report = pipeline.run_with_shutdown(entries, &shutdown).await;

    println!("Ingestion run summary — {}", report.summary());

    Ok(())
}
