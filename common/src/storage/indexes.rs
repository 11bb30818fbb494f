use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use crate::{
    error::AppError,
    storage::{db::SurrealDbClient, types::decision::EmbeddingView},
};

const FTS_ANALYZER_NAME: &str = "decision_es_fts_analyzer";

#[derive(Clone, Copy)]
struct FtsIndexSpec {
    index_name: &'static str,
    field: &'static str,
}

const fn fts_index_specs() -> [FtsIndexSpec; 4] {
    [
        FtsIndexSpec {
            index_name: "decision_full_text_fts_idx",
            field: "full_text",
        },
        FtsIndexSpec {
            index_name: "decision_case_title_fts_idx",
            field: "case_title",
        },
        FtsIndexSpec {
            index_name: "decision_reasoning_fts_idx",
            field: "reasoning_text",
        },
        FtsIndexSpec {
            index_name: "decision_ruling_fts_idx",
            field: "ruling_text",
        },
    ]
}

fn hnsw_index_name(view: EmbeddingView) -> String {
    format!("idx_embedding_decision_{}", view.field_name())
}

/// Builds the runtime Surreal indexes: Spanish BM25 full-text indexes over
/// the body fields and one cosine HNSW index per embedding view.
/// Idempotent; an HNSW index whose dimension no longer matches the
/// configured embedding dimension is overwritten.
pub async fn ensure_runtime_indexes(
    db: &SurrealDbClient,
    embedding_dimension: usize,
) -> Result<(), AppError> {
    ensure_runtime_indexes_inner(db, embedding_dimension)
        .await
        .map_err(|err| AppError::InternalError(err.to_string()))
}

async fn ensure_runtime_indexes_inner(db: &SurrealDbClient, dimension: usize) -> Result<()> {
    create_fts_analyzer(db).await?;

    for spec in fts_index_specs() {
        let definition = format!(
            "DEFINE INDEX IF NOT EXISTS {index} ON TABLE decision FIELDS {field} \
             SEARCH ANALYZER {analyzer} BM25 HIGHLIGHTS;",
            index = spec.index_name,
            field = spec.field,
            analyzer = FTS_ANALYZER_NAME,
        );
        db.client
            .query(definition)
            .await
            .with_context(|| format!("creating FTS index {}", spec.index_name))?
            .check()
            .with_context(|| format!("FTS index definition failed for {}", spec.index_name))?;
    }

    for view in EmbeddingView::ALL {
        ensure_hnsw_index(db, view, dimension).await?;
    }

    Ok(())
}

async fn ensure_hnsw_index(db: &SurrealDbClient, view: EmbeddingView, dimension: usize) -> Result<()> {
    let index_name = hnsw_index_name(view);

    let verb = match existing_hnsw_dimension(db, &index_name).await? {
        Some(existing) if existing != dimension as u64 => {
            info!(
                index = %index_name,
                existing_dimension = existing,
                target_dimension = dimension,
                "Overwriting HNSW index to match new embedding dimension"
            );
            "OVERWRITE"
        }
        _ => "IF NOT EXISTS",
    };

    let definition = format!(
        "DEFINE INDEX {verb} {index} ON TABLE decision FIELDS {field} \
         HNSW DIMENSION {dimension} DIST COSINE TYPE F32 EFC 100 M 8;",
        index = index_name,
        field = view.field_name(),
    );

    db.client
        .query(definition)
        .await
        .with_context(|| format!("creating HNSW index {index_name}"))?
        .check()
        .with_context(|| format!("HNSW index definition failed for {index_name}"))?;

    Ok(())
}

async fn existing_hnsw_dimension(db: &SurrealDbClient, index_name: &str) -> Result<Option<u64>> {
    let mut response = db
        .client
        .query("INFO FOR TABLE decision;")
        .await
        .context("fetching table info for decision")?;

    let info: surrealdb::Value = response
        .take(0)
        .context("failed to take table info response")?;

    let info_json: Value =
        serde_json::to_value(info).context("serializing table info to JSON for parsing")?;

    let definition = info_json
        .get("Object")
        .and_then(|o| o.get("indexes"))
        .and_then(|i| i.get("Object"))
        .and_then(|i| i.get(index_name))
        .and_then(|details| details.get("Strand"))
        .and_then(|v| v.as_str());

    Ok(definition.and_then(extract_dimension))
}

fn extract_dimension(definition: &str) -> Option<u64> {
    definition
        .split("DIMENSION")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .and_then(|token| token.trim_end_matches(';').parse::<u64>().ok())
}

async fn create_fts_analyzer(db: &SurrealDbClient) -> Result<()> {
    let analyzer_query = format!(
        "DEFINE ANALYZER IF NOT EXISTS {analyzer}
            TOKENIZERS class
            FILTERS lowercase, ascii, snowball(spanish);",
        analyzer = FTS_ANALYZER_NAME
    );

    let res = db
        .client
        .query(analyzer_query)
        .await
        .context("creating FTS analyzer")?;

    res.check().context("failed to create FTS analyzer")?;
    Ok(())
}
