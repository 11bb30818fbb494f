use chrono::NaiveDate;

use crate::{error::AppError, storage::db::SurrealDbClient, stored_record};

/// Normalized decision date. A source date string that matches none of the
/// known formats is kept verbatim as `Unparsed` instead of being silently
/// stored in a date-typed field.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum DecisionDate {
    Parsed(NaiveDate),
    Unparsed(String),
}

/// Text projections of a decision that are vectorized independently.
/// Each view has its own column and its own HNSW index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbeddingView {
    Title,
    Content,
    Descriptor,
}

impl EmbeddingView {
    pub const ALL: [EmbeddingView; 3] = [
        EmbeddingView::Title,
        EmbeddingView::Content,
        EmbeddingView::Descriptor,
    ];

    pub fn field_name(&self) -> &'static str {
        match self {
            EmbeddingView::Title => "title_embedding",
            EmbeddingView::Content => "content_embedding",
            EmbeddingView::Descriptor => "descriptor_embedding",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            EmbeddingView::Title => "title",
            EmbeddingView::Content => "content",
            EmbeddingView::Descriptor => "descriptor",
        }
    }
}

stored_record!(Decision, "decision", {
    rol: String,
    source_url: String,
    case_title: Option<String>,
    court: Option<String>,
    result_label: Option<String>,
    subject_matter: Option<String>,
    full_text: String,
    reasoning_text: Option<String>,
    ruling_text: Option<String>,
    dissent_text: Option<String>,
    decision_date: Option<DecisionDate>,
    content_hash: String,
    quality_score: u8,
    title_embedding: Option<Vec<f32>>,
    content_embedding: Option<Vec<f32>>,
    descriptor_embedding: Option<Vec<f32>>
});

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Deserialize)]
pub struct SimilarDecision {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub rol: String,
    pub distance: f32,
}

impl SimilarDecision {
    /// Cosine similarity in `[0, 1]`, derived from the knn distance.
    pub fn score(&self) -> f32 {
        1.0 - self.distance
    }
}

#[allow(clippy::module_name_repetitions)]
#[derive(Debug, Deserialize)]
pub struct DecisionSearchResult {
    #[serde(deserialize_with = "deserialize_flexible_id")]
    pub id: String,
    pub rol: String,
    #[serde(default)]
    pub case_title: Option<String>,
    #[serde(default)]
    pub court: Option<String>,
    pub score: f32,
    #[serde(default)]
    pub highlighted_text: Option<String>,
    #[serde(default)]
    pub highlighted_title: Option<String>,
}

impl Decision {
    pub fn view_embedding(&self, view: EmbeddingView) -> Option<&Vec<f32>> {
        match view {
            EmbeddingView::Title => self.title_embedding.as_ref(),
            EmbeddingView::Content => self.content_embedding.as_ref(),
            EmbeddingView::Descriptor => self.descriptor_embedding.as_ref(),
        }
    }

    pub fn set_view_embedding(&mut self, view: EmbeddingView, embedding: Vec<f32>) {
        match view {
            EmbeddingView::Title => self.title_embedding = Some(embedding),
            EmbeddingView::Content => self.content_embedding = Some(embedding),
            EmbeddingView::Descriptor => self.descriptor_embedding = Some(embedding),
        }
    }

    /// Cheap existence check on the natural key. Queried before the detail
    /// fetch and before any embedding call so already-known decisions cost
    /// nothing beyond this one lookup.
    pub async fn exists(rol: &str, db: &SurrealDbClient) -> Result<bool, AppError> {
        let mut response = db
            .client
            .query("SELECT VALUE id FROM type::table($table_name) WHERE rol = $rol LIMIT 1")
            .bind(("table_name", Decision::table_name()))
            .bind(("rol", rol.to_owned()))
            .await?;

        let existing: Option<surrealdb::sql::Thing> = response.take(0)?;

        Ok(existing.is_some())
    }

    /// Approximate nearest neighbours over one embedding view, closest
    /// first. Results carry `1 - cosine_distance` as their score.
    pub async fn find_similar(
        db: &SurrealDbClient,
        view: EmbeddingView,
        query_vector: Vec<f32>,
        limit: usize,
    ) -> Result<Vec<SimilarDecision>, AppError> {
        let sql = format!(
            "SELECT id, rol, vector::distance::knn() AS distance FROM decision \
             WHERE {field} <|{limit},40|> $embedding ORDER BY distance",
            field = view.field_name(),
        );

        Ok(db
            .client
            .query(sql)
            .bind(("embedding", query_vector))
            .await?
            .take(0)?)
    }

    pub async fn search(
        db: &SurrealDbClient,
        search_terms: &str,
        limit: usize,
    ) -> Result<Vec<DecisionSearchResult>, AppError> {
        let sql = r#"
            SELECT
                id,
                rol,
                case_title,
                court,
                search::highlight('<b>', '</b>', 0) AS highlighted_text,
                search::highlight('<b>', '</b>', 1) AS highlighted_title,
                (
                    IF search::score(0) != NONE THEN search::score(0) ELSE 0 END +
                    IF search::score(1) != NONE THEN search::score(1) ELSE 0 END +
                    IF search::score(2) != NONE THEN search::score(2) ELSE 0 END
                ) AS score
            FROM decision
            WHERE
                full_text @0@ $terms OR
                case_title @1@ $terms OR
                reasoning_text @2@ $terms
            ORDER BY score DESC
            LIMIT $limit;
        "#;

        Ok(db
            .client
            .query(sql)
            .bind(("terms", search_terms.to_owned()))
            .bind(("limit", limit))
            .await?
            .take(0)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::indexes::ensure_runtime_indexes;
    use uuid::Uuid;

    fn sample_decision(rol: &str, full_text: &str) -> Decision {
        let now = Utc::now();
        Decision {
            id: rol.to_string(),
            created_at: now,
            updated_at: now,
            rol: rol.to_string(),
            source_url: format!("https://juris.pjud.cl/fallos/{rol}"),
            case_title: Some("Contreras con Fisco".to_string()),
            court: Some("Corte Suprema".to_string()),
            result_label: Some("Acogido".to_string()),
            subject_matter: Some("Recurso de protección".to_string()),
            full_text: full_text.to_string(),
            reasoning_text: Some("Considerando primero".to_string()),
            ruling_text: None,
            dissent_text: None,
            decision_date: Some(DecisionDate::Parsed(
                NaiveDate::from_ymd_opt(2024, 3, 15).expect("valid date"),
            )),
            content_hash: "0".repeat(64),
            quality_score: 80,
            title_embedding: None,
            content_embedding: None,
            descriptor_embedding: None,
        }
    }

    async fn setup_db() -> SurrealDbClient {
        let namespace = "decision_test";
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, &database)
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized()
            .await
            .expect("Failed to initialize schema");
        db
    }

    #[tokio::test]
    async fn exists_reports_known_rol_only() {
        let db = setup_db().await;

        let decision = sample_decision("C-100-2024", "Texto íntegro del fallo.");
        db.store_item(decision).await.expect("store decision");

        assert!(Decision::exists("C-100-2024", &db).await.expect("exists"));
        assert!(!Decision::exists("C-999-2024", &db).await.expect("exists"));
    }

    #[tokio::test]
    async fn find_similar_orders_by_distance() {
        let db = setup_db().await;
        ensure_runtime_indexes(&db, 4).await.expect("indexes");

        let mut near = sample_decision("C-1-2024", "Sentencia sobre contratos.");
        near.content_embedding = Some(vec![1.0, 0.0, 0.0, 0.0]);
        let mut far = sample_decision("C-2-2024", "Sentencia sobre aguas.");
        far.content_embedding = Some(vec![0.0, 1.0, 0.0, 0.0]);

        db.store_item(near).await.expect("store near");
        db.store_item(far).await.expect("store far");

        let matches = Decision::find_similar(
            &db,
            EmbeddingView::Content,
            vec![1.0, 0.0, 0.0, 0.0],
            2,
        )
        .await
        .expect("similarity search");

        assert_eq!(matches.len(), 2);
        assert_eq!(matches.first().map(|m| m.rol.as_str()), Some("C-1-2024"));
        let top_score = matches.first().map(|m| m.score()).unwrap_or_default();
        assert!(top_score > 0.99, "identical vector should score near 1.0");
    }

    #[tokio::test]
    async fn full_text_search_finds_body_terms() {
        let db = setup_db().await;
        ensure_runtime_indexes(&db, 4).await.expect("indexes");

        let hit = sample_decision("C-10-2024", "Se acoge el recurso de casación deducido.");
        let miss = sample_decision("C-11-2024", "Se rechaza la demanda de alimentos.");
        db.store_item(hit).await.expect("store hit");
        db.store_item(miss).await.expect("store miss");

        let results = Decision::search(&db, "casación", 10)
            .await
            .expect("fts search");

        assert_eq!(results.len(), 1);
        assert_eq!(results.first().map(|r| r.rol.as_str()), Some("C-10-2024"));
        assert!(results
            .first()
            .and_then(|r| r.highlighted_text.as_deref())
            .is_some_and(|text| text.contains("<b>")));
    }
}
