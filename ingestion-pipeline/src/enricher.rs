use common::storage::types::decision::{Decision, EmbeddingView};
use tracing::{debug, warn};

use crate::pipeline::PipelineServices;

/// Upper bound on text sent to the embedding provider per view.
pub const EMBEDDING_INPUT_CHAR_LIMIT: usize = 12_000;

/// Builds the text projection for one embedding view, or `None` when the
/// record has nothing for that view. An empty view never reaches the
/// provider.
pub fn view_text(decision: &Decision, view: EmbeddingView) -> Option<String> {
    let text = match view {
        EmbeddingView::Title => join_fields(&[
            decision.case_title.as_deref(),
            decision.court.as_deref(),
            Some(decision.rol.as_str()),
        ]),
        EmbeddingView::Content => decision.full_text.trim().to_string(),
        EmbeddingView::Descriptor => join_fields(&[
            decision.subject_matter.as_deref(),
            decision.result_label.as_deref(),
        ]),
    };

    if text.is_empty() {
        return None;
    }

    if text.chars().count() > EMBEDDING_INPUT_CHAR_LIMIT {
        Some(text.chars().take(EMBEDDING_INPUT_CHAR_LIMIT).collect())
    } else {
        Some(text)
    }
}

/// Attaches one vector per view. Purely additive: text fields are never
/// touched, and a failed view is logged and left absent rather than
/// aborting the record.
pub async fn attach_embeddings(decision: &mut Decision, services: &dyn PipelineServices) {
    for view in EmbeddingView::ALL {
        let Some(text) = view_text(decision, view) else {
            debug!(
                rol = %decision.rol,
                view = view.label(),
                "no text for embedding view; skipping provider call"
            );
            continue;
        };

        match services.embed_view(view, &text).await {
            Ok(embedding) => {
                debug!(
                    rol = %decision.rol,
                    view = view.label(),
                    dimension = embedding.len(),
                    "embedding view attached"
                );
                decision.set_view_embedding(view, embedding);
            }
            Err(err) => {
                warn!(
                    rol = %decision.rol,
                    view = view.label(),
                    error = %err,
                    "embedding view failed; record continues without this vector"
                );
            }
        }
    }
}

fn join_fields(fields: &[Option<&str>]) -> String {
    fields
        .iter()
        .filter_map(|f| f.map(str::trim))
        .filter(|f| !f.is_empty())
        .collect::<Vec<_>>()
        .join(" — ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn bare_decision(rol: &str) -> Decision {
        let now = Utc::now();
        Decision {
            id: rol.to_string(),
            created_at: now,
            updated_at: now,
            rol: rol.to_string(),
            source_url: String::new(),
            case_title: None,
            court: None,
            result_label: None,
            subject_matter: None,
            full_text: String::new(),
            reasoning_text: None,
            ruling_text: None,
            dissent_text: None,
            decision_date: None,
            content_hash: String::new(),
            quality_score: 0,
            title_embedding: None,
            content_embedding: None,
            descriptor_embedding: None,
        }
    }

    #[test]
    fn title_view_combines_title_court_and_rol() {
        let mut decision = bare_decision("C-5-2024");
        decision.case_title = Some("Rojas con Servicio de Salud".to_string());
        decision.court = Some("Corte de Apelaciones de Santiago".to_string());

        let text = view_text(&decision, EmbeddingView::Title).expect("title view");
        assert!(text.contains("Rojas con Servicio de Salud"));
        assert!(text.contains("C-5-2024"));
    }

    #[test]
    fn empty_content_view_is_skipped() {
        let decision = bare_decision("C-6-2024");
        assert_eq!(view_text(&decision, EmbeddingView::Content), None);
        assert_eq!(view_text(&decision, EmbeddingView::Descriptor), None);
    }

    #[test]
    fn content_view_is_truncated_to_the_char_limit() {
        let mut decision = bare_decision("C-7-2024");
        decision.full_text = "a".repeat(EMBEDDING_INPUT_CHAR_LIMIT + 500);

        let text = view_text(&decision, EmbeddingView::Content).expect("content view");
        assert_eq!(text.chars().count(), EMBEDDING_INPUT_CHAR_LIMIT);
    }
}
