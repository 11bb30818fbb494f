use chrono::Utc;
use common::{
    error::AppError,
    storage::{db::SurrealDbClient, types::decision::Decision},
};
use tracing::debug;

use crate::fingerprint::content_hash;

/// Terminal result of a commit attempt. Duplicates and invalid records
/// are expected outcomes, not errors; only store failures other than a
/// uniqueness violation surface as `Err`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Inserted,
    DuplicateRejected,
    Invalid(String),
}

/// Writes a decision as a single atomic insert. The content hash is
/// recomputed here so it stays consistent even if text fields were
/// mutated after normalization. The store's unique constraint on the rol
/// is the authoritative dedup guard; a violation at insert time means
/// another run won the race and is reported as `DuplicateRejected`.
pub async fn commit(
    mut decision: Decision,
    db: &SurrealDbClient,
) -> Result<CommitOutcome, AppError> {
    if decision.full_text.trim().is_empty() {
        return Ok(CommitOutcome::Invalid(
            "decision has an empty full_text and cannot be persisted".to_string(),
        ));
    }

    decision.content_hash = content_hash(
        &decision.rol,
        &decision.full_text,
        decision.reasoning_text.as_deref(),
    );
    decision.updated_at = Utc::now();

    let rol = decision.rol.clone();
    match db.store_item(decision).await {
        Ok(_) => {
            debug!(rol = %rol, "decision committed");
            Ok(CommitOutcome::Inserted)
        }
        Err(err) if is_unique_violation(&err) => {
            debug!(rol = %rol, "insert lost the race to an existing record");
            Ok(CommitOutcome::DuplicateRejected)
        }
        Err(err) => Err(AppError::Database(err)),
    }
}

/// SurrealDB reports both a record-id collision and a unique-index
/// violation through the error message.
fn is_unique_violation(error: &surrealdb::Error) -> bool {
    let message = error.to_string();
    message.contains("already exists") || message.contains("already contains")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fetcher::RawDecision, normalizer::normalize};
    use uuid::Uuid;

    async fn setup_db() -> SurrealDbClient {
        let namespace = "committer_test";
        let database = Uuid::new_v4().to_string();
        let db = SurrealDbClient::memory(namespace, &database)
            .await
            .expect("Failed to start in-memory surrealdb");
        db.ensure_initialized()
            .await
            .expect("Failed to initialize schema");
        db
    }

    fn decision(rol: &str, text: &str) -> Decision {
        normalize(RawDecision {
            rol: Some(rol.to_string()),
            texto_completo: Some(text.to_string()),
            considerandos: Some("PRIMERO: Que el recurso...".to_string()),
            ..RawDecision::default()
        })
        .expect("normalize")
    }

    #[tokio::test]
    async fn second_commit_with_same_rol_is_rejected_and_store_keeps_one() {
        let db = setup_db().await;

        let first = commit(decision("C-200-2024", "Texto original."), &db)
            .await
            .expect("first commit");
        assert_eq!(first, CommitOutcome::Inserted);

        let second = commit(decision("C-200-2024", "Texto re-scrapeado distinto."), &db)
            .await
            .expect("second commit");
        assert_eq!(second, CommitOutcome::DuplicateRejected);

        let stored: Vec<Decision> = db.get_all_stored_items().await.expect("fetch all");
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored.first().map(|d| d.full_text.as_str()),
            Some("Texto original."),
            "existing record must never be silently overwritten"
        );
    }

    #[tokio::test]
    async fn empty_full_text_never_reaches_the_store() {
        let db = setup_db().await;

        let mut invalid = decision("C-201-2024", "placeholder");
        invalid.full_text = "   ".to_string();

        let outcome = commit(invalid, &db).await.expect("commit");
        assert!(matches!(outcome, CommitOutcome::Invalid(_)));

        let stored: Vec<Decision> = db.get_all_stored_items().await.expect("fetch all");
        assert!(stored.is_empty());
    }

    #[tokio::test]
    async fn hash_is_recomputed_from_mutated_text_before_insert() {
        let db = setup_db().await;

        let mut mutated = decision("C-202-2024", "Texto original.");
        let stale_hash = mutated.content_hash.clone();
        mutated.full_text = "Texto corregido tras la normalización.".to_string();

        commit(mutated, &db).await.expect("commit");

        let stored: Option<Decision> = db.get_item("C-202-2024").await.expect("fetch");
        let stored = stored.expect("record present");
        assert_ne!(stored.content_hash, stale_hash);
        assert_eq!(
            stored.content_hash,
            content_hash(
                "C-202-2024",
                "Texto corregido tras la normalización.",
                stored.reasoning_text.as_deref()
            )
        );
    }
}
