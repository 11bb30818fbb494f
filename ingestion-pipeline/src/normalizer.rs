use chrono::{NaiveDate, Utc};
use common::{
    error::AppError,
    storage::types::decision::{Decision, DecisionDate},
};

use crate::{fetcher::RawDecision, fingerprint::content_hash};

/// Source date formats in trial order: day-first with `/` or `-`, then
/// ISO-style year-first. The first format that parses the full string
/// wins. The 2-digit-year formats must come before the 4-digit ones:
/// `%Y` accepts a 2-digit year and would map "01/12/23" to the year 23,
/// while `%y` never consumes a 4-digit year, so this order is safe both
/// ways.
const DATE_FORMATS: [&str; 6] = [
    "%d/%m/%y", "%d-%m-%y", "%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%Y/%m/%d",
];

/// Converts the raw field mapping scraped from a detail page into a typed
/// `Decision`. A missing rol is the only hard error; everything else
/// degrades to an absent field or, for dates, to the unparsed sentinel.
pub fn normalize(raw: RawDecision) -> Result<Decision, AppError> {
    let rol = clean(raw.rol).ok_or_else(|| {
        AppError::Validation("scraped result has no rol; cannot form a decision record".to_string())
    })?;

    let full_text = clean(raw.texto_completo).unwrap_or_default();
    let reasoning_text = clean(raw.considerandos);
    let hash = content_hash(&rol, &full_text, reasoning_text.as_deref());

    let now = Utc::now();
    let mut decision = Decision {
        id: rol.clone(),
        created_at: now,
        updated_at: now,
        rol,
        source_url: clean(raw.enlace).unwrap_or_default(),
        case_title: clean(raw.caratulado),
        court: clean(raw.tribunal),
        result_label: clean(raw.resultado),
        subject_matter: clean(raw.materia),
        full_text,
        reasoning_text,
        ruling_text: clean(raw.resolucion),
        dissent_text: clean(raw.disidencia),
        decision_date: clean(raw.fecha).map(|fecha| parse_decision_date(&fecha)),
        content_hash: hash,
        quality_score: 0,
        title_embedding: None,
        content_embedding: None,
        descriptor_embedding: None,
    };
    decision.quality_score = quality_score(&decision);

    Ok(decision)
}

/// Never fails: a date that matches no known format is carried verbatim.
pub fn parse_decision_date(raw: &str) -> DecisionDate {
    let trimmed = raw.trim();
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
            return DecisionDate::Parsed(date);
        }
    }
    DecisionDate::Unparsed(trimmed.to_string())
}

/// Trims and maps empty strings to the absent state.
fn clean(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Completeness heuristic in 0..=100. The full text dominates; metadata
/// fields contribute smaller fixed amounts.
fn quality_score(decision: &Decision) -> u8 {
    let mut score: u8 = 0;
    if !decision.full_text.trim().is_empty() {
        score = score.saturating_add(40);
    }
    if matches!(decision.decision_date, Some(DecisionDate::Parsed(_))) {
        score = score.saturating_add(15);
    }
    if decision.court.is_some() {
        score = score.saturating_add(10);
    }
    if decision.case_title.is_some() {
        score = score.saturating_add(10);
    }
    if decision.reasoning_text.is_some() {
        score = score.saturating_add(10);
    }
    if decision.ruling_text.is_some() {
        score = score.saturating_add(10);
    }
    if decision.subject_matter.is_some() {
        score = score.saturating_add(5);
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw_with_rol(rol: &str) -> RawDecision {
        RawDecision {
            rol: Some(rol.to_string()),
            texto_completo: Some("VISTOS: se acoge el recurso.".to_string()),
            ..RawDecision::default()
        }
    }

    #[test]
    fn slash_separated_day_first_date_parses() {
        assert_eq!(
            parse_decision_date("15/03/2024"),
            DecisionDate::Parsed(NaiveDate::from_ymd_opt(2024, 3, 15).expect("date"))
        );
    }

    #[test]
    fn iso_date_parses_to_the_same_day() {
        assert_eq!(
            parse_decision_date("2024-03-15"),
            DecisionDate::Parsed(NaiveDate::from_ymd_opt(2024, 3, 15).expect("date"))
        );
    }

    #[test]
    fn dash_separated_and_two_digit_years_parse() {
        assert_eq!(
            parse_decision_date("01-12-2023"),
            DecisionDate::Parsed(NaiveDate::from_ymd_opt(2023, 12, 1).expect("date"))
        );
        assert_eq!(
            parse_decision_date("01/12/23"),
            DecisionDate::Parsed(NaiveDate::from_ymd_opt(2023, 12, 1).expect("date"))
        );
    }

    #[test]
    fn two_digit_years_land_in_the_current_century() {
        // A lax 4-digit parse would read these as years 23 and 24.
        assert_eq!(
            parse_decision_date("15/03/24"),
            DecisionDate::Parsed(NaiveDate::from_ymd_opt(2024, 3, 15).expect("date"))
        );
        assert_eq!(
            parse_decision_date("01-12-23"),
            DecisionDate::Parsed(NaiveDate::from_ymd_opt(2023, 12, 1).expect("date"))
        );
    }

    #[test]
    fn unparseable_date_keeps_the_original_string() {
        assert_eq!(
            parse_decision_date("not-a-date"),
            DecisionDate::Unparsed("not-a-date".to_string())
        );
    }

    #[test]
    fn missing_rol_is_a_validation_error() {
        let raw = RawDecision {
            texto_completo: Some("cuerpo".to_string()),
            ..RawDecision::default()
        };
        let result = normalize(raw);
        assert!(matches!(result, Err(AppError::Validation(_))));

        let blank = RawDecision {
            rol: Some("   ".to_string()),
            ..RawDecision::default()
        };
        assert!(matches!(normalize(blank), Err(AppError::Validation(_))));
    }

    #[test]
    fn text_fields_are_trimmed_and_empty_becomes_absent() {
        let mut raw = raw_with_rol("C-50-2024");
        raw.tribunal = Some("  Corte Suprema  ".to_string());
        raw.caratulado = Some("   ".to_string());

        let decision = normalize(raw).expect("normalize");
        assert_eq!(decision.court.as_deref(), Some("Corte Suprema"));
        assert_eq!(decision.case_title, None);
    }

    #[test]
    fn record_id_mirrors_the_rol() {
        let decision = normalize(raw_with_rol("C-77-2024")).expect("normalize");
        assert_eq!(decision.id, "C-77-2024");
        assert_eq!(decision.rol, "C-77-2024");
    }

    #[test]
    fn content_hash_is_computed_at_normalization() {
        let decision = normalize(raw_with_rol("C-88-2024")).expect("normalize");
        assert_eq!(decision.content_hash.len(), 64);
        assert_eq!(
            decision.content_hash,
            content_hash(&decision.rol, &decision.full_text, None)
        );
    }

    #[test]
    fn quality_score_reflects_completeness() {
        let sparse = normalize(raw_with_rol("C-1-2024")).expect("normalize");
        assert_eq!(sparse.quality_score, 40);

        let mut raw = raw_with_rol("C-2-2024");
        raw.fecha = Some("15/03/2024".to_string());
        raw.tribunal = Some("Corte Suprema".to_string());
        raw.caratulado = Some("Pérez con Banco".to_string());
        raw.considerandos = Some("PRIMERO: Que...".to_string());
        raw.resolucion = Some("Se acoge.".to_string());
        raw.materia = Some("Protección".to_string());
        let complete = normalize(raw).expect("normalize");
        assert_eq!(complete.quality_score, 100);

        let mut unparsed = raw_with_rol("C-3-2024");
        unparsed.fecha = Some("sin fecha".to_string());
        let decision = normalize(unparsed).expect("normalize");
        // Unparsed dates do not count toward completeness.
        assert_eq!(decision.quality_score, 40);
        assert_eq!(
            decision.decision_date,
            Some(DecisionDate::Unparsed("sin fecha".to_string()))
        );
    }
}
