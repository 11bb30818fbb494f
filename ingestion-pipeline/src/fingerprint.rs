use sha2::{Digest, Sha256};

/// Unit separator between fields. Keeps the encoding injective: moving a
/// character across a field boundary always changes the digest.
const FIELD_SEPARATOR: [u8; 1] = [0x1f];

/// Stable fingerprint over a decision's identifying text. Used both for
/// change detection on a re-scrape and as a cheap equality check that
/// avoids comparing full text blobs. An absent reasoning section hashes
/// the same as an empty one.
pub fn content_hash(rol: &str, full_text: &str, reasoning_text: Option<&str>) -> String {
    let mut hasher = Sha256::new();
    hasher.update(rol.as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(full_text.as_bytes());
    hasher.update(FIELD_SEPARATOR);
    hasher.update(reasoning_text.unwrap_or_default().as_bytes());
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_inputs_yield_identical_digests() {
        let a = content_hash("C-123-2024", "texto del fallo", Some("considerandos"));
        let b = content_hash("C-123-2024", "texto del fallo", Some("considerandos"));
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn changing_any_text_field_changes_the_digest() {
        let base = content_hash("C-123-2024", "texto del fallo", Some("considerandos"));
        assert_ne!(
            base,
            content_hash("C-123-2024", "texto distinto", Some("considerandos"))
        );
        assert_ne!(
            base,
            content_hash("C-123-2024", "texto del fallo", Some("otros considerandos"))
        );
        assert_ne!(
            base,
            content_hash("C-124-2024", "texto del fallo", Some("considerandos"))
        );
    }

    #[test]
    fn field_boundaries_are_unambiguous() {
        // Without separators these two would concatenate identically.
        let left = content_hash("C-1-2024", "ab", Some("c"));
        let right = content_hash("C-1-2024", "a", Some("bc"));
        assert_ne!(left, right);
    }

    #[test]
    fn absent_reasoning_equals_empty_reasoning() {
        assert_eq!(
            content_hash("C-1-2024", "texto", None),
            content_hash("C-1-2024", "texto", Some(""))
        );
    }
}
