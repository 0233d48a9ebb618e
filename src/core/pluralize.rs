//! Plural forms for resource path derivation
//!
//! Resource paths are the pluralized, lower-cased entity names; the rules
//! here cover the common English patterns well enough for schema-derived
//! URLs ("company" → "companies", "address" → "addresses").

/// Pluralize a singular English noun.
pub fn pluralize(singular: &str) -> String {
    if singular.is_empty() {
        return String::new();
    }

    if let Some(stem) = singular.strip_suffix('y') {
        let vowel_before = stem
            .chars()
            .last()
            .is_some_and(|c| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u'));
        if !vowel_before && !stem.is_empty() {
            return format!("{}ies", stem);
        }
        return format!("{}s", singular);
    }

    if singular.ends_with('s')
        || singular.ends_with('x')
        || singular.ends_with('z')
        || singular.ends_with("ch")
        || singular.ends_with("sh")
    {
        return format!("{}es", singular);
    }

    if let Some(stem) = singular.strip_suffix("fe") {
        if !stem.is_empty() {
            return format!("{}ves", stem);
        }
    }
    if let Some(stem) = singular.strip_suffix('f') {
        if !stem.is_empty() {
            return format!("{}ves", stem);
        }
    }

    format!("{}s", singular)
}
