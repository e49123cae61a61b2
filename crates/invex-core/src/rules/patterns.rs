//! Default fallback patterns for French invoices.

use lazy_static::lazy_static;

use super::PatternRuleSet;

/// Built-in patterns, one ordered list per entity type.
///
/// Each pattern is matched case-insensitively; the first capturing group is
/// the extracted value.
pub const DEFAULT_PATTERNS: &[(&str, &[&str])] = &[
    ("DATE", &[r"(\d{1,2}[/.-]\d{1,2}[/.-]\d{2,4})"]),
    (
        "MONTANT_HT",
        &[r"(?:total|montant)?\s+ht\s*:?\s*(\d+[\s.,]*\d*\s*(?:€|EUR)?)"],
    ),
    (
        "MONTANT_TTC",
        &[r"(?:total|montant)?\s+ttc\s*:?\s*(\d+[\s.,]*\d*\s*(?:€|EUR)?)"],
    ),
    ("TVA", &[r"(?:tva|tax)\s*:?\s*(\d+[\s.,]*\d*\s*(?:%|€|EUR)?)"]),
    (
        "REFERENCE",
        &[r"(?:ref|référence|facture)\s*:?\s*([A-Z0-9]{4,}[-/][A-Z0-9]{4,})"],
    ),
    (
        "PHONE",
        &[r"(?:tel|téléphone|tél)\s*:?\s*((?:\+\d{2,3})?[\s.]?\d{1,2}[\s.-]?\d{2}[\s.-]?\d{2}[\s.-]?\d{2}[\s.-]?\d{2})"],
    ),
];

lazy_static! {
    pub static ref DEFAULT_RULES: PatternRuleSet = {
        let mut rules = PatternRuleSet::new();
        for (entity_type, patterns) in DEFAULT_PATTERNS {
            rules.add_rule(entity_type, patterns.iter()).unwrap();
        }
        rules
    };
}
