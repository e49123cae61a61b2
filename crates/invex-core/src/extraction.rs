//! Entity extraction: learned recognizer first, pattern rules as fallback.
//!
//! The two detectors are composed by one explicit rule: rules only fill
//! entity types for which the recognizer produced nothing. They never add to
//! or replace a type that already has learned spans.

use tracing::debug;

use crate::models::{EntityMap, EntitySpan, ExtractionConfig, SpanSource};
use crate::recognizer::Recognizer;
use crate::rules::PatternRuleSet;

/// Turns learned recognizer output into entity spans.
pub struct LearnedExtractor<'a> {
    recognizer: &'a dyn Recognizer,
    default_confidence: f32,
}

impl<'a> LearnedExtractor<'a> {
    pub fn new(recognizer: &'a dyn Recognizer, default_confidence: f32) -> Self {
        Self {
            recognizer,
            default_confidence,
        }
    }

    /// Every recognized span, keyed by lower-cased label, in detection order.
    pub fn detect(&self, text: &str) -> EntityMap {
        let mut entities = EntityMap::new();
        for span in self.recognizer.recognize(text) {
            let confidence = span.confidence.unwrap_or(self.default_confidence);
            entities
                .entry_or_default(span.label.to_lowercase())
                .push(EntitySpan::new(span.text, confidence, SpanSource::Learned));
        }
        entities
    }
}

/// Fills missing entity types from pattern rules.
pub struct RuleExtractor<'a> {
    rules: &'a PatternRuleSet,
    confidence: f32,
}

impl<'a> RuleExtractor<'a> {
    pub fn new(rules: &'a PatternRuleSet, confidence: f32) -> Self {
        Self { rules, confidence }
    }

    /// Add at most one rule span for every rule type absent from `entities`.
    pub fn fill_missing(&self, text: &str, entities: &mut EntityMap) {
        for rule in self.rules.rules() {
            let key = rule.key();
            if entities.has_spans(&key) {
                continue;
            }
            if let Some(value) = rule.first_match(text) {
                entities
                    .entry_or_default(key)
                    .push(EntitySpan::new(value, self.confidence, SpanSource::Rule));
            }
        }
    }
}

/// Extract entities from `text`.
pub fn extract(
    text: &str,
    recognizer: &dyn Recognizer,
    rules: &PatternRuleSet,
    config: &ExtractionConfig,
) -> EntityMap {
    let mut entities = LearnedExtractor::new(recognizer, config.learned_confidence).detect(text);
    let learned_types = entities.len();

    RuleExtractor::new(rules, config.rule_confidence).fill_missing(text, &mut entities);

    debug!(
        learned_types,
        rule_types = entities.len() - learned_types,
        "extracted entities from {} bytes",
        text.len()
    );
    entities
}
