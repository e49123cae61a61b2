//! Pattern rules used as a fallback detector for entity types the learned
//! recognizer did not find.

pub mod patterns;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::RuleError;
use crate::models::OrderedMap;

pub use patterns::{DEFAULT_PATTERNS, DEFAULT_RULES};

/// Ordered patterns for one entity type.
#[derive(Debug, Clone)]
pub struct PatternRule {
    entity_type: String,
    patterns: Vec<Regex>,
}

impl PatternRule {
    /// Entity type name as declared (usually upper case).
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Lower-cased key used in entity maps.
    pub fn key(&self) -> String {
        self.entity_type.to_lowercase()
    }

    pub fn patterns(&self) -> &[Regex] {
        &self.patterns
    }

    /// Value captured by the first pattern that matches, first match only.
    ///
    /// The value is the first capturing group when it participated in the
    /// match, else the whole match, trimmed of surrounding whitespace.
    pub fn first_match(&self, text: &str) -> Option<String> {
        self.patterns.iter().find_map(|re| {
            let caps = re.captures(text)?;
            let m = caps.get(1).or_else(|| caps.get(0))?;
            Some(m.as_str().trim().to_string())
        })
    }
}

/// The active set of pattern rules, one ordered list per entity type.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "OrderedMap<Vec<String>>", into = "OrderedMap<Vec<String>>")]
pub struct PatternRuleSet {
    rules: Vec<PatternRule>,
}

impl PatternRuleSet {
    /// Create an empty rule set.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// Append patterns for `entity_type`, compiled case-insensitively.
    ///
    /// Patterns for a type that already exists are appended after its
    /// current ones. Nothing is added if any pattern fails to compile.
    pub fn add_rule<I, P>(&mut self, entity_type: &str, patterns: I) -> Result<(), RuleError>
    where
        I: IntoIterator<Item = P>,
        P: AsRef<str>,
    {
        let compiled = patterns
            .into_iter()
            .map(|p| {
                RegexBuilder::new(p.as_ref())
                    .case_insensitive(true)
                    .build()
                    .map_err(|source| RuleError::InvalidPattern {
                        entity_type: entity_type.to_string(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        match self.rules.iter_mut().find(|r| r.entity_type == entity_type) {
            Some(rule) => rule.patterns.extend(compiled),
            None => self.rules.push(PatternRule {
                entity_type: entity_type.to_string(),
                patterns: compiled,
            }),
        }
        Ok(())
    }

    pub fn rules(&self) -> &[PatternRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Pattern sources keyed by entity type, in declaration order.
    pub fn snapshot(&self) -> OrderedMap<Vec<String>> {
        self.rules
            .iter()
            .map(|r| {
                (
                    r.entity_type.clone(),
                    r.patterns.iter().map(|p| p.as_str().to_string()).collect(),
                )
            })
            .collect()
    }

    /// Compile a rule set from a snapshot.
    pub fn from_snapshot(snapshot: OrderedMap<Vec<String>>) -> Result<Self, RuleError> {
        let mut rules = Self::new();
        for (entity_type, patterns) in snapshot {
            rules.add_rule(&entity_type, patterns)?;
        }
        Ok(rules)
    }
}

impl Default for PatternRuleSet {
    fn default() -> Self {
        DEFAULT_RULES.clone()
    }
}

impl PartialEq for PatternRuleSet {
    fn eq(&self, other: &Self) -> bool {
        self.snapshot() == other.snapshot()
    }
}

impl TryFrom<OrderedMap<Vec<String>>> for PatternRuleSet {
    type Error = RuleError;

    fn try_from(snapshot: OrderedMap<Vec<String>>) -> Result<Self, Self::Error> {
        Self::from_snapshot(snapshot)
    }
}

impl From<PatternRuleSet> for OrderedMap<Vec<String>> {
    fn from(rules: PatternRuleSet) -> Self {
        rules.snapshot()
    }
}
