//! Conversion of user corrections into labeled training examples.

use serde::{Deserialize, Serialize};

use crate::models::AnnotationMap;

/// A labeled byte range in a training text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub start: usize,
    pub end: usize,
    /// Upper-cased entity type.
    pub entity_type: String,
}

impl Label {
    pub fn new(start: usize, end: usize, entity_type: impl Into<String>) -> Self {
        Self {
            start,
            end,
            entity_type: entity_type.into(),
        }
    }
}

/// A text together with the labels derived from one correction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingExample {
    pub text: String,
    pub labels: Vec<Label>,
}

/// Outcome of locating one corrected value in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelLookup {
    /// The value occurs in the text; the label covers its first occurrence.
    Located(Label),
    /// The value does not occur verbatim. The field is skipped.
    NotFound { entity_type: String, value: String },
}

/// Locate `value` in `text` by first-occurrence substring search.
pub fn locate(text: &str, entity_type: &str, value: &str) -> LabelLookup {
    let entity_type = entity_type.to_uppercase();
    match text.find(value) {
        Some(start) => LabelLookup::Located(Label::new(start, start + value.len(), entity_type)),
        None => LabelLookup::NotFound {
            entity_type,
            value: value.to_string(),
        },
    }
}

/// Labels built from a correction, plus the fields that could not be located.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LabeledCorrection {
    /// The example to buffer, if at least one label was produced.
    pub example: Option<TrainingExample>,
    /// Entity types whose corrected value was not found in the text.
    pub skipped: Vec<String>,
}

/// Build a training example from a corrected entity map.
///
/// Empty or absent values are ignored. For lists, only the first element is
/// labeled.
pub fn label_correction(text: &str, corrected: &AnnotationMap) -> LabeledCorrection {
    let mut labels = Vec::new();
    let mut skipped = Vec::new();

    for (entity_type, value) in corrected.iter() {
        let Some(value) = value.first_text() else {
            continue;
        };
        match locate(text, entity_type, value) {
            LabelLookup::Located(label) => labels.push(label),
            LabelLookup::NotFound { entity_type, .. } => skipped.push(entity_type),
        }
    }

    LabeledCorrection {
        example: (!labels.is_empty()).then(|| TrainingExample {
            text: text.to_string(),
            labels,
        }),
        skipped,
    }
}

/// Result of recording one correction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackOutcome {
    /// Whether any label was recorded.
    pub recorded: bool,
    /// Buffered examples after this call (0 if training ran).
    pub pending_samples: usize,
    /// Current model version (incremented if training ran).
    pub model_version: u64,
    /// Entity types whose corrected value was not found in the text.
    #[serde(default, skip_serializing)]
    pub skipped: Vec<String>,
}
