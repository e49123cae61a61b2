//! Offline evaluation of extraction quality against a labeled test set.
//!
//! Matching is per occurrence, not a bipartite assignment: one extracted
//! value may count as a true positive against several expected values, and an
//! expected value is a false negative only if no extracted value resembles it.

pub mod fuzzy;

use serde::{Deserialize, Serialize};

use crate::error::EvaluationError;
use crate::models::{AnnotationMap, EntityMap};

pub use fuzzy::{longest_common_substring, similar, DEFAULT_THRESHOLD};

/// One labeled test document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestItem {
    pub text: String,
    /// Expected values per entity type.
    pub entities: AnnotationMap,
}

/// Precision, recall and F1 over a test set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
}

impl EvaluationReport {
    fn from_counts(tp: usize, fp: usize, fn_: usize) -> Self {
        let ratio = |num: usize, denom: usize| {
            if denom > 0 {
                num as f64 / denom as f64
            } else {
                0.0
            }
        };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1_score = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1_score,
            true_positives: tp,
            false_positives: fp,
            false_negatives: fn_,
        }
    }
}

/// Scores an extractor against expected entities.
#[derive(Debug, Clone, Copy)]
pub struct Evaluator {
    threshold: f64,
}

impl Evaluator {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    /// Run `extract` over every item and score the result.
    ///
    /// Only entity types present in an item's expected map are scored.
    pub fn evaluate<F>(
        &self,
        items: &[TestItem],
        extract: F,
    ) -> Result<EvaluationReport, EvaluationError>
    where
        F: Fn(&str) -> EntityMap,
    {
        if items.is_empty() {
            return Err(EvaluationError::EmptyTestSet);
        }

        let (mut tp, mut fp, mut fn_) = (0, 0, 0);
        for item in items {
            let extracted = extract(&item.text);

            for (entity_type, expected) in item.entities.iter() {
                let expected = expected.texts();
                let found = extracted.values(entity_type);

                for value in &found {
                    if expected.iter().any(|e| similar(value, e, self.threshold)) {
                        tp += 1;
                    } else {
                        fp += 1;
                    }
                }
                for value in &expected {
                    if !found.iter().any(|f| similar(value, f, self.threshold)) {
                        fn_ += 1;
                    }
                }
            }
        }

        Ok(EvaluationReport::from_counts(tp, fp, fn_))
    }
}

impl Default for Evaluator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AnnotatedValue, EntitySpan, SpanSource};
    use pretty_assertions::assert_eq;

    fn item(text: &str, expected: &[(&str, AnnotatedValue)]) -> TestItem {
        TestItem {
            text: text.to_string(),
            entities: expected.iter().cloned().collect(),
        }
    }

    fn extractor(found: Vec<(&str, Vec<&str>)>) -> impl Fn(&str) -> EntityMap {
        let map: EntityMap = found
            .into_iter()
            .map(|(k, values)| {
                let spans = values
                    .into_iter()
                    .map(|v| EntitySpan::new(v, 0.7, SpanSource::Rule))
                    .collect::<Vec<_>>();
                (k, spans)
            })
            .collect();
        move |_: &str| map.clone()
    }

    #[test]
    fn test_perfect_match() {
        let items = vec![item(
            "Date: 15/04/2023",
            &[("date", serde_json::from_str(r#"["15/04/2023"]"#).unwrap())],
        )];
        let report = Evaluator::default()
            .evaluate(&items, extractor(vec![("date", vec!["15/04/2023"])]))
            .unwrap();

        assert_eq!(
            report,
            EvaluationReport {
                precision: 1.0,
                recall: 1.0,
                f1_score: 1.0,
                true_positives: 1,
                false_positives: 0,
                false_negatives: 0,
            }
        );
    }

    #[test]
    fn test_empty_test_set() {
        let result = Evaluator::default().evaluate(&[], extractor(vec![]));
        assert!(matches!(result, Err(EvaluationError::EmptyTestSet)));
    }

    #[test]
    fn test_misses_and_false_positives() {
        let items = vec![item(
            "...",
            &[
                ("date", AnnotatedValue::from("15/04/2023")),
                ("montant_ttc", AnnotatedValue::from("4800,00 €")),
            ],
        )];
        // date wrong, montant_ttc missing, extra type not scored
        let report = Evaluator::default()
            .evaluate(
                &items,
                extractor(vec![("date", vec!["01/01/1999"]), ("phone", vec!["01 23 45 67 89"])]),
            )
            .unwrap();

        assert_eq!(report.true_positives, 0);
        assert_eq!(report.false_positives, 1);
        assert_eq!(report.false_negatives, 2);
        assert_eq!(report.precision, 0.0);
        assert_eq!(report.recall, 0.0);
        assert_eq!(report.f1_score, 0.0);
    }

    #[test]
    fn test_per_occurrence_counting() {
        // Both extracted values resemble the single expected value.
        let items = vec![item("...", &[("montant_ht", AnnotatedValue::from("4000,00 €"))])];
        let report = Evaluator::default()
            .evaluate(&items, extractor(vec![("montant_ht", vec!["4000,00 €", "4000,00"])]))
            .unwrap();

        assert_eq!(report.true_positives, 2);
        assert_eq!(report.false_positives, 0);
        assert_eq!(report.false_negatives, 0);
    }

    #[test]
    fn test_partial_scores() {
        let items = vec![item(
            "...",
            &[
                ("date", AnnotatedValue::from("15/04/2023")),
                ("tva", AnnotatedValue::from("800,00 €")),
            ],
        )];
        let report = Evaluator::default()
            .evaluate(
                &items,
                extractor(vec![("date", vec!["15/04/2023"]), ("tva", vec!["20%"])]),
            )
            .unwrap();

        assert_eq!(
            (report.true_positives, report.false_positives, report.false_negatives),
            (1, 1, 1)
        );
        assert_eq!(report.precision, 0.5);
        assert_eq!(report.recall, 0.5);
        assert_eq!(report.f1_score, 0.5);
    }
}
