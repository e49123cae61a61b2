//! Averaged perceptron BIO tagger.
//!
//! Tags each token with `O`, `B-TYPE` or `I-TYPE`, greedily left to right,
//! using the previous predicted tag as an extra feature. Training is online
//! and mistake-driven: a token's weights change only when the prediction is
//! wrong. Published weights are the average of the weights over every step of
//! the last training run, maintained lazily so each update costs O(1).
//!
//! Training is incremental. Weights continue from the previous run and the
//! tag set grows as new entity types appear in the training data.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::features::{extract_features, history_feature};
use super::tokenizer::{tokenize, Token};
use super::{RecognizedSpan, Recognizer};
use crate::error::TrainingError;
use crate::feedback::{Label, TrainingExample};
use crate::models::TrainingConfig;

const OUTSIDE: &str = "O";
const START: &str = "-START-";

/// Options for one training run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainOptions {
    /// Full passes over the examples.
    pub iterations: usize,
    /// Probability of dropping each active feature during an update.
    pub dropout: f64,
    /// Seed for the dropout RNG.
    pub seed: u64,
}

impl From<&TrainingConfig> for TrainOptions {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            iterations: config.iterations,
            dropout: config.dropout,
            seed: config.seed,
        }
    }
}

/// Summary of a completed training run.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingStats {
    /// Tokens seen per pass.
    pub tokens: usize,
    /// Wrong predictions in each pass.
    pub mistakes: Vec<usize>,
}

/// Averaged perceptron token tagger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerceptronTagger {
    /// Known tags. Index 0 is always `O`, so ties resolve to "no entity".
    tags: Vec<String>,
    /// Working weights: feature -> weight per tag index.
    weights: HashMap<String, Vec<f64>>,
    /// Averaged weights used for prediction.
    averaged: HashMap<String, Vec<f64>>,
}

impl PerceptronTagger {
    /// Create a blank, untrained tagger.
    pub fn new() -> Self {
        Self {
            tags: vec![OUTSIDE.to_string()],
            weights: HashMap::new(),
            averaged: HashMap::new(),
        }
    }

    /// Whether the tagger has been trained at least once.
    pub fn is_trained(&self) -> bool {
        !self.averaged.is_empty()
    }

    /// Entity types the tagger knows about, in order of first appearance.
    pub fn entity_types(&self) -> Vec<&str> {
        let mut types = Vec::new();
        for tag in &self.tags {
            if let Some(t) = tag.strip_prefix("B-") {
                types.push(t);
            }
        }
        types
    }

    fn ensure_tag(&mut self, tag: &str) -> usize {
        match self.tags.iter().position(|t| t == tag) {
            Some(idx) => idx,
            None => {
                self.tags.push(tag.to_string());
                self.tags.len() - 1
            }
        }
    }

    /// Train on `examples` for `options.iterations` passes.
    ///
    /// `cancelled` is polled before every pass. On cancellation the tagger
    /// may hold partially updated weights; callers train on a clone.
    pub fn train(
        &mut self,
        examples: &[TrainingExample],
        options: &TrainOptions,
        cancelled: impl Fn() -> bool,
    ) -> Result<TrainingStats, TrainingError> {
        let prepared: Vec<(Vec<Vec<String>>, Vec<usize>)> = examples
            .iter()
            .map(|ex| {
                let tokens = tokenize(&ex.text);
                let gold = gold_tags(&tokens, &ex.labels)
                    .iter()
                    .map(|t| self.ensure_tag(t))
                    .collect();
                (extract_features(&tokens), gold)
            })
            .collect();

        let tokens = prepared.iter().map(|(f, _)| f.len()).sum();
        let dropout = options.dropout.clamp(0.0, 1.0);
        let mut rng = StdRng::seed_from_u64(options.seed);
        let mut averager = Averager::default();
        let mut mistakes = Vec::with_capacity(options.iterations);

        for iteration in 0..options.iterations {
            if cancelled() {
                return Err(TrainingError::Cancelled {
                    completed: iteration,
                    requested: options.iterations,
                });
            }

            let mut wrong = 0;
            for (features, gold) in &prepared {
                let mut prev: Option<usize> = None;
                for (token_features, &gold_tag) in features.iter().zip(gold) {
                    let history = history_feature(self.tag_name(prev));
                    let active: Vec<&str> = token_features
                        .iter()
                        .map(String::as_str)
                        .chain(std::iter::once(history.as_str()))
                        .filter(|_| dropout == 0.0 || !rng.gen_bool(dropout))
                        .collect();

                    let predicted = self.best_tag(&self.weights, &active);
                    if predicted != gold_tag {
                        wrong += 1;
                        let n_tags = self.tags.len();
                        for feature in &active {
                            averager.update(&mut self.weights, n_tags, feature, gold_tag, 1.0);
                            averager.update(&mut self.weights, n_tags, feature, predicted, -1.0);
                        }
                    }
                    averager.step += 1;
                    prev = Some(predicted);
                }
            }

            debug!(iteration = iteration + 1, mistakes = wrong, tokens, "training pass");
            mistakes.push(wrong);
        }

        self.averaged = averager.finish(&self.weights);
        Ok(TrainingStats { tokens, mistakes })
    }

    /// Predict one tag per token.
    pub fn tag(&self, tokens: &[Token]) -> Vec<String> {
        let features = extract_features(tokens);
        let mut prev: Option<usize> = None;
        let mut tags = Vec::with_capacity(tokens.len());

        for token_features in &features {
            let history = history_feature(self.tag_name(prev));
            let active: Vec<&str> = token_features
                .iter()
                .map(String::as_str)
                .chain(std::iter::once(history.as_str()))
                .collect();
            let best = self.best_tag(&self.averaged, &active);
            tags.push(self.tags[best].clone());
            prev = Some(best);
        }

        tags
    }

    fn tag_name(&self, idx: Option<usize>) -> &str {
        idx.map_or(START, |i| self.tags[i].as_str())
    }

    fn best_tag(&self, table: &HashMap<String, Vec<f64>>, features: &[&str]) -> usize {
        let mut scores = vec![0.0; self.tags.len()];
        for feature in features {
            if let Some(weights) = table.get(*feature) {
                for (score, w) in scores.iter_mut().zip(weights) {
                    *score += w;
                }
            }
        }

        let mut best = 0;
        for (idx, score) in scores.iter().enumerate().skip(1) {
            if *score > scores[best] {
                best = idx;
            }
        }
        best
    }
}

impl Default for PerceptronTagger {
    fn default() -> Self {
        Self::new()
    }
}

impl Recognizer for PerceptronTagger {
    fn recognize(&self, text: &str) -> Vec<RecognizedSpan> {
        if !self.is_trained() {
            return Vec::new();
        }
        let tokens = tokenize(text);
        let tags = self.tag(&tokens);
        bio_to_spans(text, &tokens, &tags)
    }
}

/// Lazy weight averaging over one training run.
#[derive(Default)]
struct Averager {
    totals: HashMap<String, Vec<f64>>,
    stamps: HashMap<String, Vec<u64>>,
    step: u64,
}

impl Averager {
    fn update(
        &mut self,
        weights: &mut HashMap<String, Vec<f64>>,
        n_tags: usize,
        feature: &str,
        tag: usize,
        delta: f64,
    ) {
        let w = weights.entry(feature.to_string()).or_default();
        let totals = self.totals.entry(feature.to_string()).or_default();
        let stamps = self.stamps.entry(feature.to_string()).or_default();
        w.resize(n_tags.max(w.len()), 0.0);
        totals.resize(w.len(), 0.0);
        stamps.resize(w.len(), 0);

        totals[tag] += (self.step - stamps[tag]) as f64 * w[tag];
        stamps[tag] = self.step;
        w[tag] += delta;
    }

    fn finish(self, weights: &HashMap<String, Vec<f64>>) -> HashMap<String, Vec<f64>> {
        if self.step == 0 {
            return weights.clone();
        }
        let steps = self.step as f64;

        weights
            .iter()
            .map(|(feature, w)| {
                let totals = self.totals.get(feature);
                let stamps = self.stamps.get(feature);
                let averaged = w
                    .iter()
                    .enumerate()
                    .map(|(tag, &weight)| {
                        let total = totals.and_then(|t| t.get(tag)).copied().unwrap_or(0.0);
                        let stamp = stamps.and_then(|s| s.get(tag)).copied().unwrap_or(0);
                        (total + (self.step - stamp) as f64 * weight) / steps
                    })
                    .collect();
                (feature.clone(), averaged)
            })
            .collect()
    }
}

/// Gold BIO tags for `tokens` given byte-offset labels.
///
/// Tokens lying fully inside a label get `B-TYPE` (first) or `I-TYPE`.
/// Tokens already claimed by an earlier label keep their tag.
fn gold_tags(tokens: &[Token], labels: &[Label]) -> Vec<String> {
    let mut tags = vec![OUTSIDE.to_string(); tokens.len()];

    for label in labels {
        let inside: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| t.start >= label.start && t.end <= label.end)
            .map(|(i, _)| i)
            .collect();
        if inside.iter().any(|&i| tags[i] != OUTSIDE) {
            continue;
        }
        for (n, &i) in inside.iter().enumerate() {
            let prefix = if n == 0 { "B" } else { "I" };
            tags[i] = format!("{prefix}-{}", label.entity_type);
        }
    }

    tags
}

/// Reassemble BIO tags into spans over the original text.
fn bio_to_spans(text: &str, tokens: &[Token], tags: &[String]) -> Vec<RecognizedSpan> {
    let mut spans = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        let Some(label) = tags[i].strip_prefix("B-") else {
            i += 1;
            continue;
        };

        let start = tokens[i].start;
        let mut end = tokens[i].end;
        let mut j = i + 1;
        while j < tokens.len() && tags[j].strip_prefix("I-") == Some(label) {
            end = tokens[j].end;
            j += 1;
        }

        spans.push(RecognizedSpan {
            label: label.to_string(),
            start,
            end,
            text: text[start..end].to_string(),
            confidence: None,
        });
        i = j;
    }

    spans
}
