//! Core library for adaptive invoice entity extraction.
//!
//! This crate provides:
//! - A learned entity recognizer (averaged perceptron BIO tagger)
//! - Regex pattern rules used as a fallback for missing entity types
//! - Feedback accumulation and threshold-triggered incremental retraining
//! - Fuzzy evaluation (precision, recall, F1) against labeled test sets
//! - Versioned model snapshots with sidecar metadata

pub mod engine;
pub mod error;
pub mod evaluation;
pub mod extraction;
pub mod feedback;
pub mod models;
pub mod persistence;
pub mod recognizer;
pub mod rules;
pub mod trainer;

pub use engine::{AdaptiveEngine, LoadOutcome, SaveOutcome, SharedEngine};
pub use error::{InvexError, Result};
pub use evaluation::{EvaluationReport, Evaluator, TestItem};
pub use feedback::{FeedbackOutcome, Label, TrainingExample};
pub use models::{
    AnnotatedValue, AnnotationMap, EngineConfig, EntityMap, EntitySpan, ModelMetadata, ModelStats,
    SpanSource,
};
pub use persistence::ModelStore;
pub use recognizer::{PerceptronTagger, Recognizer};
pub use rules::PatternRuleSet;
pub use trainer::{CancellationToken, TrainOutcome, TrainStatus};
