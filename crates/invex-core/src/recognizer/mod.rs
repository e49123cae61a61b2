//! Learned entity recognizer.

pub mod features;
pub mod perceptron;
pub mod tokenizer;

pub use perceptron::{PerceptronTagger, TrainOptions, TrainingStats};
pub use tokenizer::{tokenize, Token};

/// A span detected by a learned recognizer.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedSpan {
    /// Entity type label as produced by the model (e.g. `DATE`).
    pub label: String,
    /// Start byte offset in the input text.
    pub start: usize,
    /// End byte offset in the input text (exclusive).
    pub end: usize,
    /// Covered text.
    pub text: String,
    /// Model-reported confidence, if the model produces one.
    pub confidence: Option<f32>,
}

/// Trait for learned sequence-labeling recognizers.
pub trait Recognizer: Send + Sync {
    /// Detect spans in `text`, in text order.
    fn recognize(&self, text: &str) -> Vec<RecognizedSpan>;
}
