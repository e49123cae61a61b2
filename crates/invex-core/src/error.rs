//! Error types for the invex-core library.

use std::path::PathBuf;

use thiserror::Error;

/// Main error type for the invex library.
#[derive(Error, Debug)]
pub enum InvexError {
    /// Model persistence error.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Training error.
    #[error("training error: {0}")]
    Training(#[from] TrainingError),

    /// Evaluation error.
    #[error("evaluation error: {0}")]
    Evaluation(#[from] EvaluationError),

    /// Pattern rule error.
    #[error("rule error: {0}")]
    Rule(#[from] RuleError),

    /// JSON (de)serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors related to saving and loading model snapshots.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// No recognizer state at the given path.
    #[error("model not found at {0}")]
    ModelNotFound(PathBuf),

    /// The sidecar metadata file is missing.
    #[error("metadata not found at {0}")]
    MetadataNotFound(PathBuf),

    /// The recognizer state could not be decoded.
    #[error("malformed model state in {path}: {reason}")]
    MalformedModel { path: PathBuf, reason: String },

    /// The metadata could not be decoded.
    #[error("malformed metadata in {path}: {reason}")]
    MalformedMetadata { path: PathBuf, reason: String },

    /// Model and metadata come from different saves.
    #[error("model and metadata at {path} belong to different saves")]
    SnapshotMismatch { path: PathBuf },

    /// Writing a snapshot file failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Reading a snapshot file failed.
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors raised by a training run.
#[derive(Error, Debug)]
pub enum TrainingError {
    /// The run was cancelled before completion.
    #[error("training cancelled after {completed} of {requested} iterations")]
    Cancelled { completed: usize, requested: usize },
}

/// Errors raised by the evaluator.
#[derive(Error, Debug)]
pub enum EvaluationError {
    /// The test set contained no items.
    #[error("No test data provided")]
    EmptyTestSet,
}

/// Errors related to pattern rules.
#[derive(Error, Debug)]
pub enum RuleError {
    /// A pattern failed to compile.
    #[error("invalid pattern for {entity_type}: {source}")]
    InvalidPattern {
        entity_type: String,
        #[source]
        source: regex::Error,
    },
}

/// Result type for the invex library.
pub type Result<T> = std::result::Result<T, InvexError>;
