//! Configuration structures for the adaptive extraction engine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{InvexError, Result};

/// Main configuration for the invex engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Directory holding versioned model snapshots.
    pub models_dir: PathBuf,

    /// Pending feedback samples that trigger a retraining run.
    pub retrain_threshold: usize,

    /// Recognizer training configuration.
    pub training: TrainingConfig,

    /// Entity extraction configuration.
    pub extraction: ExtractionConfig,

    /// Evaluation configuration.
    pub evaluation: EvaluationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            retrain_threshold: 10,
            training: TrainingConfig::default(),
            extraction: ExtractionConfig::default(),
            evaluation: EvaluationConfig::default(),
        }
    }
}

/// Recognizer training configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Full passes over the pending buffer per training run.
    pub iterations: usize,

    /// Probability of dropping each active feature during an update (0.0 - 1.0).
    pub dropout: f64,

    /// Seed for the dropout RNG.
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            iterations: 30,
            dropout: 0.5,
            seed: 0,
        }
    }
}

/// Entity extraction configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Confidence given to learned spans when the model reports none.
    pub learned_confidence: f32,

    /// Confidence given to rule spans.
    pub rule_confidence: f32,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            learned_confidence: 0.85,
            rule_confidence: 0.7,
        }
    }
}

/// Evaluation configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationConfig {
    /// Minimum fuzzy similarity for two values to count as a match.
    pub similarity_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.7,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.retrain_threshold == 0 {
            return Err(InvexError::Config("retrain_threshold must be at least 1".into()));
        }
        if !(0.0..1.0).contains(&self.training.dropout) {
            return Err(InvexError::Config(format!(
                "training.dropout must be in [0, 1), got {}",
                self.training.dropout
            )));
        }
        if !(0.0..=1.0).contains(&self.evaluation.similarity_threshold) {
            return Err(InvexError::Config(format!(
                "evaluation.similarity_threshold must be in [0, 1], got {}",
                self.evaluation.similarity_threshold
            )));
        }
        Ok(())
    }
}
