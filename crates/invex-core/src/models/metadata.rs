//! Sidecar metadata persisted next to each model snapshot.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::rules::PatternRuleSet;

/// Metadata describing one persisted model version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model version, starting at 1 for an untrained engine.
    pub model_version: u64,

    /// When the model was last trained.
    pub last_trained: DateTime<Utc>,

    /// Active pattern rules. Absent in older snapshots.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patterns: Option<PatternRuleSet>,

    /// Pending feedback samples at save time.
    #[serde(default)]
    pub training_data_count: usize,

    /// Id shared with the model file written in the same save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_id: Option<u64>,
}

/// Model statistics reported alongside extraction results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelStats {
    pub model_version: u64,
    pub last_trained: DateTime<Utc>,
}
