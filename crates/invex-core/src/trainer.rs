//! Training run types: cancellation and outcome reporting.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Cooperative cancellation for a training run, checked between passes.
pub use tokio_util::sync::CancellationToken;

/// Whether a training run produced a new model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrainStatus {
    Success,
    /// The pending buffer was empty.
    NoData,
}

/// Result of a training run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainOutcome {
    pub status: TrainStatus,
    /// Model version after the run.
    pub model_version: u64,
    /// Where the new snapshot was written.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_path: Option<PathBuf>,
}

impl TrainOutcome {
    pub fn no_data(model_version: u64) -> Self {
        Self {
            status: TrainStatus::NoData,
            model_version,
            model_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_json() {
        let json = serde_json::to_value(TrainOutcome::no_data(3)).unwrap();
        assert_eq!(json, serde_json::json!({"status": "no_data", "model_version": 3}));

        let json = serde_json::to_value(TrainOutcome {
            status: TrainStatus::Success,
            model_version: 4,
            model_path: Some(PathBuf::from("models/invoice_model_v4")),
        })
        .unwrap();
        assert_eq!(json["status"], "success");
        assert_eq!(json["model_path"], "models/invoice_model_v4");
    }
}
