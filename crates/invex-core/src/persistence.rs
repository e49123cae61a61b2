//! Versioned model snapshots on disk.
//!
//! Layout under the models directory:
//!
//! ```text
//! models/
//!   invoice_model_v1/model.json        recognizer state
//!   invoice_model_v1_metadata.json     sidecar metadata
//!   invoice_model_v2/model.json
//!   invoice_model_v2_metadata.json
//!   pending_feedback.json              buffered training examples
//! ```
//!
//! Every file is written to a temporary file in the target directory and
//! renamed into place. The model is written before its metadata, both carry
//! the same snapshot id, and a load requires both with matching ids, so a
//! half-written or half-overwritten snapshot is never loaded.

use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::error::PersistenceError;
use crate::feedback::TrainingExample;
use crate::models::ModelMetadata;
use crate::recognizer::PerceptronTagger;

/// Directory name prefix of a model version.
pub const MODEL_PREFIX: &str = "invoice_model_v";

const MODEL_FILE: &str = "model.json";
const METADATA_SUFFIX: &str = "_metadata.json";
const PENDING_FILE: &str = "pending_feedback.json";

lazy_static! {
    static ref VERSION_DIR: Regex = Regex::new(r"^invoice_model_v(\d+)$").unwrap();
}

/// Path of the sidecar metadata for the snapshot at `path`.
pub fn metadata_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(METADATA_SUFFIX);
    PathBuf::from(name)
}

/// Recognizer state as stored in `model.json`.
#[derive(Serialize)]
struct StoredModelRef<'a> {
    snapshot_id: u64,
    recognizer: &'a PerceptronTagger,
}

#[derive(Deserialize)]
struct StoredModel {
    #[serde(default)]
    snapshot_id: Option<u64>,
    recognizer: PerceptronTagger,
}

/// Write a recognizer and its metadata as one snapshot at `path`.
///
/// Both files carry a fresh snapshot id. When an existing snapshot is
/// overwritten, a reader between the two writes sees ids that differ and
/// [`load_snapshot`] rejects the pair.
pub fn save_snapshot(
    path: &Path,
    recognizer: &PerceptronTagger,
    metadata: &ModelMetadata,
) -> Result<(), PersistenceError> {
    let snapshot_id: u64 = rand::random();

    let model_file = path.join(MODEL_FILE);
    let stored = StoredModelRef {
        snapshot_id,
        recognizer,
    };
    let model = serde_json::to_vec(&stored).map_err(|e| write_error(&model_file, e))?;
    write_atomic(&model_file, &model)?;

    let meta_file = metadata_path(path);
    let metadata = ModelMetadata {
        snapshot_id: Some(snapshot_id),
        ..metadata.clone()
    };
    let meta = serde_json::to_vec_pretty(&metadata).map_err(|e| write_error(&meta_file, e))?;
    write_atomic(&meta_file, &meta)?;

    info!(
        version = metadata.model_version,
        "saved model snapshot to {}",
        path.display()
    );
    Ok(())
}

/// Read the snapshot at `path`.
pub fn load_snapshot(path: &Path) -> Result<(PerceptronTagger, ModelMetadata), PersistenceError> {
    let model_file = path.join(MODEL_FILE);
    let stored: StoredModel = read_json(&model_file)
        .map_err(|e| e.not_found_as(PersistenceError::ModelNotFound(path.to_path_buf())))?
        .map_err(|reason| PersistenceError::MalformedModel {
            path: model_file.clone(),
            reason,
        })?;

    let meta_file = metadata_path(path);
    let metadata: ModelMetadata = read_json(&meta_file)
        .map_err(|e| e.not_found_as(PersistenceError::MetadataNotFound(meta_file.clone())))?
        .map_err(|reason| PersistenceError::MalformedMetadata {
            path: meta_file.clone(),
            reason,
        })?;

    if stored.snapshot_id != metadata.snapshot_id {
        return Err(PersistenceError::SnapshotMismatch {
            path: path.to_path_buf(),
        });
    }

    debug!(version = metadata.model_version, "read model snapshot from {}", path.display());
    Ok((stored.recognizer, metadata))
}

/// Delete the snapshot at `path`, metadata first. Failures are logged.
pub fn remove_snapshot(path: &Path) {
    let meta_file = metadata_path(path);
    if let Err(e) = std::fs::remove_file(&meta_file) {
        if e.kind() != ErrorKind::NotFound {
            warn!("failed to remove {}: {}", meta_file.display(), e);
        }
    }
    if let Err(e) = std::fs::remove_dir_all(path) {
        if e.kind() != ErrorKind::NotFound {
            warn!("failed to remove {}: {}", path.display(), e);
        }
    }
}

/// Versioned snapshots and the pending feedback buffer under one directory.
#[derive(Debug, Clone)]
pub struct ModelStore {
    root: PathBuf,
}

impl ModelStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Snapshot path for `version`.
    pub fn version_path(&self, version: u64) -> PathBuf {
        self.root.join(format!("{MODEL_PREFIX}{version}"))
    }

    /// Every version directory, oldest first.
    pub fn list_versions(&self) -> Result<Vec<(u64, PathBuf)>, PersistenceError> {
        let entries = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(PersistenceError::Read {
                    path: self.root.clone(),
                    source,
                });
            }
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| PersistenceError::Read {
                path: self.root.clone(),
                source,
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            let name = entry.file_name();
            let Some(caps) = name.to_str().and_then(|n| VERSION_DIR.captures(n)) else {
                continue;
            };
            if let Ok(version) = caps[1].parse::<u64>() {
                versions.push((version, entry.path()));
            }
        }

        versions.sort_by_key(|(v, _)| *v);
        Ok(versions)
    }

    /// The version directory with the largest version number, if any.
    pub fn discover_latest(&self) -> Result<Option<(u64, PathBuf)>, PersistenceError> {
        Ok(self.list_versions()?.pop())
    }

    fn pending_path(&self) -> PathBuf {
        self.root.join(PENDING_FILE)
    }

    /// Buffered training examples, empty if none were saved.
    pub fn load_pending(&self) -> Result<Vec<TrainingExample>, PersistenceError> {
        let path = self.pending_path();
        match read_json(&path) {
            Ok(parsed) => parsed.map_err(|reason| PersistenceError::MalformedMetadata { path, reason }),
            Err(ReadFailure::NotFound) => Ok(Vec::new()),
            Err(ReadFailure::Io(source)) => Err(PersistenceError::Read { path, source }),
        }
    }

    /// Replace the buffered training examples.
    pub fn save_pending(&self, pending: &[TrainingExample]) -> Result<(), PersistenceError> {
        let path = self.pending_path();
        let data = serde_json::to_vec_pretty(pending).map_err(|e| write_error(&path, e))?;
        write_atomic(&path, &data)
    }
}

enum ReadFailure {
    NotFound,
    Io(std::io::Error),
}

impl ReadFailure {
    fn not_found_as(self, missing: PersistenceError) -> PersistenceError {
        match self {
            ReadFailure::NotFound => missing,
            ReadFailure::Io(source) => match missing {
                PersistenceError::ModelNotFound(path) | PersistenceError::MetadataNotFound(path) => {
                    PersistenceError::Read { path, source }
                }
                other => other,
            },
        }
    }
}

/// Read and decode a JSON file. The outer error is the read, the inner the decode.
fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Result<T, String>, ReadFailure> {
    let data = std::fs::read(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => ReadFailure::NotFound,
        _ => ReadFailure::Io(e),
    })?;
    Ok(serde_json::from_slice(&data).map_err(|e| e.to_string()))
}

fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), PersistenceError> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    std::fs::create_dir_all(dir).map_err(err)?;
    let mut file = NamedTempFile::new_in(dir).map_err(err)?;
    file.write_all(contents).map_err(err)?;
    file.as_file().sync_all().map_err(err)?;
    file.persist(path).map_err(|e| err(e.error))?;
    Ok(())
}

fn write_error(path: &Path, e: serde_json::Error) -> PersistenceError {
    PersistenceError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feedback::Label;
    use crate::rules::PatternRuleSet;
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn metadata(version: u64) -> ModelMetadata {
        ModelMetadata {
            model_version: version,
            last_trained: Utc::now(),
            patterns: Some(PatternRuleSet::default()),
            training_data_count: 2,
            snapshot_id: None,
        }
    }

    #[test]
    fn test_metadata_path_is_sibling() {
        assert_eq!(
            metadata_path(Path::new("models/invoice_model_v3")),
            PathBuf::from("models/invoice_model_v3_metadata.json")
        );
    }

    #[test]
    fn test_snapshot_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_model_v4");
        let meta = metadata(4);

        save_snapshot(&path, &PerceptronTagger::new(), &meta).unwrap();
        let (tagger, loaded) = load_snapshot(&path).unwrap();

        assert!(loaded.snapshot_id.is_some());
        assert_eq!(
            loaded,
            ModelMetadata {
                snapshot_id: loaded.snapshot_id,
                ..meta
            }
        );
        assert_eq!(tagger, PerceptronTagger::new());
    }

    #[test]
    fn test_overwrite_mixing_two_saves_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_model_v2");

        save_snapshot(&path, &PerceptronTagger::new(), &metadata(2)).unwrap();
        let first_metadata = std::fs::read(metadata_path(&path)).unwrap();

        // Second save of the same path, interrupted after the model write.
        save_snapshot(&path, &PerceptronTagger::new(), &metadata(2)).unwrap();
        std::fs::write(metadata_path(&path), first_metadata).unwrap();

        assert!(matches!(
            load_snapshot(&path),
            Err(PersistenceError::SnapshotMismatch { .. })
        ));
    }

    #[test]
    fn test_remove_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_model_v5");
        save_snapshot(&path, &PerceptronTagger::new(), &metadata(5)).unwrap();

        remove_snapshot(&path);

        assert!(!path.exists());
        assert!(!metadata_path(&path).exists());
        assert!(ModelStore::new(dir.path()).list_versions().unwrap().is_empty());
    }

    #[test]
    fn test_metadata_file_format() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_model_v1");
        save_snapshot(&path, &PerceptronTagger::new(), &metadata(1)).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(metadata_path(&path)).unwrap()).unwrap();
        assert_eq!(raw["model_version"], 1);
        assert_eq!(raw["training_data_count"], 2);
        assert!(raw["last_trained"].is_string());
        assert!(raw["patterns"]["DATE"].is_array());
    }

    #[test]
    fn test_missing_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_model_v1");
        save_snapshot(&path, &PerceptronTagger::new(), &metadata(1)).unwrap();
        std::fs::remove_file(metadata_path(&path)).unwrap();

        assert!(matches!(
            load_snapshot(&path),
            Err(PersistenceError::MetadataNotFound(_))
        ));
    }

    #[test]
    fn test_missing_model() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            load_snapshot(&dir.path().join("invoice_model_v9")),
            Err(PersistenceError::ModelNotFound(_))
        ));
    }

    #[test]
    fn test_malformed_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("invoice_model_v1");
        save_snapshot(&path, &PerceptronTagger::new(), &metadata(1)).unwrap();
        std::fs::write(metadata_path(&path), "{\"model_version\": \"one\"}").unwrap();

        assert!(matches!(
            load_snapshot(&path),
            Err(PersistenceError::MalformedMetadata { .. })
        ));
    }

    #[test]
    fn test_discover_latest_by_number() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["invoice_model_v2", "invoice_model_v10", "invoice_model_v9", "invoice_model_vx", "other"] {
            std::fs::create_dir(dir.path().join(name)).unwrap();
        }
        std::fs::write(dir.path().join("invoice_model_v99_metadata.json"), "{}").unwrap();

        let store = ModelStore::new(dir.path());
        let (version, path) = store.discover_latest().unwrap().unwrap();
        assert_eq!(version, 10);
        assert_eq!(path, dir.path().join("invoice_model_v10"));

        let versions: Vec<u64> = store.list_versions().unwrap().into_iter().map(|(v, _)| v).collect();
        assert_eq!(versions, vec![2, 9, 10]);
    }

    #[test]
    fn test_discover_in_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path().join("absent"));
        assert_eq!(store.discover_latest().unwrap(), None);
    }

    #[test]
    fn test_pending_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = ModelStore::new(dir.path());
        assert!(store.load_pending().unwrap().is_empty());

        let pending = vec![TrainingExample {
            text: "Date: 15/04/2023".to_string(),
            labels: vec![Label::new(6, 16, "DATE")],
        }];
        store.save_pending(&pending).unwrap();
        assert_eq!(store.load_pending().unwrap(), pending);
    }
}
