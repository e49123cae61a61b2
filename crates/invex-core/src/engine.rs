//! The adaptive extraction engine.
//!
//! [`AdaptiveEngine`] owns the recognizer, the pattern rules, the model
//! version and the pending feedback buffer. Read-only operations take
//! `&self`, everything that mutates takes `&mut self`. [`SharedEngine`]
//! serializes access for callers sharing one engine across threads.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::evaluation::{EvaluationReport, Evaluator, TestItem};
use crate::extraction;
use crate::feedback::{FeedbackOutcome, TrainingExample, label_correction};
use crate::models::{AnnotationMap, EngineConfig, EntityMap, ModelMetadata, ModelStats};
use crate::persistence::{self, ModelStore};
use crate::recognizer::{PerceptronTagger, TrainOptions};
use crate::rules::PatternRuleSet;
use crate::trainer::{CancellationToken, TrainOutcome, TrainStatus};

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaveOutcome {
    pub path: PathBuf,
    pub model_version: u64,
}

/// Result of a successful load.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadOutcome {
    pub path: PathBuf,
    pub model_version: u64,
}

/// Learned recognizer plus rule fallback, improved from user corrections.
#[derive(Debug)]
pub struct AdaptiveEngine {
    config: EngineConfig,
    recognizer: PerceptronTagger,
    rules: PatternRuleSet,
    model_version: u64,
    last_trained: DateTime<Utc>,
    pending: Vec<TrainingExample>,
    store: ModelStore,
}

impl AdaptiveEngine {
    /// Create an untrained engine at version 1 with the default rules.
    pub fn new(config: EngineConfig) -> Self {
        let store = ModelStore::new(&config.models_dir);
        Self {
            config,
            recognizer: PerceptronTagger::new(),
            rules: PatternRuleSet::default(),
            model_version: 1,
            last_trained: Utc::now(),
            pending: Vec::new(),
            store,
        }
    }

    /// Create an engine from the newest loadable model in `config.models_dir`.
    ///
    /// Versions that fail to load are logged and skipped in favor of the next
    /// older one; with none loadable the engine starts untrained. The pending
    /// buffer saved by earlier runs is restored.
    pub fn open(config: EngineConfig) -> Result<Self> {
        let mut engine = Self::new(config);

        match engine.store.list_versions() {
            Ok(versions) => {
                let mut loaded = false;
                for (version, path) in versions.iter().rev() {
                    match engine.load(path) {
                        Ok(_) => {
                            loaded = true;
                            break;
                        }
                        Err(e) => warn!(version, "skipping unloadable model: {}", e),
                    }
                }
                if !loaded {
                    info!(
                        "no loadable model in {}, starting untrained",
                        engine.store.root().display()
                    );
                }
            }
            Err(e) => warn!("model discovery failed, starting untrained: {}", e),
        }

        engine.pending = engine.store.load_pending()?;
        Ok(engine)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn model_version(&self) -> u64 {
        self.model_version
    }

    pub fn last_trained(&self) -> DateTime<Utc> {
        self.last_trained
    }

    pub fn rules(&self) -> &PatternRuleSet {
        &self.rules
    }

    pub fn recognizer(&self) -> &PerceptronTagger {
        &self.recognizer
    }

    pub fn pending(&self) -> &[TrainingExample] {
        &self.pending
    }

    pub fn stats(&self) -> ModelStats {
        ModelStats {
            model_version: self.model_version,
            last_trained: self.last_trained,
        }
    }

    /// Extract entities from `text`.
    pub fn extract(&self, text: &str) -> EntityMap {
        extraction::extract(text, &self.recognizer, &self.rules, &self.config.extraction)
    }

    /// Record a user correction.
    ///
    /// Retrains before returning once the pending buffer reaches the
    /// configured threshold, so this call may block for a full training run.
    pub fn record(
        &mut self,
        text: &str,
        original: &AnnotationMap,
        corrected: &AnnotationMap,
    ) -> Result<FeedbackOutcome> {
        let changed: Vec<&str> = corrected
            .iter()
            .filter(|(key, value)| original.get(key).map(|o| o.texts()) != Some(value.texts()))
            .map(|(key, _)| key)
            .collect();
        debug!(?changed, "recording correction");

        let labeled = label_correction(text, corrected);
        if !labeled.skipped.is_empty() {
            debug!(skipped = ?labeled.skipped, "corrected values not found in text");
        }

        let recorded = labeled.example.is_some();
        if let Some(example) = labeled.example {
            self.pending.push(example);
            self.store.save_pending(&self.pending)?;
        }

        if self.pending.len() >= self.config.retrain_threshold {
            info!(
                pending = self.pending.len(),
                threshold = self.config.retrain_threshold,
                "retrain threshold reached"
            );
            self.train()?;
        }

        Ok(FeedbackOutcome {
            recorded,
            pending_samples: self.pending.len(),
            model_version: self.model_version,
            skipped: labeled.skipped,
        })
    }

    /// Train on the pending buffer with the configured iteration count.
    pub fn train(&mut self) -> Result<TrainOutcome> {
        let iterations = self.config.training.iterations;
        self.train_with(iterations, &CancellationToken::new())
    }

    /// Train on the pending buffer for `iterations` passes.
    ///
    /// Training runs on a copy of the recognizer. The copy is swapped in,
    /// the version advanced and the buffer cleared only after the new
    /// snapshot and the emptied pending file are on disk. A cancelled or
    /// failed run changes nothing.
    ///
    /// The new version is one past both the current version and every
    /// version directory on disk, so no snapshot is ever overwritten.
    pub fn train_with(
        &mut self,
        iterations: usize,
        cancel: &CancellationToken,
    ) -> Result<TrainOutcome> {
        if self.pending.is_empty() {
            info!("no pending feedback, skipping training");
            return Ok(TrainOutcome::no_data(self.model_version));
        }

        let on_disk = self.store.discover_latest()?.map_or(0, |(v, _)| v);
        let version = self.model_version.max(on_disk) + 1;
        info!(
            samples = self.pending.len(),
            iterations,
            "training model v{}",
            version
        );

        let options = TrainOptions {
            iterations,
            ..TrainOptions::from(&self.config.training)
        };
        let mut candidate = self.recognizer.clone();
        let stats = candidate.train(&self.pending, &options, || cancel.is_cancelled())?;

        let last_trained = Utc::now();
        let path = self.store.version_path(version);
        let metadata = ModelMetadata {
            model_version: version,
            last_trained,
            patterns: Some(self.rules.clone()),
            training_data_count: 0,
            snapshot_id: None,
        };
        persistence::save_snapshot(&path, &candidate, &metadata)?;

        // Examples left in the pending file would be trained into the next
        // version again, so a failure here withdraws the new snapshot.
        if let Err(e) = self.store.save_pending(&[]) {
            persistence::remove_snapshot(&path);
            return Err(e.into());
        }

        self.recognizer = candidate;
        self.model_version = version;
        self.last_trained = last_trained;
        self.pending.clear();

        info!(
            version,
            tokens = stats.tokens,
            final_mistakes = stats.mistakes.last().copied().unwrap_or(0),
            "training complete"
        );

        Ok(TrainOutcome {
            status: TrainStatus::Success,
            model_version: version,
            model_path: Some(path),
        })
    }

    /// Score extraction against a labeled test set.
    pub fn evaluate(&self, items: &[TestItem]) -> Result<EvaluationReport> {
        let evaluator = Evaluator::new(self.config.evaluation.similarity_threshold);
        let report = evaluator.evaluate(items, |text| self.extract(text))?;
        info!(
            items = items.len(),
            precision = report.precision,
            recall = report.recall,
            f1 = report.f1_score,
            "evaluation complete"
        );
        Ok(report)
    }

    /// Save the current model, defaulting to the path of the current version.
    pub fn save(&self, path: Option<&Path>) -> Result<SaveOutcome> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => self.store.version_path(self.model_version),
        };
        let metadata = ModelMetadata {
            model_version: self.model_version,
            last_trained: self.last_trained,
            patterns: Some(self.rules.clone()),
            training_data_count: self.pending.len(),
            snapshot_id: None,
        };
        persistence::save_snapshot(&path, &self.recognizer, &metadata)?;

        Ok(SaveOutcome {
            path,
            model_version: self.model_version,
        })
    }

    /// Replace model, version, training time and rules with the snapshot at
    /// `path`. On error the engine is left unchanged.
    pub fn load(&mut self, path: &Path) -> Result<LoadOutcome> {
        let (recognizer, metadata) = persistence::load_snapshot(path)?;

        self.recognizer = recognizer;
        self.model_version = metadata.model_version;
        self.last_trained = metadata.last_trained;
        if let Some(rules) = metadata.patterns {
            self.rules = rules;
        }

        info!(
            version = self.model_version,
            "loaded model from {}",
            path.display()
        );
        Ok(LoadOutcome {
            path: path.to_path_buf(),
            model_version: self.model_version,
        })
    }
}

/// An engine shared between threads.
///
/// Every call holds the lock for its whole duration, so training and
/// persistence never interleave.
#[derive(Debug, Clone)]
pub struct SharedEngine {
    inner: Arc<Mutex<AdaptiveEngine>>,
}

impl SharedEngine {
    pub fn new(engine: AdaptiveEngine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(engine)),
        }
    }

    /// Run `f` with exclusive access to the engine.
    pub fn with<R>(&self, f: impl FnOnce(&mut AdaptiveEngine) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn extract(&self, text: &str) -> EntityMap {
        self.with(|engine| engine.extract(text))
    }

    pub fn record(
        &self,
        text: &str,
        original: &AnnotationMap,
        corrected: &AnnotationMap,
    ) -> Result<FeedbackOutcome> {
        self.with(|engine| engine.record(text, original, corrected))
    }

    pub fn train(&self) -> Result<TrainOutcome> {
        self.with(AdaptiveEngine::train)
    }

    pub fn train_with(&self, iterations: usize, cancel: &CancellationToken) -> Result<TrainOutcome> {
        self.with(|engine| engine.train_with(iterations, cancel))
    }

    pub fn evaluate(&self, items: &[TestItem]) -> Result<EvaluationReport> {
        self.with(|engine| engine.evaluate(items))
    }

    pub fn save(&self, path: Option<&Path>) -> Result<SaveOutcome> {
        self.with(|engine| engine.save(path))
    }

    pub fn load(&self, path: &Path) -> Result<LoadOutcome> {
        self.with(|engine| engine.load(path))
    }

    pub fn stats(&self) -> ModelStats {
        self.with(|engine| engine.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{InvexError, PersistenceError, TrainingError};
    use crate::models::{AnnotatedValue, SpanSource};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn engine() -> (AdaptiveEngine, TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let mut config = EngineConfig {
            models_dir: dir.path().to_path_buf(),
            ..EngineConfig::default()
        };
        config.training.iterations = 5;
        (AdaptiveEngine::new(config), dir)
    }

    fn invoice(i: usize) -> String {
        format!("Facture F-{:05}\nDate: {:02}/04/2023\nTotal TTC {}00,00 €", 100 + i, i + 1, i + 10)
    }

    fn correction(text: &str) -> AnnotationMap {
        let reference = text.split_whitespace().nth(1).unwrap();
        [("reference", AnnotatedValue::from(reference))]
            .into_iter()
            .collect()
    }

    fn record(engine: &mut AdaptiveEngine, i: usize) -> FeedbackOutcome {
        let text = invoice(i);
        let original = AnnotationMap::from(&engine.extract(&text));
        engine.record(&text, &original, &correction(&text)).unwrap()
    }

    #[test]
    fn test_new_engine_is_untrained() {
        let (engine, _dir) = engine();
        assert_eq!(engine.model_version(), 1);
        assert!(!engine.recognizer().is_trained());
        assert!(engine.pending().is_empty());
    }

    #[test]
    fn test_extract_falls_back_to_rules() {
        let (engine, _dir) = engine();
        let entities = engine.extract("Date: 15/04/2023 Total HT 4000,00 €");
        assert_eq!(entities.values("date"), vec!["15/04/2023"]);
        assert_eq!(entities.get("date").unwrap()[0].source, SpanSource::Rule);
    }

    #[test]
    fn test_threshold_triggers_one_training_run() {
        let (mut engine, dir) = engine();

        for i in 0..9 {
            let outcome = record(&mut engine, i);
            assert!(outcome.recorded);
            assert_eq!(outcome.pending_samples, i + 1);
            assert_eq!(outcome.model_version, 1);
        }

        let outcome = record(&mut engine, 9);
        assert!(outcome.recorded);
        assert_eq!(outcome.pending_samples, 0);
        assert_eq!(outcome.model_version, 2);

        let store = ModelStore::new(dir.path());
        let versions: Vec<u64> = store.list_versions().unwrap().into_iter().map(|(v, _)| v).collect();
        assert_eq!(versions, vec![2]);
        assert!(store.load_pending().unwrap().is_empty());
        assert!(engine.recognizer().is_trained());
    }

    #[test]
    fn test_unlocatable_correction_is_not_recorded() {
        let (mut engine, _dir) = engine();
        let corrected: AnnotationMap = [("date", AnnotatedValue::from("31/12/1999"))]
            .into_iter()
            .collect();
        let outcome = engine
            .record("Date: 15/04/2023", &AnnotationMap::new(), &corrected)
            .unwrap();

        assert!(!outcome.recorded);
        assert_eq!(outcome.pending_samples, 0);
        assert_eq!(outcome.skipped, vec!["DATE".to_string()]);
    }

    #[test]
    fn test_train_without_data() {
        let (mut engine, dir) = engine();
        let outcome = engine.train().unwrap();

        assert_eq!(outcome, TrainOutcome::no_data(1));
        assert_eq!(engine.model_version(), 1);
        assert!(ModelStore::new(dir.path()).list_versions().unwrap().is_empty());
    }

    #[test]
    fn test_train_advances_version_and_clears_buffer() {
        let (mut engine, dir) = engine();
        record(&mut engine, 0);
        record(&mut engine, 1);

        let outcome = engine.train().unwrap();
        assert_eq!(outcome.status, TrainStatus::Success);
        assert_eq!(outcome.model_version, 2);
        assert_eq!(outcome.model_path, Some(dir.path().join("invoice_model_v2")));
        assert_eq!(engine.model_version(), 2);
        assert!(engine.pending().is_empty());
    }

    #[test]
    fn test_cancelled_training_changes_nothing() {
        let (mut engine, _dir) = engine();
        record(&mut engine, 0);
        let before = engine.recognizer().clone();

        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine.train_with(30, &cancel).unwrap_err();

        assert!(matches!(
            err,
            InvexError::Training(TrainingError::Cancelled { completed: 0, .. })
        ));
        assert_eq!(engine.model_version(), 1);
        assert_eq!(engine.pending().len(), 1);
        assert_eq!(engine.recognizer(), &before);
    }

    #[test]
    fn test_cancelling_parent_token_stops_training() {
        let (mut engine, _dir) = engine();
        record(&mut engine, 0);

        let parent = CancellationToken::new();
        let child = parent.child_token();
        parent.cancel();

        let err = engine.train_with(30, &child).unwrap_err();
        assert!(matches!(
            err,
            InvexError::Training(TrainingError::Cancelled { .. })
        ));
        assert_eq!(engine.model_version(), 1);
        assert_eq!(engine.pending().len(), 1);
    }

    #[test]
    fn test_failed_pending_clear_withdraws_snapshot() {
        let (mut engine, dir) = engine();
        record(&mut engine, 0);
        let before = engine.recognizer().clone();

        // A directory in place of the pending file makes the rewrite fail.
        let pending_file = dir.path().join("pending_feedback.json");
        std::fs::remove_file(&pending_file).unwrap();
        std::fs::create_dir(&pending_file).unwrap();

        let err = engine.train().unwrap_err();
        assert!(matches!(
            err,
            InvexError::Persistence(PersistenceError::Write { .. })
        ));
        assert_eq!(engine.model_version(), 1);
        assert_eq!(engine.pending().len(), 1);
        assert_eq!(engine.recognizer(), &before);
        assert!(!dir.path().join("invoice_model_v2").exists());
        assert!(!dir.path().join("invoice_model_v2_metadata.json").exists());
    }

    #[test]
    fn test_save_load_round_trip() {
        let (mut engine, dir) = engine();
        record(&mut engine, 0);
        engine.train().unwrap();
        let saved = engine.save(None).unwrap();
        assert_eq!(saved.path, dir.path().join("invoice_model_v2"));

        let (mut fresh, _other) = self::engine();
        let loaded = fresh.load(&saved.path).unwrap();

        assert_eq!(loaded.model_version, 2);
        assert_eq!(fresh.model_version(), engine.model_version());
        assert_eq!(fresh.last_trained(), engine.last_trained());
        assert_eq!(fresh.rules(), engine.rules());
        assert_eq!(fresh.recognizer(), engine.recognizer());
    }

    #[test]
    fn test_failed_load_leaves_engine_untouched() {
        let (mut engine, dir) = engine();
        let last_trained = engine.last_trained();

        let err = engine.load(&dir.path().join("invoice_model_v7")).unwrap_err();

        assert!(matches!(
            err,
            InvexError::Persistence(PersistenceError::ModelNotFound(_))
        ));
        assert_eq!(engine.model_version(), 1);
        assert_eq!(engine.last_trained(), last_trained);
    }

    #[test]
    fn test_open_restores_latest_model_and_pending() {
        let (mut engine, _dir) = engine();
        record(&mut engine, 0);
        engine.train().unwrap();
        record(&mut engine, 1);

        let reopened = AdaptiveEngine::open(engine.config().clone()).unwrap();
        assert_eq!(reopened.model_version(), 2);
        assert_eq!(reopened.pending().len(), 1);
        assert!(reopened.recognizer().is_trained());
    }

    #[test]
    fn test_open_skips_unloadable_model() {
        let (engine, dir) = engine();
        std::fs::create_dir(dir.path().join("invoice_model_v3")).unwrap();

        let reopened = AdaptiveEngine::open(engine.config().clone()).unwrap();
        assert_eq!(reopened.model_version(), 1);
        assert!(!reopened.recognizer().is_trained());
    }

    #[test]
    fn test_open_falls_back_to_older_model() {
        let (mut engine, dir) = engine();
        record(&mut engine, 0);
        engine.train().unwrap();
        // Interrupted save: directory without model or metadata.
        std::fs::create_dir(dir.path().join("invoice_model_v3")).unwrap();

        let reopened = AdaptiveEngine::open(engine.config().clone()).unwrap();
        assert_eq!(reopened.model_version(), 2);
        assert!(reopened.recognizer().is_trained());
    }

    #[test]
    fn test_new_version_skips_versions_on_disk() {
        let (engine, dir) = engine();
        std::fs::create_dir(dir.path().join("invoice_model_v3")).unwrap();

        let mut opened = AdaptiveEngine::open(engine.config().clone()).unwrap();
        assert_eq!(opened.model_version(), 1);
        record(&mut opened, 0);
        let outcome = opened.train().unwrap();

        assert_eq!(outcome.model_version, 4);
        assert_eq!(outcome.model_path, Some(dir.path().join("invoice_model_v4")));

        let reopened = AdaptiveEngine::open(engine.config().clone()).unwrap();
        assert_eq!(reopened.model_version(), 4);
        assert!(reopened.recognizer().is_trained());
    }

    #[test]
    fn test_shared_engine_serializes_records() {
        let (engine, _dir) = engine();
        let shared = SharedEngine::new(engine);

        let handles: Vec<_> = (0..4)
            .map(|i| {
                let shared = shared.clone();
                std::thread::spawn(move || {
                    let text = invoice(i);
                    shared
                        .record(&text, &AnnotationMap::new(), &correction(&text))
                        .unwrap()
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(shared.with(|engine| engine.pending().len()), 4);
        assert_eq!(shared.stats().model_version, 1);
    }
}
