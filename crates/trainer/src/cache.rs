use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tch::Device;

use classifier_core::{ClassifierConfig, SequenceClassifier};
use eurolang::Batches;

use crate::config::RunConfig;
use crate::train::Trainer;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Bumped whenever tokenisation or framing of examples changes, so artifacts
/// trained on the old encoding stop matching.
pub const PREPROCESSING_VERSION: u32 = 1;

/// What a cached artifact was trained on and how it was built. Compared on
/// every cache hit; any difference means the artifact is stale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheManifest {
    pub examples: usize,
    pub classes: Vec<String>,
    pub vocab_size: usize,
    pub max_seq_len: usize,
    pub seed: u64,
    pub validation_fraction: f64,
    pub test_fraction: f64,
    pub n_embd: i64,
    pub n_head: i64,
    pub n_layer: i64,
    pub hidden_dim: i64,
    #[serde(default)]
    pub pretrained: Option<PathBuf>,
    pub preprocessing_version: u32,
}

impl CacheManifest {
    fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path).with_context(|| format!("Failed to read manifest {:?}", path))?;
        let manifest = serde_json::from_str(&content).with_context(|| format!("Failed to parse manifest {:?}", path))?;
        Ok(Some(manifest))
    }

    fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        fs::write(&path, serde_json::to_string_pretty(self)?)
            .with_context(|| format!("Failed to write manifest {:?}", path))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelOrigin {
    Cached,
    Trained,
}

pub struct CachedModel {
    pub model: SequenceClassifier,
    pub origin: ModelOrigin,
}

/// Trains classifiers on demand and keeps them on disk keyed by the number
/// of training examples.
#[derive(Debug, Clone)]
pub struct ModelCache {
    root: PathBuf,
    use_cache: bool,
    template: ClassifierConfig,
    learning_rate: f64,
    max_entries: Option<usize>,
    seed: u64,
    validation_fraction: f64,
    test_fraction: f64,
}

impl ModelCache {
    pub fn new(config: &RunConfig) -> Self {
        Self {
            root: config.model_save_dir(),
            use_cache: config.use_cache,
            template: config.model.clone(),
            learning_rate: config.learning_rate,
            max_entries: config.max_cached_models,
            seed: config.data.seed,
            validation_fraction: config.data.validation_fraction,
            test_fraction: config.data.test_fraction,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Fingerprint of the artifact this cache would train for `train`.
    pub fn manifest_for(&self, train: &Batches) -> CacheManifest {
        CacheManifest {
            examples: train.len(),
            classes: train.classes().to_vec(),
            vocab_size: train.vocab_size(),
            max_seq_len: train.max_seq_len(),
            seed: self.seed,
            validation_fraction: self.validation_fraction,
            test_fraction: self.test_fraction,
            n_embd: self.template.n_embd,
            n_head: self.template.n_head,
            n_layer: self.template.n_layer,
            hidden_dim: self.template.hidden_dim,
            pretrained: self.template.pretrained.clone(),
            preprocessing_version: PREPROCESSING_VERSION,
        }
    }

    pub fn entry_dir(&self, examples: usize) -> PathBuf {
        self.root.join(examples.to_string())
    }

    /// Artifact directories currently on disk, oldest first.
    pub fn entries(&self) -> Result<Vec<PathBuf>> {
        if !self.root.is_dir() {
            return Ok(Vec::new());
        }

        let mut entries: Vec<(SystemTime, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&self.root).with_context(|| format!("Failed to list {:?}", self.root))? {
            let entry = entry?;
            let is_artifact = entry.file_name().to_str().is_some_and(|name| name.parse::<u64>().is_ok());
            if !is_artifact || !entry.file_type()?.is_dir() {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            entries.push((modified, entry.path()));
        }
        entries.sort();
        Ok(entries.into_iter().map(|(_, path)| path).collect())
    }

    /// Returns a classifier trained on `train`, loading it from disk when a
    /// matching artifact exists and caching is enabled.
    pub fn get_trained_model(&self, train: &Batches, device: Device) -> Result<CachedModel> {
        let dir = self.entry_dir(train.len());
        let manifest = self.manifest_for(train);

        if self.use_cache && dir.is_dir() {
            match CacheManifest::read(&dir) {
                Ok(Some(found)) if found != manifest => {
                    log::warn!("Cached model at {:?} has a different data, split or architecture fingerprint, retraining", dir);
                }
                Err(e) => {
                    log::warn!("Ignoring unreadable manifest in {:?}, retraining: {:#}", dir, e);
                }
                Ok(_) => {
                    log::info!("Loading cached model from {:?}", dir);
                    let model = SequenceClassifier::from_pretrained(&dir, device)?;
                    return Ok(CachedModel {
                        model,
                        origin: ModelOrigin::Cached,
                    });
                }
            }
        }

        let model = self.train_fresh(train, device)?;

        if dir.exists() {
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to clear {:?}", dir))?;
        }
        model.save_pretrained(&dir)?;
        manifest.write(&dir)?;
        log::info!("Saved model to {:?}", dir);

        if let Some(max) = self.max_entries {
            self.evict(max, &dir)?;
        }

        Ok(CachedModel {
            model,
            origin: ModelOrigin::Trained,
        })
    }

    fn train_fresh(&self, train: &Batches, device: Device) -> Result<SequenceClassifier> {
        tch::manual_seed(self.seed as i64);

        let config = ClassifierConfig {
            vocab_size: train.vocab_size() as i64,
            num_labels: train.classes().len() as i64,
            max_seq_len: train.max_seq_len() as i64,
            pad_token_id: train.pad_id(),
            ..self.template.clone()
        };
        let mut model = SequenceClassifier::new(&config, device)?;

        if let Some(path) = &config.pretrained {
            let report = model
                .load_pretrained_weights(path)
                .with_context(|| format!("Failed to initialise from {:?}", path))?;
            log::info!("Initialised {} tensors from {:?}", report.loaded.len(), path);
        }

        log::info!("Training on {} examples ({} classes)", train.len(), config.num_labels);
        let mut trainer = Trainer::new(model, self.learning_rate)?;
        trainer.train_epoch(train)?;
        Ok(trainer.into_model())
    }

    /// Removes the oldest artifacts until at most `max` remain, never touching `keep`.
    pub fn evict(&self, max: usize, keep: &Path) -> Result<()> {
        let entries = self.entries()?;
        let mut excess = entries.len().saturating_sub(max);

        for dir in entries {
            if excess == 0 {
                break;
            }
            if dir == keep {
                continue;
            }
            log::info!("Evicting cached model {:?}", dir);
            fs::remove_dir_all(&dir).with_context(|| format!("Failed to evict {:?}", dir))?;
            excess -= 1;
        }
        Ok(())
    }
}
