use anyhow::{bail, Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tch::Device;

use classifier_core::ClassifierConfig;
use eurolang::DataOptions;

pub const MODEL_SAVE_DIR: &str = "deeplearning_model_save";
pub const DATA_SIZE_STEM: &str = "deeplearning_data_size";
pub const FLOP_STEM: &str = "flop_analysis";
pub const TOKENIZER_FILE: &str = "tokenizer.json";

/// Fractions of the training split visited by the data-size experiment.
pub const DEFAULT_SWEEP: [f64; 9] = [0.0001, 0.001, 0.01, 0.02, 0.05, 0.1, 0.2, 0.5, 1.0];
pub const DEFAULT_PROBE: &str = "The quick brown fox jumps over the lazy dog ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Experiment {
    /// Train (or reuse) on the configured subset and report test accuracy
    Baseline,
    /// Sweep the training-set fraction and tabulate accuracy
    DataSize,
    /// Count FLOPs and parameters of single-sample inference
    Flop,
    /// Accepted for compatibility; runs the baseline only
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum DeviceChoice {
    /// CUDA when available, otherwise CPU
    Auto,
    Cpu,
    Cuda,
}

impl DeviceChoice {
    pub fn resolve(self) -> Result<Device> {
        match self {
            DeviceChoice::Auto => Ok(Device::cuda_if_available()),
            DeviceChoice::Cpu => Ok(Device::Cpu),
            DeviceChoice::Cuda if tch::Cuda::is_available() => Ok(Device::Cuda(0)),
            DeviceChoice::Cuda => bail!("CUDA was requested but no CUDA device is available"),
        }
    }
}

/// Parameters of one run. Built once, then only read; sweep points derive
/// copies through [`RunConfig::with_subset`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub output_dir: PathBuf,
    pub use_cache: bool,
    pub experiment: Experiment,
    pub device: DeviceChoice,
    pub data: DataOptions,
    pub model: ClassifierConfig,
    pub learning_rate: f64,
    pub sweep: Vec<f64>,
    /// Upper bound on cached model directories; `None` keeps everything.
    pub max_cached_models: Option<usize>,
    pub probe_text: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            use_cache: false,
            experiment: Experiment::Baseline,
            device: DeviceChoice::Auto,
            data: DataOptions::default(),
            model: ClassifierConfig::default(),
            learning_rate: 5e-5,
            sweep: DEFAULT_SWEEP.to_vec(),
            max_cached_models: None,
            probe_text: DEFAULT_PROBE.to_string(),
        }
    }
}

impl RunConfig {
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read run config {:?}", path))?;
        serde_yaml::from_str(&content).with_context(|| format!("Failed to parse run config {:?}", path))
    }

    /// Copy of this configuration that trains on `subset` of the training split.
    pub fn with_subset(&self, subset: f64) -> Self {
        let mut config = self.clone();
        config.data.subset = subset;
        config
    }

    pub fn model_save_dir(&self) -> PathBuf {
        self.output_dir.join(MODEL_SAVE_DIR)
    }

    pub fn tokenizer_path(&self) -> PathBuf {
        self.output_dir.join(TOKENIZER_FILE)
    }

    pub fn validate(&self) -> Result<()> {
        self.data.validate()?;
        if let Some(bad) = self.sweep.iter().find(|f| !(**f > 0.0 && **f <= 1.0)) {
            bail!("sweep fractions must be in (0, 1], got {}", bad);
        }
        if !(self.learning_rate > 0.0) {
            bail!("learning_rate must be positive, got {}", self.learning_rate);
        }
        if self.max_cached_models == Some(0) {
            bail!("max_cached_models must be at least 1 when set");
        }
        Ok(())
    }
}
