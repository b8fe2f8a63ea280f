use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::{DeviceChoice, Experiment, RunConfig};

/// Train and benchmark a language-identification classifier.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML run configuration; flags below override its values
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Directory for cached models, result tables and the tokenizer
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Reuse cached models and previously computed results
    /// (`--use-cache false` turns off a YAML `use_cache: true`)
    #[arg(long, num_args = 0..=1, default_missing_value = "true", value_name = "BOOL")]
    pub use_cache: Option<bool>,

    #[arg(short, long, value_enum)]
    pub experiment: Option<Experiment>,

    /// Fraction of the training split to use, in (0, 1]
    #[arg(long)]
    pub subset: Option<f64>,

    #[arg(long, value_enum)]
    pub device: Option<DeviceChoice>,

    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Corpus CSV inside the data directory
    #[arg(long)]
    pub corpus_file: Option<String>,

    #[arg(long)]
    pub batch_size: Option<usize>,

    #[arg(long)]
    pub max_seq_len: Option<usize>,

    /// Vocabulary size used when a tokenizer has to be trained
    #[arg(long)]
    pub vocab_size: Option<usize>,

    #[arg(long)]
    pub learning_rate: Option<f64>,

    /// Seed for the split shuffle and model initialisation
    #[arg(long)]
    pub seed: Option<u64>,

    /// Safetensors file to initialise encoder weights from
    #[arg(long)]
    pub pretrained: Option<PathBuf>,

    /// Name recorded in the flop table
    #[arg(long)]
    pub model_name: Option<String>,

    /// Keep at most this many cached models
    #[arg(long)]
    pub max_cached_models: Option<usize>,
}

impl Cli {
    /// Defaults, then the YAML file, then flags.
    pub fn into_config(self) -> Result<RunConfig> {
        let mut config = match &self.config {
            Some(path) => RunConfig::from_yaml_file(path)?,
            None => RunConfig::default(),
        };

        if let Some(dir) = self.output_dir {
            config.output_dir = dir;
        }
        if let Some(use_cache) = self.use_cache {
            config.use_cache = use_cache;
        }
        if let Some(experiment) = self.experiment {
            config.experiment = experiment;
        }
        if let Some(subset) = self.subset {
            config.data.subset = subset;
        }
        if let Some(device) = self.device {
            config.device = device;
        }
        if let Some(dir) = self.data_dir {
            config.data.data_dir = dir;
        }
        if let Some(file) = self.corpus_file {
            config.data.corpus_file = file;
        }
        if let Some(batch_size) = self.batch_size {
            config.data.batch_size = batch_size;
        }
        if let Some(max_seq_len) = self.max_seq_len {
            config.data.max_seq_len = max_seq_len;
        }
        if let Some(vocab_size) = self.vocab_size {
            config.data.vocab_size = vocab_size;
        }
        if let Some(lr) = self.learning_rate {
            config.learning_rate = lr;
        }
        if let Some(seed) = self.seed {
            config.data.seed = seed;
        }
        if let Some(path) = self.pretrained {
            config.model.pretrained = Some(path);
        }
        if let Some(name) = self.model_name {
            config.model.name = name;
        }
        if let Some(max) = self.max_cached_models {
            config.max_cached_models = Some(max);
        }

        config.validate()?;
        Ok(config)
    }
}
