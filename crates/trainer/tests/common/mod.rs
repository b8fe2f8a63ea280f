#![allow(dead_code)]

use anyhow::Result;
use std::path::Path;
use std::sync::Arc;

use classifier_core::ProfileReport;
use eurolang::provider::subset_len;
use eurolang::{Batches, DataOptions, DataProvider, Example, Record, Splits};
use trainer::{ModelRunner, RunConfig};

pub const LANGUAGES: [(&str, &str); 3] = [
    ("de", "der hund schläft unter dem tisch"),
    ("en", "the dog sleeps under the table"),
    ("fr", "le chien dort sous la table"),
];

/// Serves a fixed number of synthetic examples without tokenising anything.
pub struct FakeProvider {
    pub train_examples: usize,
}

impl FakeProvider {
    fn source(&self, n: usize, opts: &DataOptions) -> Batches {
        let examples = (0..n)
            .map(|i| Example {
                input_ids: vec![2, 4 + (i % 3) as i64, 3],
                label: (i % 3) as i64,
            })
            .collect();
        let classes: Arc<[String]> = LANGUAGES.iter().map(|(l, _)| l.to_string()).collect();
        Batches::new(examples, classes, opts.batch_size, opts.max_seq_len, 16, 0)
    }
}

impl DataProvider for FakeProvider {
    fn splits(&self, opts: &DataOptions) -> eurolang::Result<Splits> {
        opts.validate()?;
        Ok(Splits {
            train: self.source(subset_len(self.train_examples, opts.subset), opts),
            validation: self.source(10, opts),
            test: self.source(10, opts),
        })
    }

    fn encode_probe(&self, text: &str, _opts: &DataOptions) -> Vec<i64> {
        let words = text.split_whitespace().count() as i64;
        std::iter::once(2).chain(4..4 + words).chain(std::iter::once(3)).collect()
    }
}

/// Records what it was asked to run and answers with made-up numbers.
#[derive(Default)]
pub struct FakeRunner {
    pub trained_on: Vec<usize>,
    pub profiled: Vec<Vec<i64>>,
    pub macs: u64,
}

impl ModelRunner for FakeRunner {
    fn run_model(&mut self, train: &Batches, test: &Batches) -> Result<f64> {
        self.trained_on.push(train.len());
        Ok(train.len() as f64 / (train.len() + test.len()) as f64)
    }

    fn profile_model(&mut self, train: &Batches, probe: &[i64]) -> Result<ProfileReport> {
        self.trained_on.push(train.len());
        self.profiled.push(probe.to_vec());
        Ok(ProfileReport {
            macs: self.macs,
            params: 1234,
        })
    }
}

pub fn fake_config(output_dir: &Path) -> RunConfig {
    RunConfig {
        output_dir: output_dir.to_path_buf(),
        ..Default::default()
    }
}

/// Writes a small three-language corpus CSV and returns a config pointing at
/// it with a model small enough to train on CPU in a test.
pub fn tiny_corpus_config(root: &Path, lines_per_language: usize) -> RunConfig {
    let data_dir = root.join("data");
    std::fs::create_dir_all(&data_dir).unwrap();

    let mut writer = csv::Writer::from_path(data_dir.join("eurolang.csv")).unwrap();
    for i in 0..lines_per_language {
        for (label, text) in LANGUAGES {
            writer
                .serialize(Record {
                    text: format!("{} {}", text, i),
                    label: label.to_string(),
                })
                .unwrap();
        }
    }
    writer.flush().unwrap();

    let mut config = RunConfig {
        output_dir: root.join("output"),
        learning_rate: 1e-3,
        ..Default::default()
    };
    config.device = trainer::DeviceChoice::Cpu;
    config.data.data_dir = data_dir;
    config.data.batch_size = 4;
    config.data.max_seq_len = 16;
    config.data.vocab_size = 120;
    config.model.name = "tiny-encoder".to_string();
    config.model.n_embd = 8;
    config.model.n_head = 2;
    config.model.n_layer = 1;
    config.model.hidden_dim = 16;
    config
}
