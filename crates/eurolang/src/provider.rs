use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokenizer::{SpecialTokens, Trainer, BPE};

use crate::corpus::Corpus;
use crate::dataset::{Batches, Example};
use crate::error::{DataError, Result};

/// Options that shape the splits handed to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataOptions {
    pub data_dir: PathBuf,
    pub corpus_file: String,
    /// Fraction of the training split to keep, in (0, 1].
    pub subset: f64,
    pub batch_size: usize,
    /// Token positions per example, including the `<s>` and `</s>` markers.
    pub max_seq_len: usize,
    /// Target size when a tokenizer has to be trained.
    pub vocab_size: usize,
    pub validation_fraction: f64,
    pub test_fraction: f64,
    pub seed: u64,
}

impl Default for DataOptions {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            corpus_file: "eurolang.csv".to_string(),
            subset: 1.0,
            batch_size: 16,
            max_seq_len: 128,
            vocab_size: 8000,
            validation_fraction: 0.1,
            test_fraction: 0.1,
            seed: 42,
        }
    }
}

impl DataOptions {
    pub fn corpus_path(&self) -> PathBuf {
        self.data_dir.join(&self.corpus_file)
    }

    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(DataError::InvalidOption(msg));
        if !(self.subset > 0.0 && self.subset <= 1.0) {
            return invalid(format!("subset must be in (0, 1], got {}", self.subset));
        }
        for (name, value) in [
            ("validation_fraction", self.validation_fraction),
            ("test_fraction", self.test_fraction),
        ] {
            if !(0.0..1.0).contains(&value) {
                return invalid(format!("{} must be in [0, 1), got {}", name, value));
            }
        }
        if self.validation_fraction + self.test_fraction >= 1.0 {
            return invalid("validation_fraction + test_fraction must leave room for training".to_string());
        }
        if self.max_seq_len < 2 {
            return invalid(format!("max_seq_len must be at least 2, got {}", self.max_seq_len));
        }
        if self.batch_size == 0 {
            return invalid("batch_size must be positive".to_string());
        }
        Ok(())
    }
}

/// The three sources a run works with.
#[derive(Debug, Clone)]
pub struct Splits {
    pub train: Batches,
    pub validation: Batches,
    pub test: Batches,
}

/// Supplies train/validation/test sources for a given set of options.
pub trait DataProvider {
    fn splits(&self, opts: &DataOptions) -> Result<Splits>;

    /// Encodes a single sentence the way examples are encoded, without padding.
    fn encode_probe(&self, text: &str, opts: &DataOptions) -> Vec<i64>;
}

/// Number of examples kept when taking `subset` of `n`: at least one, at most `n`.
pub fn subset_len(n: usize, subset: f64) -> usize {
    if n == 0 {
        return 0;
    }
    // Guard against products like 0.2 * 15 = 3.0000000000000004
    let wanted = (n as f64 * subset - 1e-9).ceil();
    (wanted.max(1.0) as usize).min(n)
}

fn held_out(n: usize, fraction: f64) -> usize {
    if fraction <= 0.0 {
        0
    } else {
        ((n as f64 * fraction).round() as usize).max(1)
    }
}

/// Shuffles `0..n` with `seed` and cuts it into (train, validation, test).
/// Training always keeps at least one index.
pub fn split_indices(n: usize, opts: &DataOptions) -> (Vec<usize>, Vec<usize>, Vec<usize>) {
    let mut indices: Vec<usize> = (0..n).collect();
    indices.shuffle(&mut StdRng::seed_from_u64(opts.seed));

    let spare = n.saturating_sub(1);
    let n_test = held_out(n, opts.test_fraction).min(spare);
    let n_val = held_out(n, opts.validation_fraction).min(spare - n_test);

    let test = indices.split_off(n - n_test);
    let validation = indices.split_off(n - n_test - n_val);
    (indices, validation, test)
}

/// `<s> tokens </s>` cut to `max_seq_len`, without padding.
fn frame(tokenizer: &BPE, special: SpecialTokens, text: &str, max_seq_len: usize) -> Vec<i64> {
    let body = tokenizer.encode_with_max_tokens(text, max_seq_len.saturating_sub(2));
    std::iter::once(special.bos)
        .chain(body)
        .chain(std::iter::once(special.eos))
        .map(i64::from)
        .collect()
}

/// Loads `path` when it exists, otherwise trains a tokenizer on `corpus` and saves it there.
pub fn load_or_train_tokenizer(corpus: &Corpus, path: &Path, vocab_size: usize) -> Result<BPE> {
    if path.exists() {
        log::info!("Loading existing tokenizer from {:?}", path);
        return Ok(BPE::load(path)?);
    }

    log::info!("Training new tokenizer on {} examples", corpus.len());
    let specials = SpecialTokens::NAMES.iter().map(|s| s.to_string()).collect();
    let bpe = Trainer::new(vocab_size, 2, specials)
        .train_from_texts(corpus.records().iter().map(|r| r.text.as_str()))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    bpe.save(path)?;
    log::info!("Saved tokenizer ({} tokens) to {:?}", bpe.vocab_size(), path);
    Ok(bpe)
}

/// Serves splits of a CSV corpus tokenised with a BPE tokenizer.
pub struct EurolangProvider {
    corpus: Corpus,
    classes: Arc<[String]>,
    tokenizer: BPE,
    special: SpecialTokens,
}

impl EurolangProvider {
    pub fn new(corpus: Corpus, tokenizer: BPE) -> Result<Self> {
        let special = tokenizer.special_tokens()?;
        let classes = corpus.classes().to_vec().into();
        Ok(Self {
            corpus,
            classes,
            tokenizer,
            special,
        })
    }

    /// Reads the corpus named by `opts` and loads or trains the tokenizer at `tokenizer_path`.
    pub fn open(opts: &DataOptions, tokenizer_path: &Path) -> Result<Self> {
        opts.validate()?;
        let corpus = Corpus::load(opts.corpus_path())?;
        let tokenizer = load_or_train_tokenizer(&corpus, tokenizer_path, opts.vocab_size)?;
        Self::new(corpus, tokenizer)
    }

    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    pub fn tokenizer(&self) -> &BPE {
        &self.tokenizer
    }

    fn batches(&self, indices: &[usize], opts: &DataOptions) -> Batches {
        let records = self.corpus.records();
        let examples = indices
            .par_iter()
            .map(|&i| {
                let record = &records[i];
                let label = self.corpus.label_index(&record.label).unwrap_or_default();
                Example {
                    input_ids: frame(&self.tokenizer, self.special, &record.text, opts.max_seq_len),
                    label: label as i64,
                }
            })
            .collect();

        Batches::new(
            examples,
            Arc::clone(&self.classes),
            opts.batch_size,
            opts.max_seq_len,
            self.tokenizer.vocab_size(),
            i64::from(self.special.pad),
        )
    }
}

impl DataProvider for EurolangProvider {
    fn splits(&self, opts: &DataOptions) -> Result<Splits> {
        opts.validate()?;
        let (mut train, validation, test) = split_indices(self.corpus.len(), opts);
        train.truncate(subset_len(train.len(), opts.subset));

        log::debug!(
            "Split sizes: {} train, {} validation, {} test (subset {})",
            train.len(),
            validation.len(),
            test.len(),
            opts.subset
        );

        Ok(Splits {
            train: self.batches(&train, opts),
            validation: self.batches(&validation, opts),
            test: self.batches(&test, opts),
        })
    }

    fn encode_probe(&self, text: &str, opts: &DataOptions) -> Vec<i64> {
        frame(&self.tokenizer, self.special, text, opts.max_seq_len)
    }
}
