use std::sync::Arc;

use classifier_core::ClassifierConfig;
use eurolang::{Batches, Example};

pub const TOY_CLASSES: [&str; 3] = ["de", "fr", "it"];

/// `n` examples cycling through three classes, each class with its own tokens.
pub fn toy_batches(n: usize, batch_size: usize) -> Batches {
    let examples = (0..n)
        .map(|i| {
            let label = (i % TOY_CLASSES.len()) as i64;
            let token = 4 + label * 3;
            Example {
                input_ids: vec![2, token, token + 1, token + 2, 3, 0],
                label,
            }
        })
        .collect();
    let classes: Arc<[String]> = TOY_CLASSES.iter().map(|s| s.to_string()).collect();
    Batches::new(examples, classes, batch_size, 6, 16, 0)
}

pub fn tiny_model_config(source: &Batches) -> ClassifierConfig {
    ClassifierConfig {
        name: "tiny".to_string(),
        vocab_size: source.vocab_size() as i64,
        num_labels: source.classes().len() as i64,
        max_seq_len: source.max_seq_len() as i64,
        n_embd: 8,
        n_head: 2,
        n_layer: 1,
        hidden_dim: 16,
        dropout: 0.0,
        seq_classif_dropout: 0.0,
        ..Default::default()
    }
}
