use tch::Tensor;

use crate::transformer::SequenceClassifier;

/// Running multiply-accumulate count for one forward pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MacCounter {
    macs: u64,
}

impl MacCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A linear layer costs one MAC per output element per input feature.
    pub fn linear(&mut self, output: &Tensor, in_features: i64) {
        self.macs += output.numel() as u64 * in_features as u64;
    }

    pub fn add(&mut self, macs: u64) {
        self.macs += macs;
    }

    pub fn total(&self) -> u64 {
        self.macs
    }
}

/// Cost of a single inference pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileReport {
    pub macs: u64,
    pub params: u64,
}

impl ProfileReport {
    /// One multiply plus one add per MAC.
    pub fn flops(&self) -> u64 {
        2 * self.macs
    }
}

/// Runs one gradient-free, evaluation-mode forward pass over `input_ids` and
/// reports its MAC count along with the model's trainable parameter count.
pub fn profile(model: &SequenceClassifier, input_ids: &Tensor) -> ProfileReport {
    let mut counter = MacCounter::new();
    tch::no_grad(|| {
        let _ = model.forward_counted(input_ids, false, &mut counter);
    });

    ProfileReport {
        macs: counter.total(),
        params: model.num_parameters(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ClassifierConfig;
    use tch::{Device, Kind};

    fn tiny_config() -> ClassifierConfig {
        ClassifierConfig {
            name: "tiny".to_string(),
            vocab_size: 50,
            num_labels: 3,
            max_seq_len: 16,
            n_embd: 8,
            n_head: 2,
            n_layer: 2,
            hidden_dim: 16,
            dropout: 0.0,
            seq_classif_dropout: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn flops_are_twice_the_macs() {
        let report = ProfileReport { macs: 12_345, params: 7 };
        assert_eq!(report.flops(), 24_690);
    }

    #[test]
    fn mac_count_matches_layer_arithmetic() {
        let config = tiny_config();
        let model = SequenceClassifier::new(&config, Device::Cpu).unwrap();
        let (b, t) = (1i64, 5i64);
        let input = Tensor::ones([b, t], (Kind::Int64, Device::Cpu));

        let report = profile(&model, &input);

        let (c, h, hd, f) = (config.n_embd, config.n_head, config.head_size(), config.hidden_dim);
        let per_layer = b * t * 3 * c * c   // fused qkv projection
            + 2 * b * h * t * t * hd        // scores and context matmuls
            + b * t * c * c                 // output projection
            + b * t * f * c                 // feed-forward up
            + b * t * c * f;                // feed-forward down
        let head = b * c * c + b * config.num_labels * c;
        let expected = (config.n_layer * per_layer + head) as u64;

        assert_eq!(report.macs, expected);
        assert_eq!(report.flops(), 2 * expected);
        assert_eq!(report.params, model.num_parameters());
    }

    #[test]
    fn long_probe_is_truncated_to_max_seq_len() {
        let config = tiny_config();
        let model = SequenceClassifier::new(&config, Device::Cpu).unwrap();
        let short = Tensor::ones([1, config.max_seq_len], (Kind::Int64, Device::Cpu));
        let long = Tensor::ones([1, config.max_seq_len + 10], (Kind::Int64, Device::Cpu));

        assert_eq!(profile(&model, &short).macs, profile(&model, &long).macs);
    }
}
