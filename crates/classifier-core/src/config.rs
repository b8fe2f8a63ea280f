use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClassifierConfig {
    /// Name reported in cost tables.
    pub name: String,
    /// Size of the token vocabulary. Filled from the training source.
    pub vocab_size: i64,
    /// Number of output classes. Filled from the training source.
    pub num_labels: i64,
    /// Maximum sequence length (size of the learned position table).
    pub max_seq_len: i64,
    /// Dimension of the token embeddings and hidden states.
    pub n_embd: i64,
    /// Number of attention heads.
    pub n_head: i64,
    /// Number of encoder layers.
    pub n_layer: i64,
    /// Inner width of the feed-forward block.
    pub hidden_dim: i64,
    /// Dropout applied to embeddings, attention and residual branches.
    pub dropout: f64,
    /// Dropout applied before the classification layer.
    pub seq_classif_dropout: f64,
    pub layer_norm_epsilon: f64,
    /// Token id treated as padding by the attention mask.
    pub pad_token_id: i64,
    /// Optional safetensors file used to initialise encoder weights.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pretrained: Option<PathBuf>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            name: "eurolang-encoder-small".to_string(),
            vocab_size: 8000,
            num_labels: 2,
            max_seq_len: 128,
            n_embd: 256,
            n_head: 4,
            n_layer: 4,
            hidden_dim: 1024,
            dropout: 0.1,
            seq_classif_dropout: 0.2,
            layer_norm_epsilon: 1e-12,
            pad_token_id: 0,
            pretrained: None,
        }
    }
}

impl ClassifierConfig {
    pub fn head_size(&self) -> i64 {
        self.n_embd / self.n_head
    }

    /// Checks the invariants the encoder relies on.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.n_head <= 0 || self.n_embd % self.n_head != 0 {
            anyhow::bail!(
                "n_embd ({}) must be a positive multiple of n_head ({})",
                self.n_embd,
                self.n_head
            );
        }
        if self.num_labels < 1 {
            anyhow::bail!("classifier needs at least one label, got {}", self.num_labels);
        }
        if self.vocab_size < 1 || self.max_seq_len < 1 {
            anyhow::bail!(
                "vocab_size ({}) and max_seq_len ({}) must be positive",
                self.vocab_size,
                self.max_seq_len
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = ClassifierConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.head_size(), 64);
    }

    #[test]
    fn rejects_indivisible_heads() {
        let config = ClassifierConfig {
            n_embd: 30,
            n_head: 4,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let config: ClassifierConfig =
            serde_json::from_str(r#"{"name": "tiny", "n_layer": 1}"#).unwrap();
        assert_eq!(config.name, "tiny");
        assert_eq!(config.n_layer, 1);
        assert_eq!(config.n_embd, ClassifierConfig::default().n_embd);
        assert!(config.pretrained.is_none());
    }
}
