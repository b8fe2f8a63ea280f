use anyhow::{Context, Result};
use std::path::Path;
use tch::{nn, Device, Kind, Tensor};

use crate::attention::SelfAttention;
use crate::config::ClassifierConfig;
use crate::profile::MacCounter;
use crate::safetensors_util::{self, LoadReport};

pub const CONFIG_FILE: &str = "config.json";
pub const WEIGHTS_FILE: &str = "model.safetensors";

fn layer_norm<'a>(vs: nn::Path<'a>, config: &ClassifierConfig) -> nn::LayerNorm {
    let ln_config = nn::LayerNormConfig {
        eps: config.layer_norm_epsilon,
        ..Default::default()
    };
    nn::layer_norm(vs, vec![config.n_embd], ln_config)
}

/// FeedForward block (MLP)
pub struct MLP {
    c_fc: nn::Linear,
    c_proj: nn::Linear,
    dropout: f64,
}

impl MLP {
    pub fn new(vs: &nn::Path, config: &ClassifierConfig) -> Self {
        let c_fc = nn::linear(vs / "c_fc", config.n_embd, config.hidden_dim, Default::default());
        let c_proj = nn::linear(vs / "c_proj", config.hidden_dim, config.n_embd, Default::default());

        Self {
            c_fc,
            c_proj,
            dropout: config.dropout,
        }
    }

    pub fn forward_t(&self, x: &Tensor, train: bool, macs: &mut MacCounter) -> Tensor {
        let in_features = x.size()[2];
        let h = x.apply(&self.c_fc);
        macs.linear(&h, in_features);

        let hidden = h.size()[2];
        let out = h.gelu("none").apply(&self.c_proj);
        macs.linear(&out, hidden);

        out.dropout(self.dropout, train)
    }
}

/// Pre-norm encoder block.
pub struct Block {
    ln_1: nn::LayerNorm,
    attn: SelfAttention,
    ln_2: nn::LayerNorm,
    mlp: MLP,
}

impl Block {
    pub fn new(vs: &nn::Path, config: &ClassifierConfig) -> Self {
        Self {
            ln_1: layer_norm(vs / "ln_1", config),
            attn: SelfAttention::new(&(vs / "attn"), config),
            ln_2: layer_norm(vs / "ln_2", config),
            mlp: MLP::new(&(vs / "mlp"), config),
        }
    }

    pub fn forward_t(
        &self,
        x: &Tensor,
        padding: &Tensor,
        train: bool,
        macs: &mut MacCounter,
    ) -> Tensor {
        let attn_out = self.attn.forward_t(&x.apply(&self.ln_1), padding, train, macs);
        let x = x + attn_out;

        let mlp_out = self.mlp.forward_t(&x.apply(&self.ln_2), train, macs);
        x + mlp_out
    }
}

struct Encoder {
    wte: nn::Embedding,
    wpe: nn::Embedding,
    blocks: Vec<Block>,
    ln_f: nn::LayerNorm,
    pre_classifier: nn::Linear,
    classifier: nn::Linear,
}

impl Encoder {
    fn new(vs: &nn::Path, config: &ClassifierConfig) -> Self {
        let wte = nn::embedding(vs / "wte", config.vocab_size, config.n_embd, Default::default());
        let wpe = nn::embedding(vs / "wpe", config.max_seq_len, config.n_embd, Default::default());

        let blocks = (0..config.n_layer)
            .map(|i| Block::new(&(vs / "h" / i), config))
            .collect();

        let ln_f = layer_norm(vs / "ln_f", config);
        let pre_classifier = nn::linear(vs / "pre_classifier", config.n_embd, config.n_embd, Default::default());
        let classifier = nn::linear(vs / "classifier", config.n_embd, config.num_labels, Default::default());

        Self {
            wte,
            wpe,
            blocks,
            ln_f,
            pre_classifier,
            classifier,
        }
    }
}

/// Result of a classifier forward pass. `loss` is only present when labels
/// were supplied.
pub struct ClassifierOutput {
    pub loss: Option<Tensor>,
    pub logits: Tensor,
}

/// Transformer encoder with a sequence-classification head on the first
/// (`<s>`) position. Owns its variable store so it can be trained, saved and
/// reloaded as a unit.
pub struct SequenceClassifier {
    vs: nn::VarStore,
    encoder: Encoder,
    pub config: ClassifierConfig,
}

impl SequenceClassifier {
    pub fn new(config: &ClassifierConfig, device: Device) -> Result<Self> {
        config.validate()?;
        let vs = nn::VarStore::new(device);
        let encoder = Encoder::new(&vs.root(), config);

        Ok(Self {
            vs,
            encoder,
            config: config.clone(),
        })
    }

    /// Loads a classifier previously written by [`save_pretrained`](Self::save_pretrained).
    /// Every variable must be present in the weights file with a matching shape.
    pub fn from_pretrained<P: AsRef<Path>>(dir: P, device: Device) -> Result<Self> {
        let dir = dir.as_ref();
        let config_path = dir.join(CONFIG_FILE);

        let config_str = std::fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read model config at {:?}", config_path))?;
        let config: ClassifierConfig = serde_json::from_str(&config_str)
            .with_context(|| format!("Failed to parse model config at {:?}", config_path))?;

        let mut model = Self::new(&config, device)?;
        safetensors_util::load_safetensors(&mut model.vs, dir.join(WEIGHTS_FILE), true)
            .with_context(|| format!("Failed to load weights from {:?}", dir))?;
        Ok(model)
    }

    pub fn save_pretrained<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;

        self.vs
            .save(dir.join(WEIGHTS_FILE))
            .with_context(|| format!("Failed to save weights to {:?}", dir))?;

        let config_json = serde_json::to_string_pretty(&self.config)?;
        std::fs::write(dir.join(CONFIG_FILE), config_json)?;
        Ok(())
    }

    /// Initialises matching variables from a safetensors file, leaving the
    /// rest (typically the classification head) at their random values.
    pub fn load_pretrained_weights<P: AsRef<Path>>(&mut self, path: P) -> Result<LoadReport> {
        safetensors_util::load_safetensors(&mut self.vs, path, false)
    }

    pub fn forward_t(&self, input_ids: &Tensor, labels: Option<&Tensor>, train: bool) -> ClassifierOutput {
        let logits = self.forward_counted(input_ids, train, &mut MacCounter::new());
        let loss = labels.map(|labels| {
            logits.cross_entropy_for_logits(&labels.to_device(logits.device()))
        });
        ClassifierOutput { loss, logits }
    }

    /// input_ids: [batch, seq_len]. Sequences longer than `max_seq_len` are truncated.
    /// Returns logits of shape [batch, num_labels].
    pub(crate) fn forward_counted(&self, input_ids: &Tensor, train: bool, macs: &mut MacCounter) -> Tensor {
        let device = self.vs.device();
        let mut idx = input_ids.to_device(device).to_kind(Kind::Int64);
        let t = idx.size()[1];
        if t > self.config.max_seq_len {
            idx = idx.narrow(1, 0, self.config.max_seq_len);
        }
        let t = idx.size()[1];

        // [batch, 1, 1, seq_len] so it broadcasts over heads and queries
        let padding = idx.eq(self.config.pad_token_id).unsqueeze(1).unsqueeze(1);

        let positions = Tensor::arange(t, (Kind::Int64, device));
        let enc = &self.encoder;
        let mut x = (idx.apply(&enc.wte) + positions.apply(&enc.wpe)).dropout(self.config.dropout, train);

        for block in &enc.blocks {
            x = block.forward_t(&x, &padding, train, macs);
        }
        x = x.apply(&enc.ln_f);

        let n_embd = self.config.n_embd;
        let pooled = x.select(1, 0).apply(&enc.pre_classifier);
        macs.linear(&pooled, n_embd);

        let logits = pooled
            .relu()
            .dropout(self.config.seq_classif_dropout, train)
            .apply(&enc.classifier);
        macs.linear(&logits, n_embd);
        logits
    }

    pub fn var_store(&self) -> &nn::VarStore {
        &self.vs
    }

    pub fn device(&self) -> Device {
        self.vs.device()
    }

    pub fn num_parameters(&self) -> u64 {
        self.vs
            .trainable_variables()
            .iter()
            .map(|t| t.numel() as u64)
            .sum()
    }
}
