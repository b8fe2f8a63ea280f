use tch::{nn, Kind, Tensor};

use crate::config::ClassifierConfig;
use crate::profile::MacCounter;

/// Bidirectional multi-head self-attention. Padding positions are masked out
/// of every query's attention distribution.
pub struct SelfAttention {
    c_attn: nn::Linear,
    c_proj: nn::Linear,
    n_head: i64,
    dropout: f64,
}

impl SelfAttention {
    pub fn new(vs: &nn::Path, config: &ClassifierConfig) -> Self {
        let n_embd = config.n_embd;

        let c_attn = nn::linear(vs / "c_attn", n_embd, 3 * n_embd, Default::default());
        let c_proj = nn::linear(vs / "c_proj", n_embd, n_embd, Default::default());

        Self {
            c_attn,
            c_proj,
            n_head: config.n_head,
            dropout: config.dropout,
        }
    }

    /// x: [batch, seq_len, n_embd]
    /// padding: [batch, 1, 1, seq_len], true where the key is padding
    pub fn forward_t(
        &self,
        x: &Tensor,
        padding: &Tensor,
        train: bool,
        macs: &mut MacCounter,
    ) -> Tensor {
        let size = x.size();
        let (b, t, c) = (size[0], size[1], size[2]);
        let head_size = c / self.n_head;

        let qkv = x.apply(&self.c_attn);
        macs.linear(&qkv, c);

        let chunks = qkv.chunk(3, -1);
        let heads = |m: &Tensor| m.view([b, t, self.n_head, head_size]).transpose(1, 2);
        let (q, k, v) = (heads(&chunks[0]), heads(&chunks[1]), heads(&chunks[2]));

        let matmul_macs = (b * self.n_head * t * t * head_size) as u64;

        let att = q.matmul(&k.transpose(-2, -1)) * (1.0 / (head_size as f64).sqrt());
        macs.add(matmul_macs);

        let att = att
            .masked_fill(padding, f64::NEG_INFINITY)
            .softmax(-1, Kind::Float)
            .dropout(self.dropout, train);

        let y = att.matmul(&v);
        macs.add(matmul_macs);

        let y = y.transpose(1, 2).contiguous().view([b, t, c]);
        let out = y.apply(&self.c_proj);
        macs.linear(&out, c);
        out
    }
}
