use std::sync::Arc;
use tch::Tensor;

/// One tokenised example: `input_ids` is already framed and padded to the
/// source's sequence length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Example {
    pub input_ids: Vec<i64>,
    pub label: i64,
}

/// A batch ready for the model.
/// input_ids: [batch_size, max_seq_len] (Int64)
/// labels: [batch_size] (Int64)
#[derive(Debug)]
pub struct Batch {
    pub input_ids: Tensor,
    pub labels: Tensor,
}

impl Batch {
    fn from_examples(examples: &[Example], max_seq_len: usize, pad_id: i64) -> Self {
        let mut inputs = Vec::with_capacity(examples.len() * max_seq_len);
        let mut labels = Vec::with_capacity(examples.len());

        for example in examples {
            let padding = std::iter::repeat(pad_id);
            inputs.extend(example.input_ids.iter().copied().chain(padding).take(max_seq_len));
            labels.push(example.label);
        }

        let input_ids = Tensor::from_slice(&inputs).view([examples.len() as i64, max_seq_len as i64]);
        let labels = Tensor::from_slice(&labels);
        Self { input_ids, labels }
    }

    pub fn len(&self) -> usize {
        self.labels.size()[0] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An iterable, fixed-order source of batches over one split.
///
/// Besides the examples it carries everything a model needs to be built for
/// it: the class set, vocabulary size, sequence length and padding id.
#[derive(Debug, Clone)]
pub struct Batches {
    examples: Vec<Example>,
    classes: Arc<[String]>,
    batch_size: usize,
    max_seq_len: usize,
    vocab_size: usize,
    pad_id: i64,
}

impl Batches {
    pub fn new(
        examples: Vec<Example>,
        classes: Arc<[String]>,
        batch_size: usize,
        max_seq_len: usize,
        vocab_size: usize,
        pad_id: i64,
    ) -> Self {
        Self {
            examples,
            classes,
            batch_size: batch_size.max(1),
            max_seq_len,
            vocab_size,
            pad_id,
        }
    }

    /// Number of examples.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_seq_len(&self) -> usize {
        self.max_seq_len
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn pad_id(&self) -> i64 {
        self.pad_id
    }

    pub fn num_batches(&self) -> usize {
        self.examples.len().div_ceil(self.batch_size)
    }

    pub fn iter(&self) -> impl Iterator<Item = Batch> + '_ {
        self.examples
            .chunks(self.batch_size)
            .map(|chunk| Batch::from_examples(chunk, self.max_seq_len, self.pad_id))
    }
}
