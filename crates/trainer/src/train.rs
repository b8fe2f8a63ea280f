use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use tch::{nn, nn::OptimizerConfig, Device};

use classifier_core::SequenceClassifier;
use eurolang::Batches;

pub(crate) fn progress_bar(len: usize, desc: &str) -> Result<ProgressBar> {
    let pb = ProgressBar::new(len as u64);
    pb.set_style(
        ProgressStyle::with_template("{prefix}: {percent:>3}%|{bar:40}| {pos}/{len} [{elapsed_precise}] {msg}")?
            .progress_chars("█▉ "),
    );
    pb.set_prefix(desc.to_string());
    Ok(pb)
}

/// Owns a classifier and its optimizer for the duration of training.
pub struct Trainer {
    model: SequenceClassifier,
    optimizer: nn::Optimizer,
    device: Device,
}

impl Trainer {
    pub fn new(model: SequenceClassifier, learning_rate: f64) -> Result<Self> {
        let optimizer = nn::AdamW::default().build(model.var_store(), learning_rate)?;
        let device = model.device();

        Ok(Self {
            model,
            optimizer,
            device,
        })
    }

    /// One pass over `source` in training mode. Returns the mean batch loss
    /// (0.0 for an empty source).
    pub fn train_epoch(&mut self, source: &Batches) -> Result<f64> {
        let pb = progress_bar(source.num_batches(), "Training")?;
        let mut total_loss = 0.0;
        let mut steps = 0usize;

        for batch in source.iter() {
            let samples = batch.input_ids.to(self.device);
            let labels = batch.labels.to(self.device);

            self.optimizer.zero_grad();
            let outputs = self.model.forward_t(&samples, Some(&labels), true);
            let loss = outputs
                .loss
                .context("classifier returned no loss for a labelled batch")?;
            loss.backward();
            self.optimizer.step();

            let loss_val = loss.double_value(&[]);
            total_loss += loss_val;
            steps += 1;

            pb.set_message(format!("loss {:.4}", loss_val));
            pb.inc(1);
        }
        pb.finish_and_clear();

        let mean = if steps == 0 { 0.0 } else { total_loss / steps as f64 };
        log::info!("Trained {} batches ({} examples), mean loss {:.4}", steps, source.len(), mean);
        Ok(mean)
    }

    pub fn model(&self) -> &SequenceClassifier {
        &self.model
    }

    pub fn into_model(self) -> SequenceClassifier {
        self.model
    }
}
