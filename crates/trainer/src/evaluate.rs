use anyhow::{bail, Result};
use tch::{Device, Kind, Tensor};

use classifier_core::SequenceClassifier;
use eurolang::Batches;

use crate::cache::ModelCache;
use crate::train::progress_bar;

/// Micro-averaged multiclass accuracy: correct predictions over all predictions.
#[derive(Debug, Clone, PartialEq)]
pub struct MulticlassAccuracy {
    num_classes: i64,
    correct: i64,
    total: i64,
}

impl MulticlassAccuracy {
    pub fn new(num_classes: usize) -> Self {
        Self {
            num_classes: num_classes as i64,
            correct: 0,
            total: 0,
        }
    }

    pub fn update(&mut self, predictions: &Tensor, target: &Tensor) -> Result<()> {
        if predictions.size() != target.size() {
            bail!(
                "prediction shape {:?} does not match target shape {:?}",
                predictions.size(),
                target.size()
            );
        }
        if target.numel() == 0 {
            return Ok(());
        }

        let target = target.to_device(predictions.device());
        let (lo, hi) = (target.min().int64_value(&[]), target.max().int64_value(&[]));
        if lo < 0 || hi >= self.num_classes {
            bail!("target label {} outside 0..{}", if lo < 0 { lo } else { hi }, self.num_classes);
        }

        self.correct += predictions.eq_tensor(&target).sum(Kind::Int64).int64_value(&[]);
        self.total += target.numel() as i64;
        Ok(())
    }

    /// Accuracy so far, 0.0 before any update.
    pub fn compute(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.correct as f64 / self.total as f64
        }
    }

    pub fn reset(&mut self) {
        self.correct = 0;
        self.total = 0;
    }
}

/// Accuracy of `model` on `test`, evaluated without gradients and with
/// dropout disabled.
pub fn evaluate(model: &SequenceClassifier, test: &Batches) -> Result<f64> {
    let device = model.device();
    let mut accuracy = MulticlassAccuracy::new(model.config.num_labels as usize);
    let pb = progress_bar(test.num_batches(), "Testing")?;

    tch::no_grad(|| -> Result<()> {
        for batch in test.iter() {
            let samples = batch.input_ids.to(device);
            let labels = batch.labels.to(device);

            let outputs = model.forward_t(&samples, None, false);
            let predictions = outputs.logits.argmax(-1, false);
            accuracy.update(&predictions, &labels)?;
            pb.inc(1);
        }
        Ok(())
    })?;
    pb.finish_and_clear();

    Ok(accuracy.compute())
}

/// Gets a model for `train` from the cache (training it on a miss) and
/// returns its accuracy on `test`.
pub fn run_model(cache: &ModelCache, train: &Batches, test: &Batches, device: Device) -> Result<f64> {
    let cached = cache.get_trained_model(train, device)?;
    let acc = evaluate(&cached.model, test)?;
    println!("Testing accuracy of {:.3}%", acc * 100.0);
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{tiny_model_config, toy_batches};

    #[test]
    fn accuracy_counts_matches_over_all_updates() {
        let mut acc = MulticlassAccuracy::new(3);
        acc.update(&Tensor::from_slice(&[0i64, 1, 2]), &Tensor::from_slice(&[0i64, 1, 1]))
            .unwrap();
        acc.update(&Tensor::from_slice(&[2i64]), &Tensor::from_slice(&[2i64]))
            .unwrap();
        assert_eq!(acc.compute(), 0.75);

        acc.reset();
        assert_eq!(acc.compute(), 0.0);
    }

    #[test]
    fn accuracy_rejects_out_of_range_labels() {
        let mut acc = MulticlassAccuracy::new(2);
        let result = acc.update(&Tensor::from_slice(&[0i64]), &Tensor::from_slice(&[5i64]));
        assert!(result.is_err());
    }

    #[test]
    fn evaluation_is_within_unit_interval_and_deterministic() {
        let test = toy_batches(9, 4);
        let model = SequenceClassifier::new(&tiny_model_config(&test), Device::Cpu).unwrap();

        let first = evaluate(&model, &test).unwrap();
        let second = evaluate(&model, &test).unwrap();
        assert!((0.0..=1.0).contains(&first));
        assert_eq!(first, second);
    }

    #[test]
    fn empty_test_source_scores_zero() {
        let test = toy_batches(0, 4);
        let model = SequenceClassifier::new(&tiny_model_config(&toy_batches(3, 4)), Device::Cpu).unwrap();
        assert_eq!(evaluate(&model, &test).unwrap(), 0.0);
    }
}
