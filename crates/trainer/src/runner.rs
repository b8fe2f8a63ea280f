use anyhow::Result;
use tch::{Device, Tensor};

use classifier_core::ProfileReport;
use eurolang::Batches;

use crate::cache::ModelCache;
use crate::evaluate;

/// The model-facing half of an experiment: train-or-reuse, then measure.
/// Sweeps and the cost analysis only talk to this trait.
pub trait ModelRunner {
    /// Accuracy in `[0, 1]` on `test` of a model trained on `train`.
    fn run_model(&mut self, train: &Batches, test: &Batches) -> Result<f64>;

    /// Cost of one inference pass over `probe` with a model trained on `train`.
    fn profile_model(&mut self, train: &Batches, probe: &[i64]) -> Result<ProfileReport>;
}

/// Runs real `tch` models through the on-disk cache.
pub struct TorchRunner {
    cache: ModelCache,
    device: Device,
}

impl TorchRunner {
    pub fn new(cache: ModelCache, device: Device) -> Self {
        Self { cache, device }
    }

    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

impl ModelRunner for TorchRunner {
    fn run_model(&mut self, train: &Batches, test: &Batches) -> Result<f64> {
        evaluate::run_model(&self.cache, train, test, self.device)
    }

    fn profile_model(&mut self, train: &Batches, probe: &[i64]) -> Result<ProfileReport> {
        let cached = self.cache.get_trained_model(train, self.device)?;
        let input_ids = Tensor::from_slice(probe).unsqueeze(0).to(self.device);
        Ok(classifier_core::profile(&cached.model, &input_ids))
    }
}
