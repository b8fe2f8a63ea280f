use anyhow::{Context, Result};

use eurolang::{DataProvider, EurolangProvider};

use crate::cache::ModelCache;
use crate::config::{Experiment, RunConfig};
use crate::flop::flop_analysis;
use crate::report::{DataSizeRow, FlopRow, ResultsTable};
use crate::runner::{ModelRunner, TorchRunner};
use crate::sweep::data_size_experiment;

/// What a run produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Baseline { accuracy: f64 },
    DataSize(ResultsTable<DataSizeRow>),
    Flop(ResultsTable<FlopRow>),
}

/// Loads the splits for `config` once and runs the selected experiment.
///
/// `all` is accepted but only runs the baseline.
pub fn run<P, M>(config: &RunConfig, provider: &P, runner: &mut M) -> Result<Outcome>
where
    P: DataProvider + ?Sized,
    M: ModelRunner + ?Sized,
{
    let splits = provider.splits(&config.data)?;
    log::debug!(
        "Loaded splits: {} train, {} validation, {} test",
        splits.train.len(),
        splits.validation.len(),
        splits.test.len()
    );

    match config.experiment {
        Experiment::Baseline | Experiment::All => {
            if config.experiment == Experiment::All {
                log::warn!("Experiment 'all' runs the baseline only; select data-size or flop explicitly");
            }
            let accuracy = runner.run_model(&splits.train, &splits.test)?;
            Ok(Outcome::Baseline { accuracy })
        }
        Experiment::DataSize => data_size_experiment(config, provider, runner).map(Outcome::DataSize),
        Experiment::Flop => flop_analysis(config, provider, runner).map(Outcome::Flop),
    }
}

/// Entry point of the binary: builds the real provider and runner for
/// `config` and dispatches.
pub fn run_experiment(config: &RunConfig) -> Result<Outcome> {
    config.validate()?;

    let device = config.device.resolve()?;
    log::info!("Using {:?} device", device);

    let provider = EurolangProvider::open(&config.data, &config.tokenizer_path())
        .with_context(|| format!("Failed to prepare data from {:?}", config.data.corpus_path()))?;
    let mut runner = TorchRunner::new(ModelCache::new(config), device);

    let outcome = run(config, &provider, &mut runner)?;
    match &outcome {
        Outcome::Baseline { accuracy } => log::info!("Baseline finished with accuracy {:.4}", accuracy),
        Outcome::DataSize(table) => log::info!(
            "Data size experiment finished with {} rows in {:?}",
            table.len(),
            config.output_dir
        ),
        Outcome::Flop(table) => log::info!("Flop analysis finished with {} rows in {:?}", table.len(), config.output_dir),
    }
    Ok(outcome)
}
