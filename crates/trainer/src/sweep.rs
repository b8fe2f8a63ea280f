use anyhow::Result;

use eurolang::DataProvider;

use crate::config::{RunConfig, DATA_SIZE_STEM};
use crate::report::{csv_path, DataSizeRow, ResultsTable};
use crate::runner::ModelRunner;

/// Trains and evaluates once per fraction in `config.sweep`, skipping
/// fractions already recorded, and persists the sorted table.
pub fn data_size_experiment<P, M>(config: &RunConfig, provider: &P, runner: &mut M) -> Result<ResultsTable<DataSizeRow>>
where
    P: DataProvider + ?Sized,
    M: ModelRunner + ?Sized,
{
    log::info!("Running data size experiment...");

    let cached = csv_path(&config.output_dir, DATA_SIZE_STEM);
    let mut table = if config.use_cache && cached.exists() {
        log::info!("Using cached data for data size experiment from {:?}", cached);
        ResultsTable::load(&cached)?
    } else {
        ResultsTable::new()
    };

    for &size in &config.sweep {
        if table.contains_key(&size) {
            log::info!("Skipping {}% data size experiment; already ran.", size * 100.0);
            continue;
        }

        let point = config.with_subset(size);
        let splits = provider.splits(&point.data)?;
        let examples = splits.train.len() as u64;
        log::info!("Training with {}% of the dataset ({} examples)", size * 100.0, examples);

        let accuracy = runner.run_model(&splits.train, &splits.test)?;
        table.push(DataSizeRow {
            examples,
            dataset_pct: size,
            accuracy,
        });
    }

    table.sort();
    table.persist(&config.output_dir, DATA_SIZE_STEM)?;
    Ok(table)
}
