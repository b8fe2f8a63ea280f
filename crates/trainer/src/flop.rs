use anyhow::Result;

use eurolang::DataProvider;

use crate::config::{RunConfig, FLOP_STEM};
use crate::report::{csv_path, FlopRow, ResultsTable};
use crate::runner::ModelRunner;

/// Measures single-sample inference cost of the model trained on the full
/// training split and records it under the configured model name.
pub fn flop_analysis<P, M>(config: &RunConfig, provider: &P, runner: &mut M) -> Result<ResultsTable<FlopRow>>
where
    P: DataProvider + ?Sized,
    M: ModelRunner + ?Sized,
{
    log::info!("Running flop analysis experiment...");

    let full = config.with_subset(1.0);
    let splits = provider.splits(&full.data)?;
    let probe = provider.encode_probe(&full.probe_text, &full.data);

    let report = runner.profile_model(&splits.train, &probe)?;
    let flops = report.flops();
    println!("Flops: {}", flops);
    println!("Params: {}", report.params);

    let cached = csv_path(&config.output_dir, FLOP_STEM);
    let mut table = if cached.exists() {
        log::info!("Merging into existing flop table {:?}", cached);
        ResultsTable::load(&cached)?
    } else {
        ResultsTable::new()
    };

    table.upsert(FlopRow {
        model: config.model.name.clone(),
        parameters: report.params,
        flops,
    });
    table.sort();
    table.persist(&config.output_dir, FLOP_STEM)?;
    Ok(table)
}
