pub mod cache;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod evaluate;
pub mod flop;
pub mod report;
pub mod runner;
pub mod sweep;
pub mod train;

#[cfg(test)]
pub(crate) mod test_support;

pub use cache::{CacheManifest, CachedModel, ModelCache, ModelOrigin};
pub use cli::Cli;
pub use config::{DeviceChoice, Experiment, RunConfig};
pub use dispatch::{run, run_experiment, Outcome};
pub use evaluate::{evaluate, run_model, MulticlassAccuracy};
pub use flop::flop_analysis;
pub use report::{DataSizeRow, FlopRow, ResultsTable, TableRow};
pub use runner::{ModelRunner, TorchRunner};
pub use sweep::data_size_experiment;
pub use train::Trainer;
