mod common;

use std::fs;
use tempfile::TempDir;

use common::{fake_config, FakeProvider, FakeRunner};
use trainer::report::csv_path;
use trainer::{data_size_experiment, flop_analysis, run, DataSizeRow, Experiment, FlopRow, Outcome, ResultsTable};

const SIZES_CSV: &str = "deeplearning_data_size.csv";
const FLOP_CSV: &str = "flop_analysis.csv";

#[test]
fn sweep_on_empty_table_adds_sorted_rows() {
    let dir = TempDir::new().unwrap();
    let mut config = fake_config(&dir.path().join("out"));
    config.sweep = vec![0.001, 0.0001];
    let provider = FakeProvider { train_examples: 8000 };
    let mut runner = FakeRunner::default();

    let table = data_size_experiment(&config, &provider, &mut runner).unwrap();

    let pcts: Vec<f64> = table.rows().iter().map(|r| r.dataset_pct).collect();
    assert_eq!(pcts, vec![0.0001, 0.001]);
    assert_eq!(table.rows()[0].examples, 1);
    assert_eq!(table.rows()[1].examples, 8);
    for row in table.rows() {
        assert!(row.examples > 0);
        assert!((0.0..=1.0).contains(&row.accuracy));
    }

    assert!(config.output_dir.join(SIZES_CSV).exists());
    assert!(config.output_dir.join("deeplearning_data_size.tex").exists());
}

#[test]
fn cached_sweep_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let mut config = fake_config(dir.path());
    let provider = FakeProvider { train_examples: 500 };

    let mut first = FakeRunner::default();
    data_size_experiment(&config, &provider, &mut first).unwrap();
    assert_eq!(first.trained_on.len(), config.sweep.len());
    let before = fs::read(dir.path().join(SIZES_CSV)).unwrap();

    config.use_cache = true;
    let mut second = FakeRunner::default();
    let table = data_size_experiment(&config, &provider, &mut second).unwrap();

    assert!(second.trained_on.is_empty());
    assert_eq!(table.len(), config.sweep.len());
    assert_eq!(fs::read(dir.path().join(SIZES_CSV)).unwrap(), before);
}

#[test]
fn resume_only_runs_missing_fractions() {
    let dir = TempDir::new().unwrap();
    let mut config = fake_config(dir.path());
    config.use_cache = true;
    config.sweep = vec![0.1, 0.5];
    let provider = FakeProvider { train_examples: 100 };

    data_size_experiment(&config, &provider, &mut FakeRunner::default()).unwrap();
    let earlier = ResultsTable::<DataSizeRow>::load(csv_path(dir.path(), "deeplearning_data_size")).unwrap();

    config.sweep = vec![0.1, 0.2, 0.5];
    let mut runner = FakeRunner::default();
    let table = data_size_experiment(&config, &provider, &mut runner).unwrap();

    assert_eq!(runner.trained_on, vec![20]);
    assert_eq!(table.len(), 3);
    assert_eq!(table.rows()[0], earlier.rows()[0]);
    assert_eq!(table.rows()[1].dataset_pct, 0.2);
    assert_eq!(table.rows()[2], earlier.rows()[1]);
}

#[test]
fn existing_table_is_ignored_without_cache() {
    let dir = TempDir::new().unwrap();
    let mut config = fake_config(dir.path());
    config.sweep = vec![0.5];
    let provider = FakeProvider { train_examples: 10 };

    data_size_experiment(&config, &provider, &mut FakeRunner::default()).unwrap();
    let mut runner = FakeRunner::default();
    let table = data_size_experiment(&config, &provider, &mut runner).unwrap();

    assert_eq!(runner.trained_on, vec![5]);
    assert_eq!(table.len(), 1);
}

#[test]
fn all_runs_only_the_baseline() {
    let dir = TempDir::new().unwrap();
    let mut config = fake_config(dir.path());
    config.experiment = Experiment::All;
    let provider = FakeProvider { train_examples: 40 };
    let mut runner = FakeRunner::default();

    let outcome = run(&config, &provider, &mut runner).unwrap();

    assert!(matches!(outcome, Outcome::Baseline { accuracy } if (0.0..=1.0).contains(&accuracy)));
    assert_eq!(runner.trained_on, vec![40]);
    assert!(runner.profiled.is_empty());
    assert!(!dir.path().join(SIZES_CSV).exists());
    assert!(!dir.path().join(FLOP_CSV).exists());
}

#[test]
fn baseline_uses_configured_subset() {
    let dir = TempDir::new().unwrap();
    let config = fake_config(dir.path()).with_subset(0.25);
    let provider = FakeProvider { train_examples: 40 };
    let mut runner = FakeRunner::default();

    run(&config, &provider, &mut runner).unwrap();
    assert_eq!(runner.trained_on, vec![10]);
}

#[test]
fn flop_analysis_uses_full_training_split() {
    let dir = TempDir::new().unwrap();
    let config = fake_config(dir.path()).with_subset(0.1);
    let provider = FakeProvider { train_examples: 300 };
    let mut runner = FakeRunner {
        macs: 500,
        ..Default::default()
    };

    let table = flop_analysis(&config, &provider, &mut runner).unwrap();

    assert_eq!(runner.trained_on, vec![300]);
    assert_eq!(runner.profiled.len(), 1);
    assert_eq!(runner.profiled[0].first(), Some(&2));
    assert_eq!(
        table.rows(),
        &[FlopRow {
            model: config.model.name.clone(),
            parameters: 1234,
            flops: 1000,
        }]
    );
}

#[test]
fn flop_rows_are_overwritten_per_model() {
    let dir = TempDir::new().unwrap();
    let config = fake_config(dir.path());
    let provider = FakeProvider { train_examples: 30 };

    let mut seeded = ResultsTable::new();
    seeded.push(FlopRow {
        model: "zz-other".to_string(),
        parameters: 1,
        flops: 2,
    });
    seeded.push(FlopRow {
        model: config.model.name.clone(),
        parameters: 9,
        flops: 9,
    });
    seeded.persist(dir.path(), "flop_analysis").unwrap();

    let mut runner = FakeRunner {
        macs: 21,
        ..Default::default()
    };
    let table = flop_analysis(&config, &provider, &mut runner).unwrap();

    let models: Vec<&str> = table.rows().iter().map(|r| r.model.as_str()).collect();
    assert_eq!(models, vec![config.model.name.as_str(), "zz-other"]);
    assert_eq!(table.rows()[0].flops, 42);

    let on_disk = ResultsTable::<FlopRow>::load(dir.path().join(FLOP_CSV)).unwrap();
    assert_eq!(on_disk, table);
}
