use anyhow::{bail, Context, Result};
use clap::Parser;
use env_logger::Env;
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::Serialize;

/// One row of the corpus CSV.
#[derive(Serialize)]
struct Record<'a> {
    text: &'a str,
    label: &'a str,
}

/// Builds the `text,label` corpus CSV from one `<label>.txt` file per language.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding `<label>.txt` files, one sentence per line
    #[arg(short, long)]
    input_dir: PathBuf,

    /// Corpus CSV to write
    #[arg(short, long, default_value = "data/eurolang.csv")]
    output: PathBuf,

    /// Lines shorter than this many characters are dropped
    #[arg(long, default_value_t = 1)]
    min_chars: usize,
}

fn label_files(dir: &Path) -> Result<Vec<(String, PathBuf)>> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to list {:?}", dir))? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        if let Some(label) = path.file_stem().and_then(|s| s.to_str()) {
            files.push((label.to_string(), path.clone()));
        }
    }
    files.sort();
    Ok(files)
}

/// Writes every kept line of `files` as a `text,label` row and returns the row count.
fn write_corpus(files: &[(String, PathBuf)], output: &Path, min_chars: usize) -> Result<usize> {
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut writer = csv::Writer::from_path(output).with_context(|| format!("Failed to create {:?}", output))?;

    let mut total = 0usize;
    for (label, path) in files {
        let reader = BufReader::new(File::open(path).with_context(|| format!("Failed to open {:?}", path))?);
        let mut kept = 0usize;
        for line in reader.lines() {
            let line = line?;
            let text = line.trim();
            if text.chars().count() < min_chars.max(1) {
                continue;
            }
            writer.serialize(Record { text, label })?;
            kept += 1;
        }
        log::info!("{}: {} lines", label, kept);
        total += kept;
    }
    writer.flush()?;
    Ok(total)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let files = label_files(&cli.input_dir)?;
    if files.is_empty() {
        bail!("no <label>.txt files found in {:?}", cli.input_dir);
    }

    let total = write_corpus(&files, &cli.output, cli.min_chars)?;
    println!("Done. Wrote {} examples in {} classes to {:?}.", total, files.len(), cli.output);
    Ok(())
}
