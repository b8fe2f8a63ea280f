//! Result tables persisted next to the model artifacts.
//!
//! Every table is written twice from the same rows: a CSV that later runs
//! read back to resume, and a booktabs LaTeX fragment for the write-up.

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fs;
use std::path::{Path, PathBuf};

/// A row of a [`ResultsTable`], identified by one key column.
pub trait TableRow: Serialize + DeserializeOwned + Clone {
    type Key: PartialOrd;

    /// Column names, in order, as they appear in both output formats.
    const HEADERS: &'static [&'static str];

    fn key(&self) -> Self::Key;

    /// Cell texts for the LaTeX rendering, unescaped.
    fn latex_cells(&self) -> Vec<String>;
}

/// Accuracy of a model trained on a fraction of the training split.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataSizeRow {
    #[serde(rename = "Examples")]
    pub examples: u64,
    #[serde(rename = "Dataset Pct.")]
    pub dataset_pct: f64,
    #[serde(rename = "Accuracy")]
    pub accuracy: f64,
}

impl TableRow for DataSizeRow {
    type Key = f64;
    const HEADERS: &'static [&'static str] = &["Examples", "Dataset Pct.", "Accuracy"];

    fn key(&self) -> f64 {
        self.dataset_pct
    }

    fn latex_cells(&self) -> Vec<String> {
        vec![
            self.examples.to_string(),
            format!("{:.4}", self.dataset_pct),
            format!("{:.4}", self.accuracy),
        ]
    }
}

/// Inference cost of one model on the probe sentence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlopRow {
    #[serde(rename = "Model")]
    pub model: String,
    #[serde(rename = "Parameters")]
    pub parameters: u64,
    #[serde(rename = "FLOPs")]
    pub flops: u64,
}

impl TableRow for FlopRow {
    type Key = String;
    const HEADERS: &'static [&'static str] = &["Model", "Parameters", "FLOPs"];

    fn key(&self) -> String {
        self.model.clone()
    }

    fn latex_cells(&self) -> Vec<String> {
        vec![self.model.clone(), self.parameters.to_string(), self.flops.to_string()]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResultsTable<R> {
    rows: Vec<R>,
}

impl<R> Default for ResultsTable<R> {
    fn default() -> Self {
        Self { rows: Vec::new() }
    }
}

impl<R: TableRow> ResultsTable<R> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a table previously written by [`persist`](Self::persist).
    /// When a key appears more than once, its last row wins.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path).with_context(|| format!("Failed to open table {:?}", path))?;
        let rows = reader
            .deserialize()
            .collect::<std::result::Result<Vec<R>, _>>()
            .with_context(|| format!("Failed to parse table {:?}", path))?;

        let read = rows.len();
        let mut table = Self::new();
        for row in rows {
            table.upsert(row);
        }
        if table.len() < read {
            log::warn!("Dropped {} duplicate rows from {:?}", read - table.len(), path);
        }
        Ok(table)
    }

    pub fn rows(&self) -> &[R] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn contains_key(&self, key: &R::Key) -> bool {
        self.rows.iter().any(|row| row.key() == *key)
    }

    pub fn push(&mut self, row: R) {
        self.rows.push(row);
    }

    /// Replaces every row sharing `row`'s key with `row`.
    pub fn upsert(&mut self, row: R) {
        let key = row.key();
        self.rows.retain(|existing| existing.key() != key);
        self.rows.push(row);
    }

    /// Stable ascending sort by key.
    pub fn sort(&mut self) {
        self.rows
            .sort_by(|a, b| a.key().partial_cmp(&b.key()).unwrap_or(Ordering::Equal));
    }

    pub fn to_csv(&self) -> Result<String> {
        let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(Vec::new());
        writer.write_record(R::HEADERS)?;
        for row in &self.rows {
            writer.serialize(row)?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| anyhow::anyhow!("Failed to flush CSV writer: {}", e.error()))?;
        Ok(String::from_utf8(bytes)?)
    }

    pub fn to_latex(&self) -> String {
        let line = |cells: Vec<String>| {
            let cells: Vec<String> = cells.iter().map(|c| escape_latex(c)).collect();
            format!("{} \\\\\n", cells.join(" & "))
        };

        let mut out = format!("\\begin{{tabular}}{{{}}}\n\\toprule\n", "c".repeat(R::HEADERS.len()));
        out.push_str(&line(R::HEADERS.iter().map(|h| h.to_string()).collect()));
        out.push_str("\\midrule\n");
        for row in &self.rows {
            out.push_str(&line(row.latex_cells()));
        }
        out.push_str("\\bottomrule\n\\end{tabular}\n");
        out
    }

    /// Writes `<stem>.csv` and `<stem>.tex` under `dir`, creating it if needed.
    pub fn persist(&self, dir: &Path, stem: &str) -> Result<()> {
        fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;
        write_atomic(&dir.join(format!("{}.csv", stem)), &self.to_csv()?)?;
        write_atomic(&dir.join(format!("{}.tex", stem)), &self.to_latex())?;
        Ok(())
    }
}

pub fn csv_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}.csv", stem))
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);

    fs::write(&tmp, content).with_context(|| format!("Failed to write {:?}", tmp))?;
    fs::rename(&tmp, path).with_context(|| format!("Failed to move {:?} into place", path))?;
    Ok(())
}

fn escape_latex(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\textbackslash{}"),
            '~' => out.push_str("\\textasciitilde{}"),
            '^' => out.push_str("\\textasciicircum{}"),
            '&' | '%' | '$' | '#' | '_' | '{' | '}' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}
