use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DataError, Result};

/// One labelled line of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub text: String,
    pub label: String,
}

/// The full labelled corpus, in file order, with its sorted label set.
#[derive(Debug, Clone)]
pub struct Corpus {
    records: Vec<Record>,
    classes: Vec<String>,
}

impl Corpus {
    /// Reads a `text,label` CSV file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let csv_err = |source| DataError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let mut reader = csv::Reader::from_path(path).map_err(csv_err)?;
        let records = reader
            .deserialize()
            .collect::<std::result::Result<Vec<Record>, _>>()
            .map_err(csv_err)?;

        let corpus = Self::from_records(records)?;
        log::info!(
            "Loaded {} examples in {} classes from {:?}",
            corpus.len(),
            corpus.classes.len(),
            path
        );
        Ok(corpus)
    }

    /// Builds a corpus, dropping records whose text is blank.
    pub fn from_records(records: Vec<Record>) -> Result<Self> {
        let records: Vec<Record> = records
            .into_iter()
            .filter(|r| !r.text.trim().is_empty())
            .collect();
        if records.is_empty() {
            return Err(DataError::EmptyCorpus);
        }

        let mut classes: Vec<String> = records.iter().map(|r| r.label.clone()).collect();
        classes.sort();
        classes.dedup();

        Ok(Self { records, classes })
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Distinct labels, sorted. A label's position is its class index.
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn label_index(&self, label: &str) -> Option<usize> {
        self.classes.binary_search_by(|c| c.as_str().cmp(label)).ok()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
