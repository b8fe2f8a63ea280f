use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Tokenizer error: {0}")]
    Tokenizer(#[from] tokenizer::TokenizerError),

    #[error("Corpus contains no usable examples")]
    EmptyCorpus,

    #[error("Invalid data option: {0}")]
    InvalidOption(String),
}

pub type Result<T> = std::result::Result<T, DataError>;
