use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenizerError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("Cannot train a tokenizer on an empty corpus")]
    EmptyCorpus,

    #[error("Special token missing from vocabulary: {0}")]
    MissingSpecialToken(String),
}

pub type Result<T> = std::result::Result<T, TokenizerError>;
