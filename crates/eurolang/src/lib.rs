//! Eurolang language-identification data: corpus loading, deterministic
//! splits and tokenised batches.

pub mod corpus;
pub mod dataset;
pub mod error;
pub mod provider;

pub use corpus::{Corpus, Record};
pub use dataset::{Batch, Batches, Example};
pub use error::{DataError, Result};
pub use provider::{DataOptions, DataProvider, EurolangProvider, Splits};
