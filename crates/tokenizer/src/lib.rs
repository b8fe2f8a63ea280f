pub mod bpe;
pub mod error;
pub mod trainer;
pub mod vocab;

pub use bpe::{SpecialTokens, BPE};
pub use error::TokenizerError;
pub use trainer::Trainer;
pub use vocab::Vocab;
