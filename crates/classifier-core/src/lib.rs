pub mod attention;
pub mod config;
pub mod profile;
pub mod safetensors_util;
pub mod transformer;

pub use config::ClassifierConfig;
pub use profile::{profile, MacCounter, ProfileReport};
pub use safetensors_util::LoadReport;
pub use transformer::{ClassifierOutput, SequenceClassifier, CONFIG_FILE, WEIGHTS_FILE};
