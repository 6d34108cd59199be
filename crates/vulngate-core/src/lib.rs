pub mod artifacts;
pub mod collector;
pub mod config;
pub mod error;
pub mod features;
pub mod notifier;
pub mod scan;

pub use artifacts::{ArtifactBundle, ArtifactPaths};
pub use artifacts::classifier::{Classifier, Prediction};
pub use artifacts::encoder::{ExtensionCategory, ExtensionEncoder};
pub use artifacts::vectorizer::TextVectorizer;
pub use collector::{CandidateFile, FileCollector};
pub use config::GateConfig;
pub use error::{ArtifactError, FileError, ModelError, ScanError};
pub use features::{FeatureExtractor, FeatureRow};
pub use scan::report::{ScanReport, Verdict};
pub use scan::{run_gate, ScanOutcome, Scanner};
