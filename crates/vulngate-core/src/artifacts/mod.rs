pub mod classifier;
pub mod encoder;
pub mod vectorizer;

use crate::error::{ArtifactError, ArtifactKind};
use classifier::{Classifier, ClassifierSpec};
use encoder::{ExtensionEncoder, LabelEncoder, LabelEncoderSpec};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use vectorizer::{TermVectorizer, TextVectorizer, VectorizerSpec};

pub const CLASSIFIER_FILE: &str = "vulnerability_detector.json";
pub const VECTORIZER_FILE: &str = "vectorizer_detector.json";
pub const ENCODER_FILE: &str = "language_encoder.json";

/// Locations of the three trained artifacts.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub classifier: PathBuf,
    pub vectorizer: PathBuf,
    pub encoder: PathBuf,
}

impl ArtifactPaths {
    /// Standard file names inside a models directory.
    pub fn in_dir(dir: &Path) -> Self {
        Self {
            classifier: dir.join(CLASSIFIER_FILE),
            vectorizer: dir.join(VECTORIZER_FILE),
            encoder: dir.join(ENCODER_FILE),
        }
    }
}

/// Optional SHA-256 pins (hex) for each artifact.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChecksumPins {
    #[serde(default)]
    pub classifier: Option<String>,
    #[serde(default)]
    pub vectorizer: Option<String>,
    #[serde(default)]
    pub encoder: Option<String>,
}

/// The loaded classifier, vectorizer and encoder.
///
/// Built once, then shared read-only by every file evaluation.
pub struct ArtifactBundle {
    classifier: Box<dyn Classifier>,
    vectorizer: Box<dyn TextVectorizer>,
    encoder: Box<dyn ExtensionEncoder>,
}

impl std::fmt::Debug for ArtifactBundle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactBundle")
            .field("classifier", &self.classifier.describe())
            .field("vocabulary_size", &self.vectorizer.dimension())
            .field("encoder_classes", &self.encoder.classes())
            .finish()
    }
}

impl ArtifactBundle {
    /// Assemble a bundle from already-built parts, checking that the
    /// classifier accepts rows of the width the vectorizer produces.
    pub fn new(
        classifier: Box<dyn Classifier>,
        vectorizer: Box<dyn TextVectorizer>,
        encoder: Box<dyn ExtensionEncoder>,
    ) -> Result<Self, ArtifactError> {
        let expected = vectorizer.dimension() + 1;
        if classifier.n_features() != expected {
            return Err(ArtifactError::Incompatible {
                classifier: classifier.n_features(),
                vectorizer: vectorizer.dimension(),
            });
        }
        Ok(Self {
            classifier,
            vectorizer,
            encoder,
        })
    }

    /// Load and validate all three artifacts. Any failure is fatal.
    pub fn load(paths: &ArtifactPaths, pins: &ChecksumPins) -> Result<Self, ArtifactError> {
        tracing::info!(
            classifier = %paths.classifier.display(),
            vectorizer = %paths.vectorizer.display(),
            encoder = %paths.encoder.display(),
            "loading artifacts"
        );

        let classifier_spec: ClassifierSpec = read_artifact(
            ArtifactKind::Classifier,
            &paths.classifier,
            pins.classifier.as_deref(),
        )?;
        let vectorizer_spec: VectorizerSpec = read_artifact(
            ArtifactKind::Vectorizer,
            &paths.vectorizer,
            pins.vectorizer.as_deref(),
        )?;
        let encoder_spec: LabelEncoderSpec = read_artifact(
            ArtifactKind::Encoder,
            &paths.encoder,
            pins.encoder.as_deref(),
        )?;

        let bundle = Self::new(
            classifier::from_spec(classifier_spec)?,
            Box::new(TermVectorizer::from_spec(vectorizer_spec)?),
            Box::new(LabelEncoder::from_spec(encoder_spec)?),
        )?;

        tracing::info!(
            model = %bundle.classifier.describe(),
            vocabulary = bundle.vectorizer.dimension(),
            languages = bundle.encoder.classes().len(),
            "artifacts loaded"
        );
        Ok(bundle)
    }

    pub fn classifier(&self) -> &dyn Classifier {
        self.classifier.as_ref()
    }

    pub fn vectorizer(&self) -> &dyn TextVectorizer {
        self.vectorizer.as_ref()
    }

    pub fn encoder(&self) -> &dyn ExtensionEncoder {
        self.encoder.as_ref()
    }

    pub fn summary(&self) -> BundleSummary {
        BundleSummary {
            model: self.classifier.describe(),
            vocabulary_size: self.vectorizer.dimension(),
            row_width: self.vectorizer.dimension() + 1,
            encoder_classes: self.encoder.classes().to_vec(),
        }
    }
}

/// Human-facing description of a loaded bundle.
#[derive(Debug, Clone, Serialize)]
pub struct BundleSummary {
    pub model: String,
    pub vocabulary_size: usize,
    pub row_width: usize,
    pub encoder_classes: Vec<String>,
}

fn read_artifact<T: DeserializeOwned>(
    kind: ArtifactKind,
    path: &Path,
    pin: Option<&str>,
) -> Result<T, ArtifactError> {
    let bytes = std::fs::read(path).map_err(|source| ArtifactError::Read {
        kind,
        path: path.to_path_buf(),
        source,
    })?;

    if let Some(expected) = pin {
        let actual = hex::encode(Sha256::digest(&bytes));
        if !actual.eq_ignore_ascii_case(expected.trim()) {
            return Err(ArtifactError::Checksum {
                kind,
                path: path.to_path_buf(),
                expected: expected.trim().to_string(),
                actual,
            });
        }
    }

    serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Decode {
        kind,
        path: path.to_path_buf(),
        source,
    })
}
