use std::path::PathBuf;
use thiserror::Error;

/// Which of the three trained artifacts an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum ArtifactKind {
    Classifier,
    Vectorizer,
    Encoder,
}

impl ArtifactKind {
    pub fn label(&self) -> &str {
        match self {
            ArtifactKind::Classifier => "classifier",
            ArtifactKind::Vectorizer => "text vectorizer",
            ArtifactKind::Encoder => "extension encoder",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure to load or validate the artifact bundle. Always fatal.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {kind} artifact '{}': {source}", path.display())]
    Read {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{kind} artifact '{}' is not valid: {source}", path.display())]
    Decode {
        kind: ArtifactKind,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{kind} artifact '{}' failed its integrity check (expected sha256 {expected}, found {actual})", path.display())]
    Checksum {
        kind: ArtifactKind,
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("{kind} artifact is malformed: {reason}")]
    Invalid { kind: ArtifactKind, reason: String },

    #[error("classifier expects {classifier} features but vectorizer produces {vectorizer} + 1 extension column")]
    Incompatible { classifier: usize, vectorizer: usize },
}

impl ArtifactError {
    pub fn invalid(kind: ArtifactKind, reason: impl Into<String>) -> Self {
        ArtifactError::Invalid {
            kind,
            reason: reason.into(),
        }
    }
}

/// Failure while transforming text or running the classifier on one row.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("feature row has width {found}, expected {expected}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("classifier produced label {0}, expected 0 or 1")]
    UnsupportedLabel(i64),

    #[error("non-finite feature value at column {0}")]
    NonFinite(usize),

    #[error("{0}")]
    Other(String),
}

/// Failure evaluating a single admitted file.
#[derive(Debug, Error)]
pub enum FileError {
    #[error("failed to read '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("feature extraction failed for '{path}': {source}")]
    Extract {
        path: String,
        #[source]
        source: ModelError,
    },

    #[error("prediction failed for '{path}': {source}")]
    Predict {
        path: String,
        #[source]
        source: ModelError,
    },
}

impl FileError {
    pub fn path(&self) -> &str {
        match self {
            FileError::Read { path, .. }
            | FileError::Extract { path, .. }
            | FileError::Predict { path, .. } => path,
        }
    }
}

/// Anything that aborts a scan. Distinct from a positive detection.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("failed to traverse '{}': {source}", path.display())]
    Traverse {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error(transparent)]
    File(#[from] FileError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ScanError {
    /// Short machine-readable tag for reports and notifications.
    pub fn kind(&self) -> &str {
        match self {
            ScanError::Artifact(_) => "artifact-load",
            ScanError::Traverse { .. } => "traversal",
            ScanError::File(FileError::Read { .. }) => "file-read",
            ScanError::File(FileError::Extract { .. }) => "feature-extraction",
            ScanError::File(FileError::Predict { .. }) => "prediction",
            ScanError::Config(_) => "config",
        }
    }
}
