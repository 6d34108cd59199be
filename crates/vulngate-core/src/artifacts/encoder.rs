use crate::error::{ArtifactError, ArtifactKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Result of encoding a file extension.
///
/// `Unknown` is kept apart from every learned code so the caller decides
/// what number it becomes in the feature row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "code", rename_all = "snake_case")]
pub enum ExtensionCategory {
    Known(u32),
    Unknown,
}

impl ExtensionCategory {
    pub fn is_unknown(&self) -> bool {
        matches!(self, ExtensionCategory::Unknown)
    }

    /// Numeric value for the extension column of a feature row.
    pub fn feature_value(&self, unknown_code: f64) -> f64 {
        match self {
            ExtensionCategory::Known(code) => f64::from(*code),
            ExtensionCategory::Unknown => unknown_code,
        }
    }
}

/// Maps a file extension (without the leading dot) to a category.
pub trait ExtensionEncoder {
    fn encode(&self, extension: &str) -> ExtensionCategory;

    /// Extensions known to the encoder, in code order.
    fn classes(&self) -> &[String];
}

/// On-disk form of the trained label encoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelEncoderSpec {
    pub classes: Vec<String>,
}

/// Label encoder: the code of a class is its position in `classes`.
#[derive(Debug, Clone)]
pub struct LabelEncoder {
    classes: Vec<String>,
    codes: HashMap<String, u32>,
}

impl LabelEncoder {
    pub fn from_spec(spec: LabelEncoderSpec) -> Result<Self, ArtifactError> {
        if spec.classes.is_empty() {
            return Err(ArtifactError::invalid(
                ArtifactKind::Encoder,
                "encoder has no classes",
            ));
        }

        let mut codes = HashMap::with_capacity(spec.classes.len());
        for (i, class) in spec.classes.iter().enumerate() {
            let code = u32::try_from(i).map_err(|_| {
                ArtifactError::invalid(ArtifactKind::Encoder, "too many encoder classes")
            })?;
            if codes.insert(class.clone(), code).is_some() {
                return Err(ArtifactError::invalid(
                    ArtifactKind::Encoder,
                    format!("class '{}' appears more than once", class),
                ));
            }
        }

        Ok(Self {
            classes: spec.classes,
            codes,
        })
    }
}

impl ExtensionEncoder for LabelEncoder {
    fn encode(&self, extension: &str) -> ExtensionCategory {
        match self.codes.get(extension) {
            Some(code) => ExtensionCategory::Known(*code),
            None => ExtensionCategory::Unknown,
        }
    }

    fn classes(&self) -> &[String] {
        &self.classes
    }
}
