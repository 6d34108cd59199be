use crate::artifacts::encoder::ExtensionCategory;
use crate::artifacts::ArtifactBundle;
use crate::error::ModelError;

/// A sparse numeric row of fixed width.
///
/// Entries are kept sorted by column with no duplicates; columns not stored
/// read as `0.0`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    dim: usize,
    indices: Vec<usize>,
    values: Vec<f64>,
}

impl FeatureRow {
    /// An all-zero row of width `dim`.
    pub fn zeros(dim: usize) -> Self {
        Self {
            dim,
            indices: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Build a row from `(column, value)` pairs. Pairs may arrive in any
    /// order; repeated columns are summed and explicit zeros are dropped.
    pub fn from_entries(
        dim: usize,
        entries: impl IntoIterator<Item = (usize, f64)>,
    ) -> Result<Self, ModelError> {
        let mut pairs: Vec<(usize, f64)> = entries.into_iter().collect();
        pairs.sort_by_key(|(col, _)| *col);

        let mut indices = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (col, value) in pairs {
            if col >= dim {
                return Err(ModelError::DimensionMismatch {
                    expected: dim,
                    found: col + 1,
                });
            }
            if !value.is_finite() {
                return Err(ModelError::NonFinite(col));
            }
            if indices.last() == Some(&col) {
                if let Some(last) = values.last_mut() {
                    *last += value;
                }
            } else {
                indices.push(col);
                values.push(value);
            }
        }

        let mut row = Self { dim, indices, values };
        row.prune_zeros();
        Ok(row)
    }

    /// Build a row from a dense slice.
    pub fn from_dense(values: &[f64]) -> Result<Self, ModelError> {
        Self::from_entries(values.len(), values.iter().copied().enumerate())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Number of stored (non-zero) entries.
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    pub fn get(&self, col: usize) -> f64 {
        match self.indices.binary_search(&col) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, f64)> + '_ {
        self.indices.iter().copied().zip(self.values.iter().copied())
    }

    /// Dot product with a dense weight vector of the same width.
    pub fn dot(&self, weights: &[f64]) -> Result<f64, ModelError> {
        if weights.len() != self.dim {
            return Err(ModelError::DimensionMismatch {
                expected: weights.len(),
                found: self.dim,
            });
        }
        Ok(self.iter().map(|(col, v)| weights[col] * v).sum())
    }

    /// Horizontally concatenate `other` to the right of `self`.
    pub fn hstack(mut self, other: &FeatureRow) -> Self {
        let offset = self.dim;
        for (col, value) in other.iter() {
            self.indices.push(offset + col);
            self.values.push(value);
        }
        self.dim += other.dim;
        self
    }

    /// Scale every stored value in place.
    pub fn scale(&mut self, factor: f64) {
        for v in &mut self.values {
            *v *= factor;
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    fn prune_zeros(&mut self) {
        let mut keep = 0;
        for i in 0..self.indices.len() {
            if self.values[i] != 0.0 {
                self.indices[keep] = self.indices[i];
                self.values[keep] = self.values[i];
                keep += 1;
            }
        }
        self.indices.truncate(keep);
        self.values.truncate(keep);
    }
}

/// Output of the extractor for one file.
#[derive(Debug, Clone)]
pub struct ExtractedFeatures {
    pub row: FeatureRow,
    pub category: ExtensionCategory,
}

/// Turns a file's raw text and extension into a `D + 1` wide feature row.
///
/// Column layout is fixed: the `D` text columns first, the extension
/// category last. The trained classifier depends on this order.
pub struct FeatureExtractor<'a> {
    bundle: &'a ArtifactBundle,
    unknown_extension_code: f64,
}

impl<'a> FeatureExtractor<'a> {
    pub fn new(bundle: &'a ArtifactBundle, unknown_extension_code: f64) -> Self {
        Self {
            bundle,
            unknown_extension_code,
        }
    }

    /// Width of every row this extractor produces.
    pub fn row_width(&self) -> usize {
        self.bundle.vectorizer().dimension() + 1
    }

    pub fn extract(&self, raw_text: &str, extension: &str) -> Result<ExtractedFeatures, ModelError> {
        let vectorizer = self.bundle.vectorizer();
        let text = vectorizer.transform(raw_text)?;
        if text.dim() != vectorizer.dimension() {
            return Err(ModelError::DimensionMismatch {
                expected: vectorizer.dimension(),
                found: text.dim(),
            });
        }

        let category = self.bundle.encoder().encode(extension);
        if category.is_unknown() {
            tracing::warn!(
                extension,
                fallback = self.unknown_extension_code,
                "extension not known to the encoder, using fallback code"
            );
        }
        let language = FeatureRow::from_entries(
            1,
            [(0, category.feature_value(self.unknown_extension_code))],
        )?;

        Ok(ExtractedFeatures {
            row: text.hstack(&language),
            category,
        })
    }
}
