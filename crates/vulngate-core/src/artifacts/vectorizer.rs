use crate::error::{ArtifactError, ArtifactKind, ModelError};
use crate::features::FeatureRow;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Default token pattern: runs of two or more word characters.
pub const DEFAULT_TOKEN_PATTERN: &str = r"(?u)\b\w\w+\b";

/// Maps raw text to a fixed-width sparse row.
pub trait TextVectorizer {
    /// Vocabulary size `D`; every transformed row has exactly this width.
    fn dimension(&self) -> usize;

    fn transform(&self, text: &str) -> Result<FeatureRow, ModelError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightingKind {
    Count,
    Tfidf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RowNorm {
    L1,
    L2,
}

/// On-disk form of the trained vectorizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorizerSpec {
    pub kind: WeightingKind,
    pub vocabulary: HashMap<String, usize>,
    #[serde(default)]
    pub idf: Option<Vec<f64>>,
    #[serde(default = "default_true")]
    pub lowercase: bool,
    #[serde(default = "default_token_pattern")]
    pub token_pattern: String,
    #[serde(default = "default_ngram_range")]
    pub ngram_range: (usize, usize),
    #[serde(default)]
    pub stop_words: Vec<String>,
    #[serde(default)]
    pub binary: bool,
    #[serde(default)]
    pub sublinear_tf: bool,
    /// Absent means the weighting's default; explicit `null` disables.
    #[serde(default, with = "explicit_norm")]
    pub norm: Option<Option<RowNorm>>,
}

fn default_true() -> bool {
    true
}

fn default_token_pattern() -> String {
    DEFAULT_TOKEN_PATTERN.to_string()
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

mod explicit_norm {
    use super::RowNorm;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn deserialize<'de, D>(de: D) -> Result<Option<Option<RowNorm>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<RowNorm>::deserialize(de).map(Some)
    }

    pub fn serialize<S>(value: &Option<Option<RowNorm>>, ser: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.flatten().serialize(ser)
    }
}

/// Bag-of-terms vectorizer with optional tf-idf weighting.
#[derive(Debug, Clone)]
pub struct TermVectorizer {
    kind: WeightingKind,
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    lowercase: bool,
    token_re: Regex,
    ngram_range: (usize, usize),
    stop_words: HashSet<String>,
    binary: bool,
    sublinear_tf: bool,
    norm: Option<RowNorm>,
}

impl TermVectorizer {
    pub fn from_spec(spec: VectorizerSpec) -> Result<Self, ArtifactError> {
        let invalid = |reason: String| ArtifactError::invalid(ArtifactKind::Vectorizer, reason);

        let dim = spec.vocabulary.len();
        if dim == 0 {
            return Err(invalid("vocabulary is empty".into()));
        }

        let mut seen = vec![false; dim];
        for (term, &col) in &spec.vocabulary {
            if col >= dim {
                return Err(invalid(format!(
                    "term '{}' maps to column {} outside vocabulary of size {}",
                    term, col, dim
                )));
            }
            if seen[col] {
                return Err(invalid(format!("column {} is assigned to more than one term", col)));
            }
            seen[col] = true;
        }

        let idf = match (spec.kind, spec.idf) {
            (WeightingKind::Tfidf, Some(idf)) => {
                if idf.len() != dim {
                    return Err(invalid(format!(
                        "idf has {} weights for a vocabulary of {}",
                        idf.len(),
                        dim
                    )));
                }
                if let Some(pos) = idf.iter().position(|w| !w.is_finite()) {
                    return Err(invalid(format!("idf weight {} is not finite", pos)));
                }
                idf
            }
            (WeightingKind::Tfidf, None) => {
                return Err(invalid("tfidf vectorizer has no idf weights".into()));
            }
            (WeightingKind::Count, _) => Vec::new(),
        };

        let (min_n, max_n) = spec.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(invalid(format!("ngram range ({}, {}) is invalid", min_n, max_n)));
        }

        let token_re = Regex::new(&spec.token_pattern)
            .map_err(|e| invalid(format!("token pattern does not compile: {}", e)))?;

        let norm = match spec.norm {
            Some(explicit) => explicit,
            None => match spec.kind {
                WeightingKind::Tfidf => Some(RowNorm::L2),
                WeightingKind::Count => None,
            },
        };

        Ok(Self {
            kind: spec.kind,
            vocabulary: spec.vocabulary,
            idf,
            lowercase: spec.lowercase,
            token_re,
            ngram_range: spec.ngram_range,
            stop_words: spec.stop_words.into_iter().collect(),
            binary: spec.binary,
            sublinear_tf: spec.sublinear_tf,
            norm,
        })
    }

    fn tokens<'t>(&self, text: &'t str) -> Vec<&'t str> {
        self.token_re
            .find_iter(text)
            .map(|m| m.as_str())
            .filter(|t| !self.stop_words.contains(*t))
            .collect()
    }

    fn count_terms(&self, tokens: &[&str]) -> BTreeMap<usize, f64> {
        let mut counts = BTreeMap::new();
        let (min_n, max_n) = self.ngram_range;

        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                let col = if n == 1 {
                    self.vocabulary.get(window[0])
                } else {
                    self.vocabulary.get(&window.join(" "))
                };
                if let Some(&col) = col {
                    *counts.entry(col).or_insert(0.0) += 1.0;
                }
            }
        }

        counts
    }
}

impl TextVectorizer for TermVectorizer {
    fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    fn transform(&self, text: &str) -> Result<FeatureRow, ModelError> {
        let lowered;
        let text = if self.lowercase {
            lowered = text.to_lowercase();
            lowered.as_str()
        } else {
            text
        };

        let tokens = self.tokens(text);
        let counts = self.count_terms(&tokens);

        let weighted = counts.into_iter().map(|(col, count)| {
            let mut tf = if self.binary { 1.0 } else { count };
            if self.kind == WeightingKind::Tfidf {
                if self.sublinear_tf {
                    tf = 1.0 + tf.ln();
                }
                tf *= self.idf[col];
            }
            (col, tf)
        });

        let mut row = FeatureRow::from_entries(self.dimension(), weighted)?;

        if let Some(norm) = self.norm {
            let total = match norm {
                RowNorm::L1 => row.values().iter().map(|v| v.abs()).sum::<f64>(),
                RowNorm::L2 => row.values().iter().map(|v| v * v).sum::<f64>().sqrt(),
            };
            if total > 0.0 {
                row.scale(1.0 / total);
            }
        }

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vocab(terms: &[&str]) -> HashMap<String, usize> {
        terms
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect()
    }

    fn count_spec(terms: &[&str]) -> VectorizerSpec {
        VectorizerSpec {
            kind: WeightingKind::Count,
            vocabulary: vocab(terms),
            idf: None,
            lowercase: true,
            token_pattern: default_token_pattern(),
            ngram_range: (1, 1),
            stop_words: Vec::new(),
            binary: false,
            sublinear_tf: false,
            norm: None,
        }
    }

    #[test]
    fn test_count_transform_ignores_unknown_terms() {
        let v = TermVectorizer::from_spec(count_spec(&["eval", "input", "exec"])).unwrap();
        let row = v.transform("eval(input()) ; eval again; system()").unwrap();
        assert_eq!(row.dim(), 3);
        assert_eq!(row.get(0), 2.0);
        assert_eq!(row.get(1), 1.0);
        assert_eq!(row.get(2), 0.0);
    }

    #[test]
    fn test_width_is_fixed_regardless_of_input() {
        let v = TermVectorizer::from_spec(count_spec(&["select", "from"])).unwrap();
        assert_eq!(v.transform("").unwrap().dim(), 2);
        let long = "select * from users where 1=1 ".repeat(5000);
        assert_eq!(v.transform(&long).unwrap().dim(), 2);
    }

    #[test]
    fn test_single_char_tokens_are_skipped() {
        let v = TermVectorizer::from_spec(count_spec(&["x", "xy"])).unwrap();
        let row = v.transform("x xy x").unwrap();
        assert_eq!(row.get(0), 0.0);
        assert_eq!(row.get(1), 1.0);
    }

    #[test]
    fn test_lowercase_flag() {
        let mut spec = count_spec(&["exec"]);
        assert_eq!(TermVectorizer::from_spec(spec.clone()).unwrap().transform("EXEC").unwrap().get(0), 1.0);
        spec.lowercase = false;
        assert_eq!(TermVectorizer::from_spec(spec).unwrap().transform("EXEC").unwrap().get(0), 0.0);
    }

    #[test]
    fn test_order_independent_for_unigrams() {
        let v = TermVectorizer::from_spec(count_spec(&["query", "user", "password"])).unwrap();
        let a = v.transform("query user password").unwrap();
        let b = v.transform("password query user").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_bigrams_joined_with_space() {
        let mut spec = count_spec(&["shell", "shell true", "true"]);
        spec.ngram_range = (1, 2);
        let v = TermVectorizer::from_spec(spec).unwrap();
        let row = v.transform("subprocess.call(cmd, shell=True)").unwrap();
        assert_eq!(row.get(0), 1.0);
        assert_eq!(row.get(1), 1.0);
        assert_eq!(row.get(2), 1.0);
    }

    #[test]
    fn test_stop_words_removed() {
        let mut spec = count_spec(&["the", "query"]);
        spec.stop_words = vec!["the".into()];
        let v = TermVectorizer::from_spec(spec).unwrap();
        let row = v.transform("the query").unwrap();
        assert_eq!(row.get(0), 0.0);
        assert_eq!(row.get(1), 1.0);
    }

    #[test]
    fn test_tfidf_l2_normalized() {
        let mut spec = count_spec(&["eval", "input"]);
        spec.kind = WeightingKind::Tfidf;
        spec.idf = Some(vec![2.0, 1.0]);
        let v = TermVectorizer::from_spec(spec).unwrap();
        let row = v.transform("eval input input").unwrap();
        // raw weights (2, 2) -> each 1/sqrt(2)
        let expected = 1.0 / 2f64.sqrt();
        assert!((row.get(0) - expected).abs() < 1e-12);
        assert!((row.get(1) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_tfidf_sublinear_and_explicit_null_norm() {
        let json = r#"{
            "kind": "tfidf",
            "vocabulary": {"eval": 0},
            "idf": [1.5],
            "sublinear_tf": true,
            "norm": null
        }"#;
        let spec: VectorizerSpec = serde_json::from_str(json).unwrap();
        let v = TermVectorizer::from_spec(spec).unwrap();
        let row = v.transform("eval eval eval").unwrap();
        let expected = (1.0 + 3f64.ln()) * 1.5;
        assert!((row.get(0) - expected).abs() < 1e-12);
    }

    #[test]
    fn test_tfidf_defaults_to_l2_when_norm_absent() {
        let json = r#"{"kind": "tfidf", "vocabulary": {"a1": 0, "b2": 1}, "idf": [3.0, 4.0]}"#;
        let spec: VectorizerSpec = serde_json::from_str(json).unwrap();
        let v = TermVectorizer::from_spec(spec).unwrap();
        let row = v.transform("a1 b2").unwrap();
        assert!((row.get(0) - 0.6).abs() < 1e-12);
        assert!((row.get(1) - 0.8).abs() < 1e-12);
    }

    #[test]
    fn test_binary_clamps_counts() {
        let mut spec = count_spec(&["eval"]);
        spec.binary = true;
        let v = TermVectorizer::from_spec(spec).unwrap();
        assert_eq!(v.transform("eval eval eval").unwrap().get(0), 1.0);
    }

    #[test]
    fn test_rejects_column_outside_vocabulary() {
        let mut spec = count_spec(&["a1"]);
        spec.vocabulary.insert("b2".into(), 7);
        assert!(TermVectorizer::from_spec(spec).is_err());
    }

    #[test]
    fn test_rejects_duplicate_columns() {
        let mut spec = count_spec(&["a1"]);
        spec.vocabulary.insert("b2".into(), 0);
        assert!(TermVectorizer::from_spec(spec).is_err());
    }

    #[test]
    fn test_rejects_tfidf_without_idf() {
        let mut spec = count_spec(&["a1"]);
        spec.kind = WeightingKind::Tfidf;
        assert!(TermVectorizer::from_spec(spec).is_err());
    }

    #[test]
    fn test_rejects_bad_pattern_and_ngram_range() {
        let mut spec = count_spec(&["a1"]);
        spec.token_pattern = "(".into();
        assert!(TermVectorizer::from_spec(spec).is_err());

        let mut spec = count_spec(&["a1"]);
        spec.ngram_range = (2, 1);
        assert!(TermVectorizer::from_spec(spec).is_err());
    }
}
