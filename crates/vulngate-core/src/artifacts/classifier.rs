use crate::error::{ArtifactError, ArtifactKind, ModelError};
use crate::features::FeatureRow;
use serde::{Deserialize, Serialize};

/// Marker used by flat tree arrays for "no child".
pub const TREE_LEAF: i64 = -1;

/// Binary verdict for a single file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prediction {
    Benign,
    Vulnerable,
}

impl Prediction {
    pub fn from_label(label: i64) -> Result<Self, ModelError> {
        match label {
            0 => Ok(Prediction::Benign),
            1 => Ok(Prediction::Vulnerable),
            other => Err(ModelError::UnsupportedLabel(other)),
        }
    }

    pub fn label(&self) -> i64 {
        match self {
            Prediction::Benign => 0,
            Prediction::Vulnerable => 1,
        }
    }

    pub fn is_vulnerable(&self) -> bool {
        matches!(self, Prediction::Vulnerable)
    }
}

/// A trained binary classifier used strictly as an oracle.
pub trait Classifier {
    /// Row width the model was trained on.
    fn n_features(&self) -> usize;

    /// Short name of the model family, for diagnostics.
    fn describe(&self) -> String;

    fn predict(&self, row: &FeatureRow) -> Result<Prediction, ModelError>;
}

/// One decision tree in flat-array form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreeSpec {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    /// Per-node class weights, one column per entry of `classes`.
    pub value: Vec<Vec<f64>>,
}

/// On-disk form of the trained classifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum ClassifierSpec {
    Linear {
        n_features: usize,
        classes: Vec<i64>,
        coef: Vec<f64>,
        intercept: f64,
    },
    DecisionTree {
        n_features: usize,
        classes: Vec<i64>,
        tree: TreeSpec,
    },
    RandomForest {
        n_features: usize,
        classes: Vec<i64>,
        estimators: Vec<TreeSpec>,
    },
}

/// Build the runtime classifier described by `spec`, validating its shape.
pub fn from_spec(spec: ClassifierSpec) -> Result<Box<dyn Classifier>, ArtifactError> {
    match spec {
        ClassifierSpec::Linear {
            n_features,
            classes,
            coef,
            intercept,
        } => Ok(Box::new(LinearModel::new(n_features, classes, coef, intercept)?)),
        ClassifierSpec::DecisionTree {
            n_features,
            classes,
            tree,
        } => Ok(Box::new(TreeEnsemble::new(
            "decision_tree",
            n_features,
            classes,
            vec![tree],
        )?)),
        ClassifierSpec::RandomForest {
            n_features,
            classes,
            estimators,
        } => Ok(Box::new(TreeEnsemble::new(
            "random_forest",
            n_features,
            classes,
            estimators,
        )?)),
    }
}

fn invalid(reason: impl Into<String>) -> ArtifactError {
    ArtifactError::invalid(ArtifactKind::Classifier, reason)
}

fn validate_classes(classes: &[i64]) -> Result<[Prediction; 2], ArtifactError> {
    if classes.len() != 2 {
        return Err(invalid(format!(
            "binary classifier needs exactly 2 classes, found {}",
            classes.len()
        )));
    }
    if classes[0] == classes[1] {
        return Err(invalid("classes must be distinct"));
    }
    let first = Prediction::from_label(classes[0]).map_err(|e| invalid(e.to_string()))?;
    let second = Prediction::from_label(classes[1]).map_err(|e| invalid(e.to_string()))?;
    Ok([first, second])
}

fn check_width(expected: usize, row: &FeatureRow) -> Result<(), ModelError> {
    if row.dim() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            found: row.dim(),
        });
    }
    Ok(())
}

/// Linear decision function: positive margin selects the second class.
#[derive(Debug, Clone)]
pub struct LinearModel {
    classes: [Prediction; 2],
    coef: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(
        n_features: usize,
        classes: Vec<i64>,
        coef: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, ArtifactError> {
        let classes = validate_classes(&classes)?;
        if coef.len() != n_features {
            return Err(invalid(format!(
                "coef has {} weights but n_features is {}",
                coef.len(),
                n_features
            )));
        }
        if coef.iter().any(|w| !w.is_finite()) || !intercept.is_finite() {
            return Err(invalid("linear weights must be finite"));
        }
        Ok(Self {
            classes,
            coef,
            intercept,
        })
    }

    pub fn decision(&self, row: &FeatureRow) -> Result<f64, ModelError> {
        Ok(row.dot(&self.coef)? + self.intercept)
    }
}

impl Classifier for LinearModel {
    fn n_features(&self) -> usize {
        self.coef.len()
    }

    fn describe(&self) -> String {
        "linear".to_string()
    }

    fn predict(&self, row: &FeatureRow) -> Result<Prediction, ModelError> {
        check_width(self.n_features(), row)?;
        let margin = self.decision(row)?;
        Ok(if margin > 0.0 {
            self.classes[1]
        } else {
            self.classes[0]
        })
    }
}

#[derive(Debug, Clone)]
struct Tree {
    left: Vec<i64>,
    right: Vec<i64>,
    feature: Vec<usize>,
    threshold: Vec<f64>,
    /// Leaf class probabilities (normalized).
    proba: Vec<[f64; 2]>,
}

impl Tree {
    fn from_spec(index: usize, spec: TreeSpec, n_features: usize) -> Result<Self, ArtifactError> {
        let nodes = spec.children_left.len();
        let err = |reason: String| invalid(format!("tree {}: {}", index, reason));

        if nodes == 0 {
            return Err(err("tree has no nodes".into()));
        }
        if spec.children_right.len() != nodes
            || spec.feature.len() != nodes
            || spec.threshold.len() != nodes
            || spec.value.len() != nodes
        {
            return Err(err("node arrays have different lengths".into()));
        }

        let mut feature = Vec::with_capacity(nodes);
        let mut proba = Vec::with_capacity(nodes);

        for node in 0..nodes {
            let (l, r) = (spec.children_left[node], spec.children_right[node]);
            let is_leaf = l == TREE_LEAF && r == TREE_LEAF;

            if !is_leaf {
                // children always come after their parent, so walks terminate
                for child in [l, r] {
                    let ok = usize::try_from(child)
                        .map(|c| c > node && c < nodes)
                        .unwrap_or(false);
                    if !ok {
                        return Err(err(format!("node {} has invalid child {}", node, child)));
                    }
                }
                let f = usize::try_from(spec.feature[node])
                    .ok()
                    .filter(|f| *f < n_features)
                    .ok_or_else(|| {
                        err(format!(
                            "node {} splits on feature {} outside 0..{}",
                            node, spec.feature[node], n_features
                        ))
                    })?;
                if !spec.threshold[node].is_finite() {
                    return Err(err(format!("node {} has a non-finite threshold", node)));
                }
                feature.push(f);
            } else {
                feature.push(0);
            }

            let weights = &spec.value[node];
            if weights.len() != 2 {
                return Err(err(format!(
                    "node {} has {} class weights, expected 2",
                    node,
                    weights.len()
                )));
            }
            let total = weights[0] + weights[1];
            let p = if is_leaf {
                if !(total > 0.0) || weights.iter().any(|w| *w < 0.0 || !w.is_finite()) {
                    return Err(err(format!("leaf {} has unusable class weights", node)));
                }
                [weights[0] / total, weights[1] / total]
            } else {
                [0.0, 0.0]
            };
            proba.push(p);
        }

        Ok(Self {
            left: spec.children_left,
            right: spec.children_right,
            feature,
            threshold: spec.threshold,
            proba,
        })
    }

    fn leaf_proba(&self, row: &FeatureRow) -> [f64; 2] {
        let mut node = 0usize;
        while self.left[node] != TREE_LEAF {
            let next = if row.get(self.feature[node]) <= self.threshold[node] {
                self.left[node]
            } else {
                self.right[node]
            };
            // validated at load: children are in range and point forward
            node = next as usize;
        }
        self.proba[node]
    }
}

/// One or more trees whose leaf probabilities are averaged.
#[derive(Debug, Clone)]
pub struct TreeEnsemble {
    name: &'static str,
    n_features: usize,
    classes: [Prediction; 2],
    trees: Vec<Tree>,
}

impl TreeEnsemble {
    pub fn new(
        name: &'static str,
        n_features: usize,
        classes: Vec<i64>,
        trees: Vec<TreeSpec>,
    ) -> Result<Self, ArtifactError> {
        let classes = validate_classes(&classes)?;
        if trees.is_empty() {
            return Err(invalid("ensemble has no trees"));
        }
        let trees = trees
            .into_iter()
            .enumerate()
            .map(|(i, t)| Tree::from_spec(i, t, n_features))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name,
            n_features,
            classes,
            trees,
        })
    }

    /// Averaged class probabilities, in `classes` order.
    pub fn predict_proba(&self, row: &FeatureRow) -> Result<[f64; 2], ModelError> {
        check_width(self.n_features, row)?;
        let mut sum = [0.0, 0.0];
        for tree in &self.trees {
            let p = tree.leaf_proba(row);
            sum[0] += p[0];
            sum[1] += p[1];
        }
        let n = self.trees.len() as f64;
        Ok([sum[0] / n, sum[1] / n])
    }
}

impl Classifier for TreeEnsemble {
    fn n_features(&self) -> usize {
        self.n_features
    }

    fn describe(&self) -> String {
        format!("{} ({} trees)", self.name, self.trees.len())
    }

    fn predict(&self, row: &FeatureRow) -> Result<Prediction, ModelError> {
        let proba = self.predict_proba(row)?;
        // ties go to the first class
        Ok(if proba[1] > proba[0] {
            self.classes[1]
        } else {
            self.classes[0]
        })
    }
}
