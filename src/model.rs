//! Predictor adapter around the pre-trained stroke classifier.
//!
//! The classifier ships as a JSON random-forest artifact. It is loaded once at
//! startup and shared read-only behind an [`Arc`] for the life of the process.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::info;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::arrays::Array;
use smartcore::linalg::basic::matrix::DenseMatrix;

use crate::error::ModelError;
use crate::features::convert_features_to_matrix;
use crate::records::{EncodedFeatureRow, PredictionResult, FEATURE_COLUMNS};

/// A binary classifier over rows laid out as [`FEATURE_COLUMNS`].
pub trait Classifier: Send + Sync {
    /// Probability of class 1 for every row, in row order.
    fn predict_probability(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, ModelError>;

    /// Class per row: 1 when class 1 outweighs class 0.
    fn predict(&self, x: &DenseMatrix<f64>) -> Result<Vec<u8>, ModelError> {
        Ok(self
            .predict_probability(x)?
            .into_iter()
            .map(|p| u8::from(p > 0.5))
            .collect())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
        /// Side taken by a missing (`NaN`) value.
        #[serde(default)]
        missing_left: bool,
    },
    Leaf {
        /// Class weights for classes 0 and 1.
        value: Vec<f64>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    pub nodes: Vec<Node>,
}

impl Tree {
    fn validate(&self, index: usize, n_features: usize) -> Result<(), ModelError> {
        let invalid = |reason: String| ModelError::InvalidTree {
            tree: index,
            reason,
        };
        if self.nodes.is_empty() {
            return Err(invalid("no nodes".to_string()));
        }
        for (at, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    feature,
                    left,
                    right,
                    ..
                } => {
                    if *feature >= n_features {
                        return Err(invalid(format!("node {at} splits on feature {feature}")));
                    }
                    // children always follow their parent, so descent terminates
                    for child in [left, right] {
                        if *child <= at || *child >= self.nodes.len() {
                            return Err(invalid(format!("node {at} has child {child}")));
                        }
                    }
                }
                Node::Leaf { value } => {
                    if value.len() != 2 || value.iter().any(|w| !w.is_finite() || *w < 0.0) {
                        return Err(invalid(format!("leaf {at} has weights {value:?}")));
                    }
                }
            }
        }
        Ok(())
    }

    /// Class-1 probability of the leaf reached by `row`.
    fn leaf_probability(&self, row: &[f64]) -> f64 {
        let mut at = 0;
        loop {
            match &self.nodes[at] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    missing_left,
                } => {
                    let value = row[*feature];
                    let go_left = if value.is_nan() {
                        *missing_left
                    } else {
                        value <= *threshold
                    };
                    at = if go_left { *left } else { *right };
                }
                Node::Leaf { value } => {
                    let total = value[0] + value[1];
                    return if total > 0.0 { value[1] / total } else { 0.0 };
                }
            }
        }
    }
}

/// Random forest exported from the training pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    pub feature_names: Vec<String>,
    pub trees: Vec<Tree>,
}

impl ForestModel {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ModelError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let model = Self::from_json(&json)?;
        info!(
            "loaded model {:?} with {} trees",
            path,
            model.trees.len()
        );
        Ok(model)
    }

    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let model: ForestModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Check the artifact against the feature schema and its own structure.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_COLUMNS) {
            return Err(ModelError::SchemaMismatch {
                expected: FEATURE_COLUMNS.iter().map(|c| c.to_string()).collect(),
                found: self.feature_names.clone(),
            });
        }
        if self.trees.is_empty() {
            return Err(ModelError::InvalidTree {
                tree: 0,
                reason: "forest has no trees".to_string(),
            });
        }
        for (index, tree) in self.trees.iter().enumerate() {
            tree.validate(index, self.feature_names.len())?;
        }
        Ok(())
    }
}

impl Classifier for ForestModel {
    fn predict_probability(&self, x: &DenseMatrix<f64>) -> Result<Vec<f64>, ModelError> {
        let (nrows, ncols) = x.shape();
        if ncols != self.feature_names.len() {
            return Err(ModelError::WidthMismatch {
                expected: self.feature_names.len(),
                found: ncols,
            });
        }
        let mut row = vec![0.0; ncols];
        let mut probabilities = Vec::with_capacity(nrows);
        for r in 0..nrows {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = *x.get((r, c));
            }
            let sum: f64 = self
                .trees
                .iter()
                .map(|tree| tree.leaf_probability(&row))
                .sum();
            probabilities.push(sum / self.trees.len() as f64);
        }
        Ok(probabilities)
    }
}

/// Shared, immutable handle to the loaded classifier.
#[derive(Clone)]
pub struct Predictor {
    classifier: Arc<dyn Classifier>,
}

impl Predictor {
    pub fn new(classifier: Arc<dyn Classifier>) -> Self {
        Self { classifier }
    }

    pub fn from_model<C: Classifier + 'static>(model: C) -> Self {
        Self::new(Arc::new(model))
    }

    pub fn predict(&self, rows: &[EncodedFeatureRow]) -> Result<Vec<u8>, ModelError> {
        self.classifier.predict(&convert_features_to_matrix(rows))
    }

    pub fn predict_probability(&self, rows: &[EncodedFeatureRow]) -> Result<Vec<f64>, ModelError> {
        self.classifier
            .predict_probability(&convert_features_to_matrix(rows))
    }

    /// Class and probability per row, in row order.
    pub fn classify(&self, rows: &[EncodedFeatureRow]) -> Result<Vec<PredictionResult>, ModelError> {
        let x = convert_features_to_matrix(rows);
        let classes = self.classifier.predict(&x)?;
        let probabilities = self.classifier.predict_probability(&x)?;

        Ok(classes
            .into_iter()
            .zip(probabilities)
            .map(|(class, probability)| PredictionResult { class, probability })
            .collect())
    }
}

impl std::fmt::Debug for Predictor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Predictor").finish_non_exhaustive()
    }
}
