use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Binary class label, derived from the directory an image was loaded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Label {
    Child = 0,
    Adult = 1,
}

impl Label {
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    pub const fn from_positive(positive: bool) -> Self {
        if positive {
            Label::Adult
        } else {
            Label::Child
        }
    }

    /// `Adult` is the positive class for F1 and ROC.
    pub const fn is_positive(self) -> bool {
        matches!(self, Label::Adult)
    }

    pub fn target(self) -> f64 {
        f64::from(self.as_u8())
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Label::Child => write!(f, "child"),
            Label::Adult => write!(f, "adult"),
        }
    }
}

/// Feature vectors (one per row) with index-aligned labels.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    features: Array2<f64>,
    labels: Vec<Label>,
}

impl Dataset {
    pub fn new(features: Array2<f64>, labels: Vec<Label>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(Error::LengthMismatch {
                features: features.nrows(),
                labels: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    /// Build a dataset from blocks that each carry a single label, in order.
    ///
    /// All blocks must have the same number of columns.
    pub fn from_labelled_blocks(blocks: Vec<(Array2<f64>, Label)>) -> Result<Self> {
        let n_features = blocks.first().map(|(b, _)| b.ncols()).unwrap_or(0);
        let mut labels = Vec::new();
        let mut views = Vec::with_capacity(blocks.len());

        for (block, label) in &blocks {
            if block.ncols() != n_features {
                return Err(Error::DimensionMismatch {
                    expected: n_features,
                    found: block.ncols(),
                });
            }
            labels.extend(std::iter::repeat(*label).take(block.nrows()));
            views.push(block.view());
        }

        let features = if views.is_empty() {
            Array2::zeros((0, 0))
        } else {
            ndarray::concatenate(Axis(0), &views)
                .map_err(|e| Error::Numerical(e.to_string()))?
        };

        Self::new(features, labels)
    }

    pub fn features(&self) -> &Array2<f64> {
        &self.features
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    /// Labels as 0.0 / 1.0 targets.
    pub fn targets(&self) -> Array1<f64> {
        self.labels.iter().map(|l| l.target()).collect()
    }

    /// Number of samples of each class, as (children, adults).
    pub fn class_counts(&self) -> (usize, usize) {
        let adults = self.labels.iter().filter(|l| l.is_positive()).count();
        (self.labels.len() - adults, adults)
    }

    /// Rows at `indices`, in that order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            features: self.features.select(Axis(0), indices),
            labels: indices.iter().map(|&i| self.labels[i]).collect(),
        }
    }

    /// Same labels, new feature matrix (e.g. after a projection).
    pub fn with_features(&self, features: Array2<f64>) -> Result<Self> {
        Self::new(features, self.labels.clone())
    }
}

/// Disjoint train and test partitions.
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}
