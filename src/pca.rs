//! Principal component analysis.
//!
//! [`Spectrum`] holds the full decomposition of a centred data matrix, computed
//! once with an SVD. A [`Pca`] with `k` components is the leading `k` rows of
//! it, so the explained variance of any `k` can be read off the spectrum
//! without refitting.

use log::debug;
use nalgebra::DMatrix;
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// All principal axes of a data set, sorted by decreasing variance.
#[derive(Debug, Clone)]
pub struct Spectrum {
    mean: Array1<f64>,
    /// One principal axis per row.
    components: Array2<f64>,
    /// Squared singular values, same order as `components`.
    energies: Array1<f64>,
    total_energy: f64,
    n_samples: usize,
}

impl Spectrum {
    /// Decompose `data` (one sample per row).
    pub fn compute(data: &Array2<f64>) -> Result<Self> {
        let (n_samples, n_features) = data.dim();
        if n_samples == 0 || n_features == 0 {
            return Err(Error::Numerical(format!(
                "cannot decompose an empty {n_samples}x{n_features} matrix"
            )));
        }

        let mean = data
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::Numerical("mean of empty matrix".into()))?;
        let centered = data - &mean;

        let matrix = DMatrix::from_fn(n_samples, n_features, |i, j| centered[[i, j]]);
        let svd = matrix.svd(false, true);
        let v_t = svd
            .v_t
            .ok_or_else(|| Error::Numerical("SVD did not return right singular vectors".into()))?;

        let singular = svd.singular_values;
        let mut order: Vec<usize> = (0..singular.len()).collect();
        order.sort_by(|&a, &b| {
            singular[b]
                .partial_cmp(&singular[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let rank = order.len();
        let mut components = Array2::zeros((rank, n_features));
        let mut energies = Array1::zeros(rank);

        for (row, &idx) in order.iter().enumerate() {
            energies[row] = singular[idx] * singular[idx];

            // Sign convention: the largest-magnitude loading is positive.
            let axis = v_t.row(idx);
            let pivot = axis
                .iter()
                .copied()
                .fold(0.0_f64, |best, v| if v.abs() > best.abs() { v } else { best });
            let sign = if pivot < 0.0 { -1.0 } else { 1.0 };
            for (j, v) in axis.iter().enumerate() {
                components[[row, j]] = sign * v;
            }
        }

        let total_energy = energies.sum();
        debug!(
            "decomposed {}x{} matrix into {} principal axes",
            n_samples, n_features, rank
        );

        Ok(Self {
            mean,
            components,
            energies,
            total_energy,
            n_samples,
        })
    }

    /// Largest component count a projection can have: `min(samples, features)`.
    pub fn max_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    /// Fraction of total variance explained by the first `k` components.
    ///
    /// Zero-variance data explains nothing at any `k`.
    pub fn cumulative_ratio(&self, k: usize) -> f64 {
        if self.total_energy <= 0.0 {
            return 0.0;
        }
        let k = k.min(self.max_components());
        self.energies.iter().take(k).sum::<f64>() / self.total_energy
    }

    /// Keep the leading `n_components` axes as a fitted projection.
    pub fn truncate(&self, n_components: usize) -> Result<Pca> {
        let max = self.max_components();
        if n_components == 0 || n_components > max {
            return Err(Error::InvalidComponents {
                requested: n_components,
                max,
            });
        }

        let denom = self.n_samples.saturating_sub(1).max(1) as f64;
        let energies = self.energies.slice(ndarray::s![..n_components]);
        let explained_variance = energies.mapv(|e| e / denom);
        let explained_variance_ratio = if self.total_energy > 0.0 {
            energies.mapv(|e| e / self.total_energy)
        } else {
            Array1::zeros(n_components)
        };

        Ok(Pca {
            mean: self.mean.clone(),
            components: self
                .components
                .slice(ndarray::s![..n_components, ..])
                .to_owned(),
            explained_variance,
            explained_variance_ratio,
        })
    }
}

/// A fitted linear projection onto the leading principal axes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pca {
    mean: Array1<f64>,
    components: Array2<f64>,
    explained_variance: Array1<f64>,
    explained_variance_ratio: Array1<f64>,
}

impl Pca {
    /// Fit a projection with `n_components` axes.
    pub fn fit(data: &Array2<f64>, n_components: usize) -> Result<Self> {
        Spectrum::compute(data)?.truncate(n_components)
    }

    /// Fit, then project the same data.
    pub fn fit_transform(data: &Array2<f64>, n_components: usize) -> Result<(Self, Array2<f64>)> {
        let pca = Self::fit(data, n_components)?;
        let reduced = pca.transform(data)?;
        Ok((pca, reduced))
    }

    /// Project samples (one per row) onto the principal axes.
    pub fn transform(&self, data: &Array2<f64>) -> Result<Array2<f64>> {
        if data.ncols() != self.n_features() {
            return Err(Error::DimensionMismatch {
                expected: self.n_features(),
                found: data.ncols(),
            });
        }
        Ok((data - &self.mean).dot(&self.components.t()))
    }

    pub fn n_components(&self) -> usize {
        self.components.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.components.ncols()
    }

    pub fn components(&self) -> &Array2<f64> {
        &self.components
    }

    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    /// Per-component variance, with the `n - 1` sample normalisation.
    pub fn explained_variance(&self) -> &Array1<f64> {
        &self.explained_variance
    }

    pub fn explained_variance_ratio(&self) -> &Array1<f64> {
        &self.explained_variance_ratio
    }

    pub fn cumulative_explained_variance(&self) -> f64 {
        self.explained_variance_ratio.sum()
    }
}
