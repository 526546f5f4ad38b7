//! Search for the smallest PCA component count that keeps a given share of
//! the variance.

use log::{debug, trace};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::pca::{Pca, Spectrum};

/// Share of variance the component count must exceed.
pub const DEFAULT_THRESHOLD: f64 = 0.99;

/// Step of the coarse ascent in [`SearchStrategy::CoarseToFine`].
pub const COARSE_STEP: usize = 100;

/// Cumulative explained variance as a function of the component count.
pub trait VarianceProfile {
    /// Upper bound on the component count.
    fn max_components(&self) -> usize;

    /// Explained-variance ratio of a projection with `k` components.
    fn cumulative_ratio(&self, k: usize) -> Result<f64>;
}

impl VarianceProfile for Spectrum {
    fn max_components(&self) -> usize {
        Spectrum::max_components(self)
    }

    fn cumulative_ratio(&self, k: usize) -> Result<f64> {
        Ok(Spectrum::cumulative_ratio(self, k))
    }
}

/// Profile that fits a fresh projection for every probe.
///
/// Gives the same answers as [`Spectrum`] at a much higher cost.
pub struct RefitProfile<'a> {
    data: &'a Array2<f64>,
}

impl<'a> RefitProfile<'a> {
    pub fn new(data: &'a Array2<f64>) -> Self {
        Self { data }
    }
}

impl VarianceProfile for RefitProfile<'_> {
    fn max_components(&self) -> usize {
        self.data.nrows().min(self.data.ncols())
    }

    fn cumulative_ratio(&self, k: usize) -> Result<f64> {
        Ok(Pca::fit(self.data, k)?.cumulative_explained_variance())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchStrategy {
    /// Ascend by `step` until the threshold is crossed, step back once, then
    /// ascend by one.
    CoarseToFine { step: usize },
    /// Binary search over `1..=max_components`.
    Bisection,
}

impl Default for SearchStrategy {
    fn default() -> Self {
        SearchStrategy::Bisection
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DimensionFinder {
    threshold: f64,
    strategy: SearchStrategy,
}

impl Default for DimensionFinder {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}

impl DimensionFinder {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            strategy: SearchStrategy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: SearchStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Smallest component count for the samples in `data` (one per row).
    pub fn find_for(&self, data: &Array2<f64>) -> Result<usize> {
        let spectrum = Spectrum::compute(data)?;
        self.find(&spectrum)
    }

    /// Smallest `k >= 1` whose explained-variance ratio exceeds the threshold.
    ///
    /// Assumes the ratio is non-decreasing in `k`. Fails with
    /// [`Error::VarianceUnreachable`] if even `max_components` stays at or
    /// below the threshold.
    pub fn find<P: VarianceProfile + ?Sized>(&self, profile: &P) -> Result<usize> {
        let max = profile.max_components();
        let reached = if max == 0 {
            0.0
        } else {
            profile.cumulative_ratio(max)?
        };
        if max == 0 || reached <= self.threshold {
            return Err(Error::VarianceUnreachable {
                threshold: self.threshold,
                reached,
                max_components: max,
            });
        }

        let k = match self.strategy {
            SearchStrategy::CoarseToFine { step } => {
                self.coarse_to_fine(profile, step.max(1), max)?
            }
            SearchStrategy::Bisection => self.bisect(profile, max)?,
        };

        debug!(
            "{} components explain more than {} of the variance",
            k, self.threshold
        );
        Ok(k)
    }

    fn exceeds<P: VarianceProfile + ?Sized>(&self, profile: &P, k: usize) -> Result<bool> {
        let ratio = profile.cumulative_ratio(k)?;
        trace!("k = {}: explained variance {:.6}", k, ratio);
        Ok(ratio > self.threshold)
    }

    fn coarse_to_fine<P: VarianceProfile + ?Sized>(
        &self,
        profile: &P,
        step: usize,
        max: usize,
    ) -> Result<usize> {
        let mut k = 1;
        while !self.exceeds(profile, k)? {
            k = (k + step).min(max);
        }

        // Step back below the crossing; never start the fine scan under 1.
        k = k.saturating_sub(step).max(1);
        while !self.exceeds(profile, k)? {
            k += 1;
        }
        Ok(k)
    }

    fn bisect<P: VarianceProfile + ?Sized>(&self, profile: &P, max: usize) -> Result<usize> {
        let (mut lo, mut hi) = (1, max);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if self.exceeds(profile, mid)? {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        Ok(lo)
    }
}
