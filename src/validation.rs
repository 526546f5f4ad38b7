//! Stratified k-fold cross-validation scored by F1.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::classifier::{LogisticParams, LogisticRegression};
use crate::error::{Error, Result};
use crate::metrics::f1_score;
use crate::types::{Dataset, Label};

/// Train/test row indices of one fold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fold {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Stratified folds without shuffling.
///
/// Each class keeps its sample order; class members are handed to folds in
/// contiguous runs whose sizes come from dealing the label list, grouped by
/// class in order of first appearance, round-robin over the folds, so every
/// fold gets a near-equal share of each class.
#[derive(Debug, Clone, Copy)]
pub struct StratifiedKFold {
    n_splits: usize,
}

impl StratifiedKFold {
    pub fn new(n_splits: usize) -> Self {
        Self { n_splits }
    }

    pub fn split(&self, labels: &[Label]) -> Result<Vec<Fold>> {
        // Classes are numbered in order of first appearance.
        let mut classes = Vec::with_capacity(2);
        for &label in labels {
            if !classes.contains(&label) {
                classes.push(label);
            }
        }
        if classes.len() < 2 {
            return Err(Error::InvalidFolds {
                folds: self.n_splits,
                max: 0,
            });
        }

        let members: Vec<Vec<usize>> = classes
            .iter()
            .map(|&c| {
                labels
                    .iter()
                    .enumerate()
                    .filter(|&(_, &l)| l == c)
                    .map(|(i, _)| i)
                    .collect()
            })
            .collect();

        let smallest = members.iter().map(Vec::len).min().unwrap_or(0);
        if self.n_splits < 2 || self.n_splits > smallest {
            return Err(Error::InvalidFolds {
                folds: self.n_splits,
                max: smallest,
            });
        }

        let k = self.n_splits;
        let mut fold_of = vec![0usize; labels.len()];
        let mut start = 0;
        for class in &members {
            // Positions start..start+len of the sorted label list belong to
            // this class; count how many land on each residue mod k.
            let end = start + class.len();
            let mut assigned = class.iter();
            for fold in 0..k {
                let share = (start..end).filter(|p| p % k == fold).count();
                for &idx in assigned.by_ref().take(share) {
                    fold_of[idx] = fold;
                }
            }
            start = end;
        }

        Ok((0..k)
            .map(|fold| {
                let (test, train): (Vec<usize>, Vec<usize>) =
                    (0..labels.len()).partition(|&i| fold_of[i] == fold);
                Fold { train, test }
            })
            .collect())
    }
}

/// Fold scores summarised as mean and population standard deviation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CvScore {
    pub mean: f64,
    pub std_dev: f64,
    pub folds: Vec<f64>,
}

impl CvScore {
    pub fn from_folds(folds: Vec<f64>) -> Self {
        let n = folds.len().max(1) as f64;
        let mean = folds.iter().sum::<f64>() / n;
        let var = folds.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
        Self {
            mean,
            std_dev: var.sqrt(),
            folds,
        }
    }
}

/// Score `params` by F1 on `cv` stratified folds of `data`, then refit on
/// all of `data`.
pub fn cross_validate(
    params: &LogisticParams,
    data: &Dataset,
    cv: usize,
) -> Result<(CvScore, LogisticRegression)> {
    let folds = StratifiedKFold::new(cv).split(data.labels())?;

    let mut scores = Vec::with_capacity(folds.len());
    for (i, fold) in folds.iter().enumerate() {
        let train = data.select(&fold.train);
        let test = data.select(&fold.test);

        let model = params.fit(train.features(), train.labels())?;
        let predicted = model.predict(test.features())?;
        let score = f1_score(test.labels(), &predicted)?;
        debug!("fold {}/{}: F1 = {:.4}", i + 1, folds.len(), score);
        scores.push(score);
    }

    let model = params.fit(data.features(), data.labels())?;
    Ok((CvScore::from_folds(scores), model))
}
