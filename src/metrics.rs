//! Binary classification metrics.
//!
//! `Adult` is the positive class throughout.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Label;

/// 2x2 table of prediction outcomes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub tn: usize,
    pub fp: usize,
    #[serde(rename = "fn")]
    pub fn_: usize,
    pub tp: usize,
}

impl ConfusionMatrix {
    pub fn from_labels(truth: &[Label], predicted: &[Label]) -> Result<Self> {
        if truth.len() != predicted.len() {
            return Err(Error::LengthMismatch {
                features: predicted.len(),
                labels: truth.len(),
            });
        }

        let mut cm = Self::default();
        for (t, p) in truth.iter().zip(predicted) {
            match (t.is_positive(), p.is_positive()) {
                (false, false) => cm.tn += 1,
                (false, true) => cm.fp += 1,
                (true, false) => cm.fn_ += 1,
                (true, true) => cm.tp += 1,
            }
        }
        Ok(cm)
    }

    pub fn total(&self) -> usize {
        self.tn + self.fp + self.fn_ + self.tp
    }

    /// Rows are the true class, columns the predicted class.
    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }

    /// `(tp + tn) / total`.
    pub fn accuracy(&self) -> Result<f64> {
        ratio(self.tp + self.tn, self.total(), "accuracy of an empty confusion matrix")
    }

    /// `2tp / (2tp + fp + fn)`.
    pub fn f1(&self) -> Result<f64> {
        ratio(
            2 * self.tp,
            2 * self.tp + self.fp + self.fn_,
            "F1 with no positive predictions or samples",
        )
    }
}

fn ratio(numerator: usize, denominator: usize, what: &'static str) -> Result<f64> {
    if denominator == 0 {
        return Err(Error::UndefinedMetric(what));
    }
    Ok(numerator as f64 / denominator as f64)
}

/// F1 as a scorer: an undefined score counts as 0 and is logged.
pub fn f1_score(truth: &[Label], predicted: &[Label]) -> Result<f64> {
    let cm = ConfusionMatrix::from_labels(truth, predicted)?;
    match cm.f1() {
        Ok(score) => Ok(score),
        Err(Error::UndefinedMetric(what)) => {
            warn!("{what}; scoring as 0.0");
            Ok(0.0)
        }
        Err(e) => Err(e),
    }
}

/// Receiver operating characteristic points.
///
/// There is one candidate point per distinct score; interior points lying on
/// a straight segment between their neighbours are dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    /// Score at or above which a sample counts as positive. The first entry
    /// is `+inf` and pairs with the (0, 0) point.
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Build the curve from decision scores (higher means more adult).
    pub fn from_scores(truth: &[Label], scores: &[f64]) -> Result<Self> {
        if truth.len() != scores.len() {
            return Err(Error::LengthMismatch {
                features: scores.len(),
                labels: truth.len(),
            });
        }
        let positives = truth.iter().filter(|l| l.is_positive()).count();
        let negatives = truth.len() - positives;
        if positives == 0 || negatives == 0 {
            return Err(Error::UndefinedMetric("ROC curve needs both classes"));
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|&a, &b| {
            scores[b]
                .partial_cmp(&scores[a])
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        // (fp, tp, threshold) after each distinct score.
        let mut counts: Vec<(i64, i64, f64)> = Vec::new();
        let (mut tp, mut fp) = (0i64, 0i64);

        for (pos, &idx) in order.iter().enumerate() {
            if truth[idx].is_positive() {
                tp += 1;
            } else {
                fp += 1;
            }
            // Emit a point only after the last sample sharing this score.
            let last_of_score = order
                .get(pos + 1)
                .map_or(true, |&next| scores[next] != scores[idx]);
            if last_of_score {
                counts.push((fp, tp, scores[idx]));
            }
        }

        let mut fpr = vec![0.0];
        let mut tpr = vec![0.0];
        let mut thresholds = vec![f64::INFINITY];
        for (i, &(fp, tp, threshold)) in counts.iter().enumerate() {
            let interior = i > 0 && i + 1 < counts.len();
            if interior {
                let (prev, next) = (counts[i - 1], counts[i + 1]);
                let collinear = prev.0 - 2 * fp + next.0 == 0 && prev.1 - 2 * tp + next.1 == 0;
                if collinear {
                    continue;
                }
            }
            fpr.push(fp as f64 / negatives as f64);
            tpr.push(tp as f64 / positives as f64);
            thresholds.push(threshold);
        }

        Ok(Self {
            fpr,
            tpr,
            thresholds,
        })
    }

    /// Area under the curve, trapezoidal rule.
    pub fn auc(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[0] + y[1]) / 2.0)
            .sum()
    }

    pub fn points(&self) -> impl Iterator<Item = [f64; 2]> + '_ {
        self.fpr.iter().zip(&self.tpr).map(|(&x, &y)| [x, y])
    }
}
