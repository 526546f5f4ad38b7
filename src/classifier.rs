//! Binary logistic regression.
//!
//! Minimises `C * sum(log-loss) + R(w)` where `R` is `0.5 * |w|^2` for L2,
//! `|w|_1` for L1 and absent without a penalty. The intercept is never
//! penalised.

use log::{debug, warn};
use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::config::{Penalty, Solver};
use crate::error::{Error, Result};
use crate::types::Label;

pub const DEFAULT_MAX_ITER: usize = 3000;
pub const DEFAULT_TOL: f64 = 1e-4;

/// Armijo sufficient-decrease constant.
const ARMIJO: f64 = 1e-4;
const MAX_BACKTRACKS: usize = 60;

/// Hyper-parameters of a logistic regression, validated by the builder.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LogisticParams {
    /// Inverse regularisation strength.
    pub c: f64,
    pub penalty: Penalty,
    pub solver: Solver,
    pub max_iter: usize,
    pub tol: f64,
    pub fit_intercept: bool,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self {
            c: 1.0,
            penalty: Penalty::None,
            solver: Solver::Newton,
            max_iter: DEFAULT_MAX_ITER,
            tol: DEFAULT_TOL,
            fit_intercept: true,
        }
    }
}

impl LogisticParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.c > 0.0 && self.c.is_finite()) {
            return Err(Error::InvalidConfig(format!("C = {} must be positive", self.c)));
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig("max_iter must be positive".into()));
        }
        if !(self.tol > 0.0) {
            return Err(Error::InvalidConfig("tol must be positive".into()));
        }
        if !self.solver.supports(self.penalty) {
            return Err(Error::UnsupportedPenalty {
                penalty: self.penalty.name(),
                solver: self.solver.name(),
            });
        }
        Ok(())
    }

    /// Fit on `x` (one sample per row) with index-aligned labels.
    pub fn fit(&self, x: &Array2<f64>, y: &[Label]) -> Result<LogisticRegression> {
        self.validate()?;
        if x.nrows() != y.len() {
            return Err(Error::LengthMismatch {
                features: x.nrows(),
                labels: y.len(),
            });
        }
        let positives = y.iter().filter(|l| l.is_positive()).count();
        if positives == 0 || positives == y.len() {
            return Err(Error::SingleClass);
        }

        let problem = Problem {
            x,
            y: y.iter().map(|l| l.target()).collect(),
            c: self.c,
            penalty: self.penalty,
            fit_intercept: self.fit_intercept,
        };

        let fit = match self.solver {
            Solver::Newton => newton(&problem, self.max_iter, self.tol)?,
            Solver::Proximal => proximal(&problem, self.max_iter, self.tol),
        };

        if fit.converged {
            debug!(
                "logistic regression (C = {}, penalty = {}) converged after {} iterations",
                self.c,
                self.penalty.name(),
                fit.n_iter
            );
        } else {
            warn!(
                "logistic regression (C = {}, penalty = {}, solver = {}) did not converge in {} iterations",
                self.c,
                self.penalty.name(),
                self.solver.name(),
                self.max_iter
            );
        }

        Ok(LogisticRegression {
            params: *self,
            coef: fit.w,
            intercept: fit.b,
            n_iter: fit.n_iter,
            converged: fit.converged,
        })
    }
}

/// Builder for [`LogisticParams`].
#[derive(Debug, Clone, Default)]
pub struct LogisticRegressionBuilder {
    params: LogisticParams,
}

impl LogisticRegressionBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn c(mut self, c: f64) -> Self {
        self.params.c = c;
        self
    }

    pub fn penalty(mut self, penalty: Penalty) -> Self {
        self.params.penalty = penalty;
        self
    }

    pub fn solver(mut self, solver: Solver) -> Self {
        self.params.solver = solver;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.params.max_iter = max_iter;
        self
    }

    pub fn tol(mut self, tol: f64) -> Self {
        self.params.tol = tol;
        self
    }

    pub fn fit_intercept(mut self, fit_intercept: bool) -> Self {
        self.params.fit_intercept = fit_intercept;
        self
    }

    pub fn build(self) -> Result<LogisticParams> {
        self.params.validate()?;
        Ok(self.params)
    }

    pub fn fit(self, x: &Array2<f64>, y: &[Label]) -> Result<LogisticRegression> {
        self.params.fit(x, y)
    }
}

/// A fitted classifier. Read-only after fitting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    params: LogisticParams,
    coef: Array1<f64>,
    intercept: f64,
    n_iter: usize,
    converged: bool,
}

impl LogisticRegression {
    pub fn builder() -> LogisticRegressionBuilder {
        LogisticRegressionBuilder::new()
    }

    pub fn params(&self) -> &LogisticParams {
        &self.params
    }

    pub fn coef(&self) -> &Array1<f64> {
        &self.coef
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    pub fn n_features(&self) -> usize {
        self.coef.len()
    }

    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    /// Signed distance to the decision boundary, `x . w + b`.
    pub fn decision_function(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if x.ncols() != self.coef.len() {
            return Err(Error::DimensionMismatch {
                expected: self.coef.len(),
                found: x.ncols(),
            });
        }
        Ok(x.dot(&self.coef) + self.intercept)
    }

    /// Probability of the `Adult` class.
    pub fn predict_proba(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }

    pub fn predict(&self, x: &Array2<f64>) -> Result<Vec<Label>> {
        Ok(self
            .decision_function(x)?
            .iter()
            .map(|&z| Label::from_positive(z > 0.0))
            .collect())
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// `ln(1 + e^z)` without overflow.
fn softplus(z: f64) -> f64 {
    if z > 0.0 {
        z + (-z).exp().ln_1p()
    } else {
        z.exp().ln_1p()
    }
}

fn soft_threshold(v: f64, lambda: f64) -> f64 {
    v.signum() * (v.abs() - lambda).max(0.0)
}

fn max_abs<'a>(values: impl IntoIterator<Item = &'a f64>) -> f64 {
    values.into_iter().fold(0.0_f64, |m, v| m.max(v.abs()))
}

struct Problem<'a> {
    x: &'a Array2<f64>,
    y: Array1<f64>,
    c: f64,
    penalty: Penalty,
    fit_intercept: bool,
}

struct Fit {
    w: Array1<f64>,
    b: f64,
    n_iter: usize,
    converged: bool,
}

impl Problem<'_> {
    fn margins(&self, w: &Array1<f64>, b: f64) -> Array1<f64> {
        self.x.dot(w) + b
    }

    /// Differentiable part of the objective (log-loss plus any L2 term).
    fn smooth(&self, w: &Array1<f64>, b: f64) -> f64 {
        let z = self.margins(w, b);
        let loss: f64 = z
            .iter()
            .zip(&self.y)
            .map(|(&zi, &yi)| softplus(zi) - yi * zi)
            .sum();
        let reg = match self.penalty {
            Penalty::L2 => 0.5 * w.dot(w),
            _ => 0.0,
        };
        self.c * loss + reg
    }

    fn l1(&self, w: &Array1<f64>) -> f64 {
        match self.penalty {
            Penalty::L1 => w.iter().map(|v| v.abs()).sum(),
            _ => 0.0,
        }
    }

    /// Returns (probabilities, gradient w.r.t. w, gradient w.r.t. b).
    fn gradient(&self, w: &Array1<f64>, b: f64) -> (Array1<f64>, Array1<f64>, f64) {
        let p = self.margins(w, b).mapv(sigmoid);
        let residual = &p - &self.y;
        let mut gw = self.x.t().dot(&residual) * self.c;
        if self.penalty == Penalty::L2 {
            gw += w;
        }
        let gb = if self.fit_intercept {
            self.c * residual.sum()
        } else {
            0.0
        };
        (p, gw, gb)
    }

    /// Every gradient entry within `tol`; a NaN entry never is.
    fn stationary(&self, gw: &Array1<f64>, gb: f64, tol: f64) -> bool {
        gb.abs() <= tol && gw.iter().all(|g| g.abs() <= tol)
    }

    fn converged(&self, before: f64, after: f64, tol: f64) -> bool {
        (before - after).abs() <= tol * after.abs().max(1.0)
    }
}

fn newton(problem: &Problem<'_>, max_iter: usize, tol: f64) -> Result<Fit> {
    let d = problem.x.ncols();
    let dim = d + usize::from(problem.fit_intercept);
    let mut w = Array1::zeros(d);
    let mut b = 0.0;
    let mut f = problem.smooth(&w, b);

    for iter in 1..=max_iter {
        let (p, gw, gb) = problem.gradient(&w, b);
        if problem.stationary(&gw, gb, tol) {
            return Ok(Fit {
                w,
                b,
                n_iter: iter - 1,
                converged: true,
            });
        }

        // Hessian: C * X^T S X, S = diag(p (1 - p)), plus identity for L2.
        let s = p.mapv(|pi| pi * (1.0 - pi)) * problem.c;
        let weighted = problem.x * &s.view().insert_axis(Axis(1));
        let xtsx = problem.x.t().dot(&weighted);
        let col = weighted.sum_axis(Axis(0));
        let l2 = if problem.penalty == Penalty::L2 { 1.0 } else { 0.0 };

        let hessian = DMatrix::from_fn(dim, dim, |i, j| match (i < d, j < d) {
            (true, true) => xtsx[[i, j]] + if i == j { l2 } else { 0.0 },
            (true, false) => col[i],
            (false, true) => col[j],
            (false, false) => s.sum(),
        });
        let grad = DVector::from_fn(dim, |i, _| if i < d { gw[i] } else { gb });
        let step = solve_spd(hessian, &grad)?;

        let dir_w: Array1<f64> = (0..d).map(|i| -step[i]).collect();
        let dir_b = if problem.fit_intercept { -step[d] } else { 0.0 };
        let slope = gw.dot(&dir_w) + gb * dir_b;

        let mut t = 1.0;
        let mut accepted = None;
        for _ in 0..MAX_BACKTRACKS {
            let w_try = &w + &(&dir_w * t);
            let b_try = b + t * dir_b;
            let f_try = problem.smooth(&w_try, b_try);
            if f_try <= f + ARMIJO * t * slope {
                accepted = Some((w_try, b_try, f_try));
                break;
            }
            t *= 0.5;
        }

        let Some((w_new, b_new, f_new)) = accepted else {
            // Stalled: the gradient test at this iterate already failed.
            return Ok(Fit {
                w,
                b,
                n_iter: iter,
                converged: false,
            });
        };

        let done = problem.converged(f, f_new, tol);
        w = w_new;
        b = b_new;
        f = f_new;
        if done {
            return Ok(Fit {
                w,
                b,
                n_iter: iter,
                converged: true,
            });
        }
    }

    Ok(Fit {
        w,
        b,
        n_iter: max_iter,
        converged: false,
    })
}

/// Solve `H x = g` for symmetric positive (semi-)definite `H`, adding a
/// growing diagonal jitter until the Cholesky factorisation succeeds.
fn solve_spd(hessian: DMatrix<f64>, grad: &DVector<f64>) -> Result<DVector<f64>> {
    let n = hessian.nrows();
    let scale = (hessian.trace() / n.max(1) as f64).abs().max(1.0);
    let mut jitter = 1e-10 * scale;

    for _ in 0..12 {
        let mut damped = hessian.clone();
        for i in 0..n {
            damped[(i, i)] += jitter;
        }
        if let Some(chol) = damped.cholesky() {
            return Ok(chol.solve(grad));
        }
        jitter *= 10.0;
    }

    Err(Error::Numerical("Hessian is not positive definite".into()))
}

fn proximal(problem: &Problem<'_>, max_iter: usize, tol: f64) -> Fit {
    let d = problem.x.ncols();
    let l1_weight = if problem.penalty == Penalty::L1 { 1.0 } else { 0.0 };
    let mut w = Array1::zeros(d);
    let mut b = 0.0;
    let mut objective = problem.smooth(&w, b) + problem.l1(&w);
    let mut lipschitz = 1.0_f64;

    for iter in 1..=max_iter {
        let (_, gw, gb) = problem.gradient(&w, b);
        let f_smooth = problem.smooth(&w, b);

        let (mut w_new, mut b_new) = (w.clone(), b);
        for _ in 0..MAX_BACKTRACKS {
            let step = 1.0 / lipschitz;
            w_new = (&w - &(&gw * step)).mapv(|v| soft_threshold(v, step * l1_weight));
            b_new = b - step * gb;

            let dw = &w_new - &w;
            let db = b_new - b;
            let model = f_smooth
                + gw.dot(&dw)
                + gb * db
                + 0.5 * lipschitz * (dw.dot(&dw) + db * db);
            if problem.smooth(&w_new, b_new) <= model + 1e-12 * model.abs() {
                break;
            }
            lipschitz *= 2.0;
        }

        // Norm of the gradient mapping.
        let movement = lipschitz * max_abs((&w_new - &w).iter()).max((b_new - b).abs());
        let objective_new = problem.smooth(&w_new, b_new) + problem.l1(&w_new);
        let done = movement <= tol || problem.converged(objective, objective_new, tol);

        w = w_new;
        b = b_new;
        objective = objective_new;
        if done {
            return Fit {
                w,
                b,
                n_iter: iter,
                converged: true,
            };
        }
        // Let the step grow again; backtracking shrinks it when needed.
        lipschitz = (lipschitz * 0.5).max(f64::MIN_POSITIVE);
    }

    Fit {
        w,
        b,
        n_iter: max_iter,
        converged: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use Label::{Adult as A, Child as C};

    /// Ten 4-d points, split by the sign of the first coordinate.
    fn separable() -> (Array2<f64>, Vec<Label>) {
        let x = array![
            [-3.0, 0.2, 1.0, 0.5],
            [-2.5, -0.1, 0.8, 0.4],
            [-2.0, 0.3, 1.2, 0.6],
            [-3.5, 0.0, 0.9, 0.5],
            [-2.8, -0.2, 1.1, 0.4],
            [3.0, 0.1, 1.0, 0.5],
            [2.5, -0.3, 0.9, 0.6],
            [2.0, 0.2, 1.1, 0.4],
            [3.5, 0.0, 1.0, 0.5],
            [2.8, -0.1, 0.8, 0.6]
        ];
        let y = vec![C, C, C, C, C, A, A, A, A, A];
        (x, y)
    }

    /// Overlapping classes so the unpenalised optimum is finite.
    fn overlapping() -> (Array2<f64>, Vec<Label>) {
        let x = array![[-2.0], [-1.0], [0.5], [-0.5], [1.0], [2.0], [0.2], [-0.2]];
        let y = vec![C, C, C, A, A, A, A, C];
        (x, y)
    }

    #[test]
    fn separable_data_is_classified_perfectly() {
        let (x, y) = separable();
        let model = LogisticRegression::builder().fit(&x, &y).unwrap();
        assert_eq!(model.predict(&x).unwrap(), y);
        assert!(model.coef()[0] > 0.0);
    }

    #[test]
    fn newton_and_proximal_agree_on_l2() {
        let (x, y) = overlapping();
        let newton = LogisticRegression::builder()
            .penalty(Penalty::L2)
            .tol(1e-10)
            .fit(&x, &y)
            .unwrap();
        let prox = LogisticRegression::builder()
            .penalty(Penalty::L2)
            .solver(Solver::Proximal)
            .tol(1e-10)
            .max_iter(20_000)
            .fit(&x, &y)
            .unwrap();
        assert!((newton.coef()[0] - prox.coef()[0]).abs() < 1e-3);
        assert!((newton.intercept() - prox.intercept()).abs() < 1e-3);
    }

    #[test]
    fn newton_reaches_stationary_point() {
        let (x, y) = overlapping();
        let model = LogisticRegression::builder().tol(1e-9).fit(&x, &y).unwrap();
        assert!(model.converged());

        // Gradient of the log-loss vanishes at the optimum.
        let p = model.predict_proba(&x).unwrap();
        let targets: Array1<f64> = y.iter().map(|l| l.target()).collect();
        let residual = &p - &targets;
        assert!(residual.sum().abs() < 1e-6);
        assert!(x.t().dot(&residual)[0].abs() < 1e-6);
    }

    #[test]
    fn strong_l1_zeroes_the_weights() {
        let (x, y) = overlapping();
        let model = LogisticRegression::builder()
            .c(1e-3)
            .penalty(Penalty::L1)
            .solver(Solver::Proximal)
            .fit(&x, &y)
            .unwrap();
        assert_eq!(model.coef()[0], 0.0);
    }

    #[test]
    fn l1_keeps_the_informative_feature() {
        let (x, y) = separable();
        let model = LogisticRegression::builder()
            .c(10.0)
            .penalty(Penalty::L1)
            .solver(Solver::Proximal)
            .fit(&x, &y)
            .unwrap();
        assert!(model.coef()[0] > 0.0);
        assert_eq!(model.predict(&x).unwrap(), y);
    }

    #[test]
    fn rejects_invalid_inputs() {
        let (x, y) = separable();
        assert!(matches!(
            LogisticRegression::builder().fit(&x, &y[..3]),
            Err(Error::LengthMismatch { features: 10, labels: 3 })
        ));
        assert!(matches!(
            LogisticRegression::builder().fit(&x, &[C; 10]),
            Err(Error::SingleClass)
        ));
        assert!(matches!(
            LogisticRegression::builder().penalty(Penalty::L1).build(),
            Err(Error::UnsupportedPenalty { .. })
        ));
        assert!(matches!(
            LogisticRegression::builder().c(0.0).build(),
            Err(Error::InvalidConfig(_))
        ));
    }

    #[test]
    fn prediction_checks_width() {
        let (x, y) = separable();
        let model = LogisticRegression::builder().fit(&x, &y).unwrap();
        assert!(matches!(
            model.predict(&array![[1.0, 2.0]]),
            Err(Error::DimensionMismatch { expected: 4, found: 2 })
        ));
    }

    #[test]
    fn probabilities_follow_decision_sign() {
        let (x, y) = overlapping();
        let model = LogisticRegression::builder().fit(&x, &y).unwrap();
        let z = model.decision_function(&x).unwrap();
        let p = model.predict_proba(&x).unwrap();
        for (zi, pi) in z.iter().zip(&p) {
            assert!((0.0..=1.0).contains(pi));
            assert_eq!(*zi > 0.0, *pi > 0.5);
        }
    }

    #[test]
    fn stalled_line_search_is_not_converged() {
        // NaN targets give a NaN objective, so no step passes the Armijo test
        // while the Hessian stays finite.
        let (x, _) = overlapping();
        let problem = Problem {
            x: &x,
            y: Array1::from_elem(x.nrows(), f64::NAN),
            c: 1.0,
            penalty: Penalty::None,
            fit_intercept: true,
        };
        let fit = newton(&problem, 50, 1e-4).unwrap();
        assert!(!fit.converged);
        assert_eq!(fit.n_iter, 1);
    }

    #[test]
    fn nan_gradient_is_not_stationary() {
        let (x, _) = overlapping();
        let problem = Problem {
            x: &x,
            y: Array1::zeros(x.nrows()),
            c: 1.0,
            penalty: Penalty::None,
            fit_intercept: true,
        };
        assert!(problem.stationary(&array![0.0, 1e-6], 0.0, 1e-4));
        assert!(!problem.stationary(&array![f64::NAN], 0.0, 1e-4));
        assert!(!problem.stationary(&array![0.0], f64::NAN, 1e-4));
        assert!(!problem.stationary(&array![0.0], 1e-3, 1e-4));
    }

    #[test]
    fn numerically_stable_helpers() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-12);
        assert!(sigmoid(-800.0) >= 0.0);
        assert!((sigmoid(800.0) - 1.0).abs() < 1e-12);
        assert!((softplus(800.0) - 800.0).abs() < 1e-9);
        assert!(softplus(-800.0) >= 0.0);
        assert_eq!(soft_threshold(3.0, 1.0), 2.0);
        assert_eq!(soft_threshold(-3.0, 1.0), -2.0);
        assert_eq!(soft_threshold(0.5, 1.0), 0.0);
    }
}
