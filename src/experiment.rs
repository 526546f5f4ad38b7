//! The end-to-end experiment: load, reduce, train, evaluate.

use log::{debug, info};
use serde::Serialize;

use crate::classifier::{LogisticParams, LogisticRegression};
use crate::config::{ExperimentConfig, Mode, Penalty};
use crate::dimension::DimensionFinder;
use crate::error::{Error, Result};
use crate::loader;
use crate::metrics::{f1_score, ConfusionMatrix, RocCurve};
use crate::model::AgeClassifier;
use crate::pca::Spectrum;
use crate::types::{Dataset, Split};
use crate::validation::{cross_validate, CvScore};

/// Metrics of a model on one partition.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub confusion: ConfusionMatrix,
    pub accuracy: f64,
    pub f1: f64,
}

impl Evaluation {
    pub fn from_confusion(confusion: ConfusionMatrix) -> Result<Self> {
        Ok(Self {
            accuracy: confusion.accuracy()?,
            f1: confusion.f1()?,
            confusion,
        })
    }
}

/// One regularisation strength of the sweep.
#[derive(Debug, Clone, Serialize)]
pub struct SweepPoint {
    pub c: f64,
    pub cv: CvScore,
    #[serde(skip)]
    pub model: LogisticRegression,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelSelection {
    pub penalty: Penalty,
    pub points: Vec<SweepPoint>,
    /// Test F1 of the unpenalised model, the reference line of the sweep.
    pub baseline_test_f1: f64,
    pub selected_c: f64,
}

impl ModelSelection {
    pub fn model_for(&self, c: f64) -> Option<&LogisticRegression> {
        self.points.iter().find(|p| p.c == c).map(|p| &p.model)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub input_dimension: usize,
    pub components: usize,
    pub explained_variance: f64,
    /// Test F1 of the unpenalised classifier on the reduced features.
    pub holdout_f1: f64,
    pub selection: Option<ModelSelection>,
    pub train: Evaluation,
    pub test: Evaluation,
    pub roc: RocCurve,
    pub roc_auc: f64,
    #[serde(skip)]
    pub model: AgeClassifier,
}

/// Load the configured directories and run the experiment.
pub fn run(config: &ExperimentConfig) -> Result<Report> {
    config.validate()?;
    let split = loader::load_split(&config.layout, config.image_size)?;
    run_on_split(config, &split)
}

/// Run the experiment on already loaded data.
pub fn run_on_split(config: &ExperimentConfig, split: &Split) -> Result<Report> {
    config.validate()?;
    let train = &split.train;
    let test = &split.test;
    if test.n_features() != train.n_features() {
        return Err(Error::DimensionMismatch {
            expected: train.n_features(),
            found: test.n_features(),
        });
    }

    let spectrum = Spectrum::compute(train.features())?;
    let components = match config.mode {
        Mode::SearchFromScratch => DimensionFinder::new(config.threshold)
            .with_strategy(config.search)
            .find(&spectrum)?,
        Mode::UseFixedComponents(k) => k,
    };

    let pca = spectrum.truncate(components)?;
    info!(
        "projecting {} features onto {} components ({:.4} of the variance)",
        train.n_features(),
        components,
        pca.cumulative_explained_variance()
    );

    let reduced_train = train.with_features(pca.transform(train.features())?)?;
    let reduced_test = test.with_features(pca.transform(test.features())?)?;

    let baseline_params = LogisticParams {
        max_iter: config.max_iter,
        ..LogisticParams::default()
    };
    let baseline = baseline_params.fit(reduced_train.features(), reduced_train.labels())?;
    let holdout_f1 = f1_score(reduced_test.labels(), &baseline.predict(reduced_test.features())?)?;
    info!("unpenalised classifier: test F1 = {:.4}", holdout_f1);

    let (classifier, selection) = match config.mode {
        Mode::SearchFromScratch => {
            let selection = sweep(config, &reduced_train, holdout_f1)?;
            let chosen = selection
                .model_for(config.selected_c)
                .cloned()
                .ok_or(Error::MissingSweepModel(config.selected_c))?;
            (chosen, Some(selection))
        }
        Mode::UseFixedComponents(_) => (baseline, None),
    };

    let model = AgeClassifier::new(pca, classifier)?;
    let train_eval = Evaluation::from_confusion(model.confusion(train)?)?;
    let test_eval = Evaluation::from_confusion(model.confusion(test)?)?;
    let scores = model.decision_function(test.features())?.to_vec();
    let roc = RocCurve::from_scores(test.labels(), &scores)?;
    let roc_auc = roc.auc();

    Ok(Report {
        input_dimension: train.n_features(),
        components,
        explained_variance: model.pca().cumulative_explained_variance(),
        holdout_f1,
        selection,
        train: train_eval,
        test: test_eval,
        roc,
        roc_auc,
        model,
    })
}

fn sweep(
    config: &ExperimentConfig,
    train: &Dataset,
    baseline_test_f1: f64,
) -> Result<ModelSelection> {
    let mut points = Vec::with_capacity(config.c_values.len());
    for &c in &config.c_values {
        let params = LogisticParams {
            c,
            penalty: config.sweep_penalty,
            solver: config.sweep_solver,
            max_iter: config.max_iter,
            ..LogisticParams::default()
        };
        let (cv, model) = cross_validate(&params, train, config.cv_folds)?;
        debug!(
            "C = {}: F1 = {:.4} +/- {:.4} over {} folds",
            c,
            cv.mean,
            cv.std_dev,
            cv.folds.len()
        );
        points.push(SweepPoint { c, cv, model });
    }

    Ok(ModelSelection {
        penalty: config.sweep_penalty,
        points,
        baseline_test_f1,
        selected_c: config.selected_c,
    })
}
