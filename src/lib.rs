//! # face-age-pca
//!
//! Children vs adults classification of small grayscale face images.
//!
//! This crate provides:
//! - **Loading**: directories of images decoded to a 48x48 luma grid
//! - **Reduction**: principal component analysis and a search for the
//!   smallest component count that keeps 99% of the variance
//! - **Classification**: logistic regression with optional L1/L2 penalty,
//!   stratified k-fold cross-validation
//! - **Evaluation**: confusion matrix, accuracy, F1 and ROC curve
//!
//! ## Pipeline
//!
//! 1. Load the four image directories (children/adults, train/test)
//! 2. Flatten every image into a feature vector, labelled by directory
//! 3. Fit PCA on the training set, with either a fixed component count or
//!    the count found by [`DimensionFinder`]
//! 4. In search mode, sweep the regularisation strength `C` with
//!    cross-validation and keep the model for the selected `C`
//! 5. Report train/test metrics and the test ROC curve
//!
//! ## Quick Start
//!
//! ```rust
//! use face_age_pca::{
//!     experiment, Dataset, ExperimentConfig, Label, Mode, Split,
//! };
//! use ndarray::array;
//!
//! let train = Dataset::new(
//!     array![[0.0, 1.0], [0.5, 1.2], [4.0, 1.1], [4.5, 0.9]],
//!     vec![Label::Child, Label::Child, Label::Adult, Label::Adult],
//! )
//! .unwrap();
//! let test = train.clone();
//!
//! let config = ExperimentConfig {
//!     mode: Mode::UseFixedComponents(1),
//!     ..ExperimentConfig::default()
//! };
//! let report = experiment::run_on_split(&config, &Split { train, test }).unwrap();
//! assert_eq!(report.test.confusion.total(), 4);
//! ```
//!
//! ## Finding the component count
//!
//! ```rust
//! use face_age_pca::DimensionFinder;
//! use ndarray::array;
//!
//! // Only the first axis varies.
//! let data = array![[0.0, 5.0], [1.0, 5.0], [3.0, 5.0], [7.0, 5.0]];
//! let k = DimensionFinder::default().find_for(&data).unwrap();
//! assert_eq!(k, 1);
//! ```

pub mod classifier;
pub mod config;
pub mod dimension;
mod error;
pub mod experiment;
mod features;
pub mod loader;
pub mod metrics;
mod model;
pub mod pca;
mod types;
pub mod validation;

pub use classifier::{LogisticParams, LogisticRegression, LogisticRegressionBuilder};
pub use config::{DataLayout, ExperimentArgs, ExperimentConfig, Mode, Penalty, Solver};
pub use dimension::{DimensionFinder, RefitProfile, SearchStrategy, VarianceProfile};
pub use error::{Error, Result};
pub use experiment::{Evaluation, ModelSelection, Report, SweepPoint};
pub use features::{vectorize, ImageAccess, LumaImage};
pub use metrics::{ConfusionMatrix, RocCurve};
pub use model::AgeClassifier;
pub use pca::{Pca, Spectrum};
pub use types::{Dataset, Label, Split};
pub use validation::{cross_validate, CvScore, StratifiedKFold};
