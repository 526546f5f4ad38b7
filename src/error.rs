use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image decode error for {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Model serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Shape mismatch for {path}: expected {expected}x{expected}, found {width}x{height}")]
    ShapeMismatch {
        path: PathBuf,
        expected: u32,
        width: u32,
        height: u32,
    },

    #[error("No images found in {0}")]
    EmptyDirectory(PathBuf),

    #[error("Length mismatch: {features} feature vectors but {labels} labels")]
    LengthMismatch { features: usize, labels: usize },

    #[error("Dimension mismatch: expected {expected} features, got {found}")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("Invalid component count {requested}: must be in 1..={max}")]
    InvalidComponents { requested: usize, max: usize },

    #[error("Explained variance never exceeds {threshold} (reached {reached:.6} at {max_components} components)")]
    VarianceUnreachable {
        threshold: f64,
        reached: f64,
        max_components: usize,
    },

    #[error("Training data contains a single class")]
    SingleClass,

    #[error("Penalty {penalty} is not supported by the {solver} solver")]
    UnsupportedPenalty {
        penalty: &'static str,
        solver: &'static str,
    },

    #[error("Invalid fold count {folds}: need 2 <= folds <= {max}")]
    InvalidFolds { folds: usize, max: usize },

    #[error("Undefined metric: {0}")]
    UndefinedMetric(&'static str),

    #[error("No model was trained for C = {0}")]
    MissingSweepModel(f64),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Numerical error: {0}")]
    Numerical(String),
}

pub type Result<T> = std::result::Result<T, Error>;
