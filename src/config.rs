//! Experiment configuration.
//!
//! An [`ExperimentConfig`] can come from a JSON file, from command-line flags
//! ([`ExperimentArgs`]), or both, with flags taking precedence.

use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::dimension::{SearchStrategy, COARSE_STEP, DEFAULT_THRESHOLD};
use crate::error::{Error, Result};

/// Component count found by a full search on the reference data set.
pub const DEFAULT_COMPONENTS: usize = 917;

/// Side length of the square luma grid every image must have.
pub const DEFAULT_IMAGE_SIZE: u32 = 48;

/// Regularisation strengths swept in search mode.
pub const DEFAULT_C_VALUES: [f64; 5] = [0.1, 1.0, 10.0, 100.0, 1000.0];

/// How the PCA component count is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Search the component count, then sweep `C` with cross-validation.
    SearchFromScratch,
    /// Use a known component count and a single unpenalised classifier.
    UseFixedComponents(usize),
}

impl Default for Mode {
    fn default() -> Self {
        Mode::UseFixedComponents(DEFAULT_COMPONENTS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    #[default]
    None,
    L1,
    L2,
}

impl Penalty {
    pub const fn name(self) -> &'static str {
        match self {
            Penalty::None => "none",
            Penalty::L1 => "l1",
            Penalty::L2 => "l2",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    /// Damped Newton steps; no L1 support.
    #[default]
    Newton,
    /// Proximal gradient; supports every penalty.
    Proximal,
}

impl Solver {
    pub const fn name(self) -> &'static str {
        match self {
            Solver::Newton => "newton",
            Solver::Proximal => "proximal",
        }
    }

    pub const fn supports(self, penalty: Penalty) -> bool {
        !matches!((self, penalty), (Solver::Newton, Penalty::L1))
    }
}

/// Where the four image directories live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataLayout {
    pub root: PathBuf,
    pub children_train: PathBuf,
    pub children_test: PathBuf,
    pub adults_train: PathBuf,
    pub adults_test: PathBuf,
}

impl DataLayout {
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            ..Self::default()
        }
    }

    pub fn resolve(&self, dir: &Path) -> PathBuf {
        self.root.join(dir)
    }
}

impl Default for DataLayout {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            children_train: PathBuf::from("Image/Children_train"),
            children_test: PathBuf::from("Image/Children_test"),
            adults_train: PathBuf::from("Image/Adults_train"),
            adults_test: PathBuf::from("Image/Adults_test"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    pub layout: DataLayout,
    pub image_size: u32,
    pub mode: Mode,
    /// Explained-variance ratio the component count must exceed.
    pub threshold: f64,
    pub search: SearchStrategy,
    pub c_values: Vec<f64>,
    pub sweep_penalty: Penalty,
    pub sweep_solver: Solver,
    pub cv_folds: usize,
    /// Which swept model is evaluated and kept.
    pub selected_c: f64,
    pub max_iter: usize,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            layout: DataLayout::default(),
            image_size: DEFAULT_IMAGE_SIZE,
            mode: Mode::default(),
            threshold: DEFAULT_THRESHOLD,
            search: SearchStrategy::default(),
            c_values: DEFAULT_C_VALUES.to_vec(),
            sweep_penalty: Penalty::L1,
            sweep_solver: Solver::Proximal,
            cv_folds: 5,
            selected_c: 1.0,
            max_iter: 3000,
        }
    }
}

impl ExperimentConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.image_size == 0 {
            return Err(Error::InvalidConfig("image_size must be positive".into()));
        }
        if !(self.threshold > 0.0 && self.threshold < 1.0) {
            return Err(Error::InvalidConfig(format!(
                "threshold {} must lie in (0, 1)",
                self.threshold
            )));
        }
        if self.max_iter == 0 {
            return Err(Error::InvalidConfig("max_iter must be positive".into()));
        }
        if let SearchStrategy::CoarseToFine { step: 0 } = self.search {
            return Err(Error::InvalidConfig("coarse search step must be positive".into()));
        }

        match self.mode {
            Mode::UseFixedComponents(0) => {
                Err(Error::InvalidConfig("component count must be positive".into()))
            }
            Mode::UseFixedComponents(_) => Ok(()),
            Mode::SearchFromScratch => {
                if self.c_values.is_empty() {
                    return Err(Error::InvalidConfig("c_values must not be empty".into()));
                }
                if let Some(c) = self.c_values.iter().find(|c| !(**c > 0.0)) {
                    return Err(Error::InvalidConfig(format!("C = {c} must be positive")));
                }
                if !self.sweep_solver.supports(self.sweep_penalty) {
                    return Err(Error::UnsupportedPenalty {
                        penalty: self.sweep_penalty.name(),
                        solver: self.sweep_solver.name(),
                    });
                }
                if !self.c_values.contains(&self.selected_c) {
                    return Err(Error::MissingSweepModel(self.selected_c));
                }
                Ok(())
            }
        }
    }
}

/// Command-line flags shared by the CLI and the plot viewer.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ExperimentArgs {
    /// JSON configuration file; flags below override its values
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory containing the `Image/...` folders
    #[arg(long)]
    pub data_root: Option<PathBuf>,

    /// Search the component count and sweep C instead of using a fixed count
    #[arg(long, conflicts_with = "components")]
    pub search: bool,

    /// Fixed PCA component count
    #[arg(long)]
    pub components: Option<usize>,

    /// Use the coarse-to-fine component search instead of bisection
    #[arg(long)]
    pub coarse_search: bool,

    /// Explained-variance threshold for the component search
    #[arg(long)]
    pub threshold: Option<f64>,

    /// Regularisation strengths to sweep (comma separated)
    #[arg(long, value_delimiter = ',')]
    pub c_values: Option<Vec<f64>>,

    /// Penalty used in the C sweep
    #[arg(long, value_enum)]
    pub penalty: Option<Penalty>,

    /// Solver used in the C sweep
    #[arg(long, value_enum)]
    pub solver: Option<Solver>,

    /// Cross-validation fold count
    #[arg(long)]
    pub cv: Option<usize>,

    /// C value of the swept model to evaluate
    #[arg(long)]
    pub selected_c: Option<f64>,

    /// Iteration cap for the classifier
    #[arg(long)]
    pub max_iter: Option<usize>,

    /// Expected image side length in pixels
    #[arg(long)]
    pub image_size: Option<u32>,
}

impl ExperimentArgs {
    pub fn to_config(&self) -> Result<ExperimentConfig> {
        let mut config = match &self.config {
            Some(path) => ExperimentConfig::from_json_file(path)?,
            None => ExperimentConfig::default(),
        };

        if let Some(root) = &self.data_root {
            config.layout.root = root.clone();
        }
        if self.search {
            config.mode = Mode::SearchFromScratch;
        }
        if let Some(k) = self.components {
            config.mode = Mode::UseFixedComponents(k);
        }
        if self.coarse_search {
            config.search = SearchStrategy::CoarseToFine { step: COARSE_STEP };
        }
        if let Some(t) = self.threshold {
            config.threshold = t;
        }
        if let Some(c_values) = &self.c_values {
            config.c_values = c_values.clone();
        }
        if let Some(p) = self.penalty {
            config.sweep_penalty = p;
        }
        if let Some(s) = self.solver {
            config.sweep_solver = s;
        }
        if let Some(cv) = self.cv {
            config.cv_folds = cv;
        }
        if let Some(c) = self.selected_c {
            config.selected_c = c;
        }
        if let Some(n) = self.max_iter {
            config.max_iter = n;
        }
        if let Some(size) = self.image_size {
            config.image_size = size;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_fast_path() {
        let config = ExperimentConfig::default();
        assert_eq!(config.mode, Mode::UseFixedComponents(917));
        assert_eq!(config.image_size, 48);
        assert_eq!(config.cv_folds, 5);
        assert_eq!(config.c_values, vec![0.1, 1.0, 10.0, 100.0, 1000.0]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn search_mode_requires_selected_c_in_sweep() {
        let config = ExperimentConfig {
            mode: Mode::SearchFromScratch,
            selected_c: 3.0,
            ..ExperimentConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::MissingSweepModel(c)) if c == 3.0));
    }

    #[test]
    fn newton_rejects_l1() {
        let config = ExperimentConfig {
            mode: Mode::SearchFromScratch,
            sweep_solver: Solver::Newton,
            sweep_penalty: Penalty::L1,
            ..ExperimentConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(Error::UnsupportedPenalty { penalty: "l1", solver: "newton" })
        ));
    }

    #[test]
    fn rejects_out_of_range_threshold() {
        let config = ExperimentConfig {
            threshold: 1.0,
            ..ExperimentConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn json_partial_config_uses_defaults() {
        let json = r#"{ "mode": "search_from_scratch", "cv_folds": 3,
                        "search": { "kind": "coarse_to_fine", "step": 50 } }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mode, Mode::SearchFromScratch);
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.search, SearchStrategy::CoarseToFine { step: 50 });
        assert_eq!(config.image_size, 48);
        assert_eq!(config.layout, DataLayout::default());
    }

    #[test]
    fn json_fixed_components() {
        let json = r#"{ "mode": { "use_fixed_components": 12 } }"#;
        let config: ExperimentConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.mode, Mode::UseFixedComponents(12));
    }

    #[test]
    fn flags_override_defaults() {
        let args = ExperimentArgs {
            search: true,
            coarse_search: true,
            cv: Some(3),
            c_values: Some(vec![1.0, 2.0]),
            data_root: Some(PathBuf::from("/data")),
            ..ExperimentArgs::default()
        };
        let config = args.to_config().unwrap();
        assert_eq!(config.mode, Mode::SearchFromScratch);
        assert_eq!(config.search, SearchStrategy::CoarseToFine { step: 100 });
        assert_eq!(config.cv_folds, 3);
        assert_eq!(config.c_values, vec![1.0, 2.0]);
        assert_eq!(config.layout.resolve(Path::new("x")), PathBuf::from("/data/x"));
    }
}
