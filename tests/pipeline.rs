//! End-to-end runs of the experiment on synthetic image directories.

use face_age_pca::{
    experiment, AgeClassifier, DataLayout, Error, ExperimentConfig, Label, Mode, Penalty,
    SearchStrategy, Solver,
};
use image::{GrayImage, Luma};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::{Path, PathBuf};

const SIZE: u32 = 8;

/// Fresh directory tree under the system temp dir, removed on drop.
struct Fixture {
    root: PathBuf,
}

impl Fixture {
    fn new(name: &str) -> Self {
        let root = std::env::temp_dir().join(format!(
            "face-age-pca-pipeline-{}-{}",
            name,
            std::process::id()
        ));
        std::fs::remove_dir_all(&root).ok();
        std::fs::create_dir_all(&root).unwrap();
        Self { root }
    }

    /// Write `count` noisy faces around `level` into `dir`.
    fn write_faces(&self, dir: &Path, count: usize, level: f64, rng: &mut StdRng) {
        let dir = self.root.join(dir);
        std::fs::create_dir_all(&dir).unwrap();
        for i in 0..count {
            let img = GrayImage::from_fn(SIZE, SIZE, |x, y| {
                // A gradient keeps the faces from being flat blobs.
                let shade = level + 2.0 * (x as f64 - y as f64) + rng.gen_range(-20.0..20.0);
                Luma([shade.clamp(0.0, 255.0) as u8])
            });
            img.save(dir.join(format!("face_{:03}.png", i))).unwrap();
        }
    }

    /// Children dark, adults bright.
    fn populate(&self, train_per_class: usize, test_per_class: usize, seed: u64) -> DataLayout {
        let layout = DataLayout::with_root(&self.root);
        let mut rng = StdRng::seed_from_u64(seed);
        self.write_faces(&layout.children_train, train_per_class, 60.0, &mut rng);
        self.write_faces(&layout.adults_train, train_per_class, 190.0, &mut rng);
        self.write_faces(&layout.children_test, test_per_class, 60.0, &mut rng);
        self.write_faces(&layout.adults_test, test_per_class, 190.0, &mut rng);
        layout
    }
}

impl Drop for Fixture {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.root).ok();
    }
}

fn base_config(layout: DataLayout) -> ExperimentConfig {
    ExperimentConfig {
        layout,
        image_size: SIZE,
        max_iter: 500,
        ..ExperimentConfig::default()
    }
}

#[test]
fn fixed_components_run() {
    let fixture = Fixture::new("fixed");
    let layout = fixture.populate(6, 4, 7);
    let config = ExperimentConfig {
        mode: Mode::UseFixedComponents(3),
        ..base_config(layout)
    };

    let report = experiment::run(&config).unwrap();

    assert_eq!(report.input_dimension, (SIZE * SIZE) as usize);
    assert_eq!(report.components, 3);
    assert!(report.selection.is_none());
    assert!(report.explained_variance > 0.0 && report.explained_variance <= 1.0);

    assert_eq!(report.train.confusion.total(), 12);
    assert_eq!(report.test.confusion.total(), 8);
    assert!((0.0..=1.0).contains(&report.test.f1));
    assert!(report.train.accuracy >= 0.9);
    assert!(report.test.accuracy >= 0.9);
    assert!((0.0..=1.0).contains(&report.roc_auc));
}

#[test]
fn search_mode_sweeps_every_c() {
    let fixture = Fixture::new("search");
    let layout = fixture.populate(6, 4, 11);
    let config = ExperimentConfig {
        mode: Mode::SearchFromScratch,
        c_values: vec![0.1, 1.0, 10.0],
        cv_folds: 3,
        ..base_config(layout)
    };

    let report = experiment::run(&config).unwrap();

    // Centred data of 12 samples has rank at most 11.
    assert!(report.components >= 1 && report.components <= 11);
    assert!(report.explained_variance > config.threshold);

    let selection = report.selection.as_ref().unwrap();
    assert_eq!(selection.penalty, Penalty::L1);
    let cs: Vec<f64> = selection.points.iter().map(|p| p.c).collect();
    assert_eq!(cs, vec![0.1, 1.0, 10.0]);
    for point in &selection.points {
        assert_eq!(point.cv.folds.len(), 3);
        assert!((0.0..=1.0).contains(&point.cv.mean));
        assert!(point.cv.std_dev >= 0.0);
    }
    assert!(selection.model_for(1.0).is_some());
    assert_eq!(report.model.classifier().params().c, 1.0);

    assert_eq!(report.train.confusion.total(), 12);
    assert!((0.0..=1.0).contains(&report.train.f1));
    assert!((0.0..=1.0).contains(&report.test.f1));
}

#[test]
fn search_strategies_pick_the_same_count() {
    let fixture = Fixture::new("strategies");
    let layout = fixture.populate(6, 3, 3);
    let bisection = ExperimentConfig {
        mode: Mode::SearchFromScratch,
        c_values: vec![1.0],
        cv_folds: 2,
        sweep_penalty: Penalty::L2,
        sweep_solver: Solver::Newton,
        ..base_config(layout)
    };
    let coarse = ExperimentConfig {
        search: SearchStrategy::CoarseToFine { step: 4 },
        ..bisection.clone()
    };

    let a = experiment::run(&bisection).unwrap();
    let b = experiment::run(&coarse).unwrap();
    assert_eq!(a.components, b.components);
}

#[test]
fn saved_model_predicts_like_the_report() {
    let fixture = Fixture::new("saved");
    let layout = fixture.populate(5, 3, 5);
    let config = ExperimentConfig {
        mode: Mode::UseFixedComponents(2),
        ..base_config(layout.clone())
    };
    let report = experiment::run(&config).unwrap();

    let path = fixture.root.join("model.bin");
    report.model.save(&path).unwrap();
    let model = AgeClassifier::load(&path).unwrap();

    let face = face_age_pca::loader::load_luma_image(
        layout.resolve(&layout.adults_test).join("face_000.png"),
        SIZE,
    )
    .unwrap();
    assert_eq!(
        model.predict_image(&face).unwrap(),
        report.model.predict_image(&face).unwrap()
    );
    assert_eq!(model.predict_image(&face).unwrap(), Label::Adult);
}

#[test]
fn too_many_components_is_an_error() {
    let fixture = Fixture::new("components");
    let layout = fixture.populate(3, 2, 1);
    let config = ExperimentConfig {
        mode: Mode::UseFixedComponents(50),
        ..base_config(layout)
    };
    assert!(matches!(
        experiment::run(&config),
        Err(Error::InvalidComponents { requested: 50, .. })
    ));
}

#[test]
fn wrong_image_size_is_an_error() {
    let fixture = Fixture::new("size");
    let layout = fixture.populate(3, 2, 2);
    let config = ExperimentConfig {
        image_size: 48,
        mode: Mode::UseFixedComponents(2),
        ..base_config(layout)
    };
    assert!(matches!(
        experiment::run(&config),
        Err(Error::ShapeMismatch { expected: 48, width: 8, height: 8, .. })
    ));
}

#[test]
fn missing_test_images_is_an_error() {
    let fixture = Fixture::new("empty");
    let layout = DataLayout::with_root(&fixture.root);
    let mut rng = StdRng::seed_from_u64(9);
    fixture.write_faces(&layout.children_train, 3, 60.0, &mut rng);
    fixture.write_faces(&layout.adults_train, 3, 190.0, &mut rng);
    fixture.write_faces(&layout.adults_test, 2, 190.0, &mut rng);
    std::fs::create_dir_all(fixture.root.join(&layout.children_test)).unwrap();

    let config = ExperimentConfig {
        mode: Mode::UseFixedComponents(2),
        ..base_config(layout)
    };
    assert!(matches!(
        experiment::run(&config),
        Err(Error::EmptyDirectory(_))
    ));
}
