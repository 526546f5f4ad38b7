use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::classifier::LogisticRegression;
use crate::error::{Error, Result};
use crate::features::ImageAccess;
use crate::metrics::ConfusionMatrix;
use crate::pca::Pca;
use crate::types::{Dataset, Label};

/// A PCA projection followed by a logistic regression on the reduced
/// features.
///
/// # Usage
///
/// ```ignore
/// let model = AgeClassifier::load("age.bin")?;
/// let label = model.predict_image(&face)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgeClassifier {
    pca: Pca,
    classifier: LogisticRegression,
}

impl AgeClassifier {
    pub fn new(pca: Pca, classifier: LogisticRegression) -> Result<Self> {
        if classifier.n_features() != pca.n_components() {
            return Err(Error::DimensionMismatch {
                expected: pca.n_components(),
                found: classifier.n_features(),
            });
        }
        Ok(Self { pca, classifier })
    }

    /// Load a model from a binary file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        let mut bytes = Vec::new();
        reader.read_to_end(&mut bytes)?;
        let model: Self = bincode::deserialize(&bytes)?;
        Ok(model)
    }

    /// Save the model to a binary file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        let bytes = bincode::serialize(self)?;
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    pub fn pca(&self) -> &Pca {
        &self.pca
    }

    pub fn classifier(&self) -> &LogisticRegression {
        &self.classifier
    }

    /// Decision scores for raw feature vectors (one per row).
    pub fn decision_function(&self, features: &Array2<f64>) -> Result<Array1<f64>> {
        self.classifier.decision_function(&self.pca.transform(features)?)
    }

    pub fn predict(&self, features: &Array2<f64>) -> Result<Vec<Label>> {
        self.classifier.predict(&self.pca.transform(features)?)
    }

    /// Classify a single image, read row by row.
    pub fn predict_image<I: ImageAccess>(&self, image: &I) -> Result<Label> {
        let mut row = Vec::with_capacity((image.width() * image.height()) as usize);
        for y in 0..image.height() as i32 {
            for x in 0..image.width() as i32 {
                row.push(f64::from(image.get_pixel(x, y)));
            }
        }
        let features = Array1::from(row).insert_axis(Axis(0));

        self.predict(&features)?
            .pop()
            .ok_or_else(|| Error::Numerical("empty prediction".into()))
    }

    /// Confusion matrix of the predictions on `data`.
    pub fn confusion(&self, data: &Dataset) -> Result<ConfusionMatrix> {
        let predicted = self.predict(data.features())?;
        ConfusionMatrix::from_labels(data.labels(), &predicted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::LumaImage;
    use ndarray::array;

    fn create_model() -> (AgeClassifier, Dataset) {
        // 2x2 "images": children dark on the left, adults dark on the right.
        let features = array![
            [10.0, 200.0, 12.0, 190.0],
            [20.0, 210.0, 15.0, 205.0],
            [5.0, 180.0, 8.0, 195.0],
            [200.0, 10.0, 190.0, 14.0],
            [210.0, 20.0, 205.0, 9.0],
            [185.0, 6.0, 198.0, 11.0]
        ];
        let labels = vec![
            Label::Child,
            Label::Child,
            Label::Child,
            Label::Adult,
            Label::Adult,
            Label::Adult,
        ];
        let data = Dataset::new(features, labels).unwrap();

        let (pca, reduced) = Pca::fit_transform(data.features(), 1).unwrap();
        let classifier = LogisticRegression::builder()
            .fit(&reduced, data.labels())
            .unwrap();
        (AgeClassifier::new(pca, classifier).unwrap(), data)
    }

    #[test]
    fn confusion_counts_cover_the_data() {
        let (model, data) = create_model();
        let cm = model.confusion(&data).unwrap();
        assert_eq!(cm.total(), data.len());
        assert_eq!(cm.tp + cm.tn, data.len());
    }

    #[test]
    fn predicts_from_an_image() {
        let (model, _) = create_model();
        let adult = LumaImage::new(vec![205, 12, 200, 10], 2, 2).unwrap();
        let child = LumaImage::new(vec![12, 205, 10, 200], 2, 2).unwrap();
        assert_eq!(model.predict_image(&adult).unwrap(), Label::Adult);
        assert_eq!(model.predict_image(&child).unwrap(), Label::Child);
    }

    #[test]
    fn rejects_mismatched_parts() {
        let (model, data) = create_model();
        let (wide_pca, _) = Pca::fit_transform(data.features(), 2).unwrap();
        assert!(matches!(
            AgeClassifier::new(wide_pca, model.classifier().clone()),
            Err(Error::DimensionMismatch { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn save_and_load_model() {
        let (model, data) = create_model();

        let temp_path = std::env::temp_dir().join(format!(
            "face-age-pca-model-{}.bin",
            std::process::id()
        ));
        model.save(&temp_path).unwrap();

        let loaded = AgeClassifier::load(&temp_path).unwrap();
        assert_eq!(loaded, model);
        assert_eq!(
            loaded.predict(data.features()).unwrap(),
            model.predict(data.features()).unwrap()
        );

        std::fs::remove_file(temp_path).ok();
    }
}
