//! Image samples and the vectorizer that flattens them into feature vectors.

use ndarray::{Array1, Array2};

use crate::error::{Error, Result};

/// Trait for reading single-channel intensities from an image.
pub trait ImageAccess {
    /// Intensity at (x, y). Returns 0 for out-of-bounds pixels.
    fn get_pixel(&self, x: i32, y: i32) -> u8;

    /// Image dimensions.
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// A `height x width x 1` luma grid. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LumaImage {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl LumaImage {
    pub fn new(data: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = width as usize * height as usize;
        if data.len() != expected {
            return Err(Error::DimensionMismatch {
                expected,
                found: data.len(),
            });
        }
        Ok(Self {
            data,
            width,
            height,
        })
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> u8,
    {
        let mut data = Vec::with_capacity((width * height) as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self {
            data,
            width,
            height,
        }
    }

    /// Raw row-major pixels.
    pub fn as_raw(&self) -> &[u8] {
        &self.data
    }

    /// Number of entries in the flattened vector.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Flatten to a feature vector, row by row.
    pub fn to_feature_vector(&self) -> Array1<f64> {
        self.data.iter().map(|&p| f64::from(p)).collect()
    }
}

impl ImageAccess for LumaImage {
    fn get_pixel(&self, x: i32, y: i32) -> u8 {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return 0;
        }
        self.data[(y as u32 * self.width + x as u32) as usize]
    }

    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

/// Stack images into an `n x (height * width)` matrix, one row per image.
///
/// Every image must flatten to the same length as the first one.
pub fn vectorize(images: &[LumaImage]) -> Result<Array2<f64>> {
    let n_features = images.first().map(LumaImage::len).unwrap_or(0);
    let mut matrix = Array2::zeros((images.len(), n_features));

    for (mut row, image) in matrix.rows_mut().into_iter().zip(images) {
        if image.len() != n_features {
            return Err(Error::DimensionMismatch {
                expected: n_features,
                found: image.len(),
            });
        }
        for (dst, &src) in row.iter_mut().zip(image.as_raw()) {
            *dst = f64::from(src);
        }
    }

    Ok(matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn luma_image_access() {
        let data = vec![
            0, 255, 0, //
            255, 0, 255, //
        ];
        let img = LumaImage::new(data, 3, 2).unwrap();

        assert_eq!(img.get_pixel(0, 0), 0);
        assert_eq!(img.get_pixel(1, 0), 255);
        assert_eq!(img.get_pixel(0, 1), 255);

        // Out of bounds returns 0
        assert_eq!(img.get_pixel(-1, 0), 0);
        assert_eq!(img.get_pixel(3, 0), 0);
        assert_eq!(img.get_pixel(0, 2), 0);
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        assert!(matches!(
            LumaImage::new(vec![0; 5], 2, 2),
            Err(Error::DimensionMismatch {
                expected: 4,
                found: 5
            })
        ));
    }

    #[test]
    fn flattening_is_row_major() {
        let img = LumaImage::from_fn(3, 2, |x, y| (y * 10 + x) as u8);
        assert_eq!(
            img.to_feature_vector(),
            array![0.0, 1.0, 2.0, 10.0, 11.0, 12.0]
        );
    }

    #[test]
    fn vectorize_stacks_rows() {
        let a = LumaImage::from_fn(2, 2, |_, _| 1);
        let b = LumaImage::from_fn(2, 2, |x, _| x as u8 * 7);
        let m = vectorize(&[a, b]).unwrap();

        assert_eq!(m.dim(), (2, 4));
        assert_eq!(m.row(0).to_vec(), vec![1.0; 4]);
        assert_eq!(m.row(1).to_vec(), vec![0.0, 7.0, 0.0, 7.0]);
    }

    #[test]
    fn vectorize_rejects_mixed_sizes() {
        let a = LumaImage::from_fn(2, 2, |_, _| 1);
        let b = LumaImage::from_fn(3, 3, |_, _| 1);
        assert!(matches!(
            vectorize(&[a, b]),
            Err(Error::DimensionMismatch {
                expected: 4,
                found: 9
            })
        ));
    }
}
